/*
    TrackCast
    https://github.com/dbalsom/trackcast

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/file_parsers/st.rs

    Atari ST raw images. Plain sector dumps matched against the ST table,
    which mirrors the PC-DOS 80-cylinder geometries minus the IAM, with the
    TOS-format cylinder and head skews on the 9-sector variants.
*/

use crate::{image::Image, io::ReadWriteSeek, layout::catalog, ImageError};

pub struct StFormat;

impl StFormat {
    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        let matched = catalog::ATARI_ST_TYPES
            .iter()
            .find_map(|entry| entry.match_size(im.file_size).map(|cyls| (entry, cyls)));
        let Some((entry, nr_cyls)) = matched else {
            return Ok(false);
        };

        im.arena.init_track_map(nr_cyls, entry.nr_sides)?;
        im.arena.simple_layout(&entry.to_layout())?;
        Ok(true)
    }
}
