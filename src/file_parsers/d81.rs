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

    src/file_parsers/d81.rs

    Commodore 1581 D81 images: 80 cylinders of 10 512-byte MFM sectors per
    side, with the sides stored swapped relative to physical head order.
*/

use crate::{
    image::Image,
    io::ReadWriteSeek,
    layout::SimpleLayout,
    types::FileLayout,
    ImageError,
};

pub const D81_SIZE: u64 = 819_200;

pub struct D81Format;

impl D81Format {
    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        if im.file_size != D81_SIZE {
            return Ok(false);
        }

        im.layout = FileLayout::SIDES_SWAPPED;
        im.arena.init_track_map(80, 2)?;
        im.arena.simple_layout(&SimpleLayout {
            nr_sectors: 10,
            n: 2,
            has_iam: false,
            ..SimpleLayout::default()
        })?;
        Ok(true)
    }
}
