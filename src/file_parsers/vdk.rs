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

    src/file_parsers/vdk.rs

    Dragon/CoCo VDK images: a variable-length "dk" header followed by plain
    18-sector, 256-byte MFM tracks.
*/

use binrw::{binrw, BinReaderExt};

use crate::{
    image::Image,
    io::{ReadWriteSeek, SeekFrom},
    layout::SimpleLayout,
    ImageError,
};

pub const VDK_MAGIC: [u8; 2] = *b"dk";
const VDK_MIN_HEADER: u16 = 12;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct VdkHeader {
    pub magic: [u8; 2],
    pub header_len: u16,
    pub version: u8,
    pub compat_version: u8,
    pub source_id: u8,
    pub source_version: u8,
    pub tracks: u8,
    pub sides: u8,
    pub flags: u8,
    pub name_len: u8,
}

pub struct VdkFormat;

impl VdkFormat {
    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        if im.file_size < VDK_MIN_HEADER as u64 {
            return Ok(false);
        }
        im.io.seek(SeekFrom::Start(0))?;
        let header: VdkHeader = im.io.read_le()?;
        if header.magic != VDK_MAGIC {
            return Ok(false);
        }
        // Reject images whose header-length field is shorter than the fixed
        // header itself.
        if header.header_len < VDK_MIN_HEADER {
            return Err(ImageError::BadImage("VDK header length under 12"));
        }
        if header.name_len & 0x07 != 0 {
            return Err(ImageError::BadImage("compressed VDK images are unsupported"));
        }

        im.base_off = header.header_len as u64;

        im.arena.init_track_map(header.tracks as u16, header.sides)?;
        im.arena.simple_layout(&SimpleLayout {
            nr_sectors: 18,
            n: 1,
            has_iam: false,
            interleave: 2,
            ..SimpleLayout::default()
        })?;
        Ok(true)
    }
}
