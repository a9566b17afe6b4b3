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

    src/file_parsers/fdi.rs

    NEC PC-98 FDI images: a fixed header declaring the geometry, followed by
    plain sector data. Only the 2HD density code is accepted.
*/

use binrw::{binrw, BinReaderExt};

use crate::{
    image::Image,
    io::{ReadWriteSeek, SeekFrom},
    layout::SimpleLayout,
    ImageError,
};

/// The 2HD density code carried in the fdd_type field.
pub const FDI_2HD: u32 = 0x30;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct FdiHeader {
    pub reserved: u32,
    pub fdd_type: u32,
    pub header_size: u32,
    pub disk_size: u32,
    pub sector_size: u32,
    pub sectors: u32,
    pub heads: u32,
    pub cylinders: u32,
}

pub struct FdiFormat;

impl FdiFormat {
    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        if im.file_size < 32 {
            return Ok(false);
        }
        im.io.seek(SeekFrom::Start(0))?;
        let header: FdiHeader = im.io.read_le()?;
        if header.fdd_type != FDI_2HD {
            return Ok(false);
        }

        let n = (0..=6u8)
            .find(|&n| (128u32 << n) == header.sector_size)
            .ok_or(ImageError::BadImage("FDI sector size is not a legal size code"))?;
        if header.cylinders == 0 || header.cylinders > 255 || header.heads == 0 || header.heads > 2 {
            return Err(ImageError::BadImage("FDI geometry out of range"));
        }
        let expected =
            header.header_size as u64 + header.cylinders as u64 * header.heads as u64 * header.sectors as u64 * header.sector_size as u64;
        if expected != im.file_size {
            log::warn!(
                "open(): FDI header declares {} bytes but file is {}",
                expected,
                im.file_size
            );
            return Ok(false);
        }

        im.base_off = header.header_size as u64;
        im.arena.init_track_map(header.cylinders as u16, header.heads as u8)?;
        im.arena.simple_layout(&SimpleLayout {
            nr_sectors: header.sectors as u16,
            n,
            rpm: 360,
            ..SimpleLayout::default()
        })?;
        Ok(true)
    }
}
