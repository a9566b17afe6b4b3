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

    src/file_parsers/atr.rs

    Atari 8-bit ATR images. A 16-byte header precedes the sector data; data
    bytes are stored bitwise-inverted relative to the medium. The Atari host
    clock runs the bit rate 4% above nominal, and the first three sectors of
    track 0 are always 128 bytes regardless of the medium density.
*/

use binrw::{binrw, BinReaderExt};

use crate::{
    image::Image,
    io::{ReadWriteSeek, SeekFrom},
    layout::SimpleLayout,
    ImageError,
};

pub const ATR_MAGIC: u16 = 0x0296;
pub const ATR_HEADER_SIZE: u64 = 16;
const ATR_RPM: u16 = 288;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct AtrHeader {
    pub magic: u16,
    /// Image size in 16-byte paragraphs, low word.
    pub pars: u16,
    pub sec_size: u16,
    pub pars_high: u8,
    pub crc: u32,
    pub unused: [u8; 4],
    pub flags: u8,
}

/// Nominal rate plus the Atari "+4%" host-clock correction.
fn atr_rate(nominal: u16) -> u16 {
    nominal + nominal / 25
}

pub struct AtrFormat;

impl AtrFormat {
    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        if im.file_size < ATR_HEADER_SIZE {
            return Ok(false);
        }
        im.io.seek(SeekFrom::Start(0))?;
        let header: AtrHeader = im.io.read_le()?;
        if header.magic != ATR_MAGIC {
            return Ok(false);
        }

        im.base_off = ATR_HEADER_SIZE;
        let data_size = im.file_size - ATR_HEADER_SIZE;

        let layout = SimpleLayout {
            invert_data: true,
            rpm: ATR_RPM,
            has_iam: false,
            ..SimpleLayout::default()
        };

        match (header.sec_size, data_size) {
            (128, 92_160) => {
                // Single density: 40 cylinders of 18 FM sectors.
                im.arena.init_track_map(40, 1)?;
                im.arena.simple_layout(&SimpleLayout {
                    nr_sectors: 18,
                    n: 0,
                    is_fm: true,
                    data_rate: atr_rate(125),
                    interleave: 9,
                    ..layout
                })?;
            }
            (128, 133_120) => {
                // Enhanced density: 26 MFM sectors of 128 bytes.
                im.arena.init_track_map(40, 1)?;
                im.arena.simple_layout(&SimpleLayout {
                    nr_sectors: 26,
                    n: 0,
                    data_rate: atr_rate(250),
                    interleave: 13,
                    ..layout
                })?;
            }
            (256, 183_936) => {
                // Double density. The three boot sectors occupy 128 bytes
                // each, in the file and on the medium.
                im.arena.init_track_map(40, 1)?;
                let track0 = SimpleLayout {
                    nr_sectors: 18,
                    n: 1,
                    data_rate: atr_rate(250),
                    interleave: 9,
                    ..layout
                };
                let idx0 = im.arena.add_layout(&track0, 0)?;
                for sec in im.arena.sectors_mut(idx0)[..3].iter_mut() {
                    sec.n = 0;
                }
                let idx1 = im.arena.add_layout(&track0, 0)?;
                im.arena.map_set(0, 0, idx0);
                for cyl in 1..40 {
                    im.arena.map_set(cyl, 0, idx1);
                }
            }
            _ => {
                log::warn!(
                    "open(): ATR header present but unsupported geometry (sec_size {}, {} data bytes)",
                    header.sec_size,
                    data_size
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}
