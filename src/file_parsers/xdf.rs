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

    src/file_parsers/xdf.rs

    IBM XDF (eXtended Density Format) 1.84MB images. Each non-zero cylinder
    packs one 8K, 2K, 1K and 512-byte sector per head, sector ids encoding
    the size code as 128 + n; cylinder 0 carries conventional 512-byte
    sectors holding the boot and FAT areas split across an AUX region
    (ids 1-8) and a MAIN region (ids 129 up). Head 1 is emitted with a
    bit-cell delay standing in for the format's head skew.
*/

use crate::{
    image::Image,
    io::ReadWriteSeek,
    layout::{SecInfo, SimpleLayout, TrkInfo},
    ImageError,
};

pub const XDF_SIZE: u64 = 1_884_160;
/// File bytes per cylinder: 23 512-byte-equivalents per head.
pub const XDF_CYL_SPAN: u64 = 23_552;
/// Head-1 track shift in bit-cells on non-zero cylinders.
pub const XDF_HEAD1_DELAY_BC: u32 = 10_000;

/// Sector id and size code for one large-sector slot, in physical order.
const CN_HEAD0: [(u8, u8); 4] = [(134, 6), (132, 4), (131, 3), (130, 2)];
const CN_HEAD1: [(u8, u8); 4] = [(130, 2), (131, 3), (132, 4), (134, 6)];

/// Cylinder-relative file offsets of the large sectors, packed size-major
/// across the heads per the fdutils layout convention.
const CN_HEAD0_OFF: [u32; 4] = [0, 16_384, 20_480, 22_528];
const CN_HEAD1_OFF: [u32; 4] = [8_192, 18_432, 21_504, 23_040];

pub struct XdfFormat;

impl XdfFormat {
    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        if im.file_size != XDF_SIZE {
            return Ok(false);
        }

        im.arena.init_track_map(80, 2)?;

        let base = SimpleLayout {
            nr_sectors: 19,
            n: 2,
            ..SimpleLayout::default()
        };

        // Layout 0: cylinder 0, head 0 - AUX sectors 1..8, then MAIN 129..
        let c0h0 = im.arena.add_layout(&base, 0)?;
        for (j, sec) in im.arena.sectors_mut(c0h0).iter_mut().enumerate() {
            sec.r = if j < 8 { j as u8 + 1 } else { 129 + (j as u8 - 8) };
            sec.n = 2;
        }
        // Layout 1: cylinder 0, head 1 - MAIN continues at 140.
        let c0h1 = im.arena.add_layout(
            &SimpleLayout {
                base: [140, 140],
                ..base.clone()
            },
            0,
        )?;

        // Layouts 2 and 3: the large-sector layouts for cylinders 1..79.
        let cn_h0 = Self::add_large_layout(im, &CN_HEAD0)?;
        let cn_h1 = Self::add_large_layout(im, &CN_HEAD1)?;

        im.arena.map_set(0, 0, c0h0);
        im.arena.map_set(0, 1, c0h1);
        for cyl in 1..80 {
            im.arena.map_set(cyl, 0, cn_h0);
            im.arena.map_set(cyl, 1, cn_h1);
        }

        // Cylinder-relative sector offsets, one table per layout. Cylinder 0
        // packs head 0 (AUX then MAIN) ahead of head 1.
        let t0: Vec<u32> = (0..19).map(|j| j * 512).collect();
        let t1: Vec<u32> = (0..19).map(|j| 19 * 512 + j * 512).collect();
        im.sec_off_tables = vec![t0, t1, CN_HEAD0_OFF.to_vec(), CN_HEAD1_OFF.to_vec()];
        im.cyl_span = XDF_CYL_SPAN;
        im.head1_delay_bc = XDF_HEAD1_DELAY_BC;
        Ok(true)
    }

    fn add_large_layout<RWS: ReadWriteSeek>(
        im: &mut Image<RWS>,
        slots: &[(u8, u8); 4],
    ) -> Result<u8, ImageError> {
        let idx = im.arena.add_track_layout(4)?;
        let sec_off = im.arena.trk(idx).sec_off;
        *im.arena.trk_mut(idx) = TrkInfo {
            nr_sectors: 4,
            sec_off,
            ..TrkInfo::default()
        };
        for (slot, sec) in slots.iter().zip(im.arena.sectors_mut(idx).iter_mut()) {
            *sec = SecInfo { r: slot.0, n: slot.1 };
        }
        Ok(idx)
    }
}
