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

    src/file_parsers/trd.rs

    ZX Spectrum TR-DOS (Beta Disk) TRD images: 16 sectors of 256 bytes per
    track, with the volume information block in sector 9 of track 0. TRD
    files are frequently truncated after the last used track; the image may
    grow back to full geometry on write.
*/

use binrw::{binrw, BinReaderExt};

use crate::{
    image::Image,
    io::{ReadWriteSeek, SeekFrom},
    layout::SimpleLayout,
    ImageError,
};

/// File offset of the volume information block (track 0, sector 9).
pub const TRD_VIB_OFFSET: u64 = 0x8E0;
pub const TRDOS_ID: u8 = 0x10;

/// Bytes per TRD track: 16 sectors of 256 bytes.
const TRD_TRACK_BYTES: u64 = 4096;

#[derive(Debug)]
#[binrw]
#[brw(little)]
pub struct TrdVolumeInfo {
    pub end_of_catalogue: u8,
    pub first_free_sec: u8,
    pub first_free_trk: u8,
    pub disk_type: u8,
    pub file_count: u8,
    pub free_sec_count: u16,
    pub trdos_id: u8,
}

impl TrdVolumeInfo {
    /// Geometry encoded in the disk-type byte.
    pub fn geometry(&self) -> Option<(u16, u8)> {
        match self.disk_type {
            0x16 => Some((80, 2)),
            0x17 => Some((40, 2)),
            0x18 => Some((80, 1)),
            0x19 => Some((40, 1)),
            _ => None,
        }
    }
}

pub struct TrdFormat;

impl TrdFormat {
    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        if im.file_size < TRD_VIB_OFFSET + 8 {
            return Ok(false);
        }
        im.io.seek(SeekFrom::Start(TRD_VIB_OFFSET))?;
        let vib: TrdVolumeInfo = im.io.read_le()?;
        if vib.trdos_id != TRDOS_ID {
            return Ok(false);
        }
        let Some((nr_cyls, nr_sides)) = vib.geometry() else {
            log::warn!("open(): TR-DOS id present but unknown disk type {:#04x}", vib.disk_type);
            return Ok(false);
        };

        // A truncated image may end mid-cylinder; the trailing half-cylinder
        // is presented as an empty track until the file is extended.
        let tot_trks = im.file_size.div_ceil(TRD_TRACK_BYTES);
        let has_empty = nr_sides == 2 && tot_trks & 1 != 0;

        im.arena.init_track_map(nr_cyls, nr_sides)?;
        im.arena.simple_layout(&SimpleLayout {
            nr_sectors: 16,
            n: 1,
            has_iam: false,
            ..SimpleLayout::default()
        })?;

        if has_empty {
            let empty = im.arena.add_track_layout(0)?;
            im.arena.map_set(nr_cyls - 1, 1, empty);
        }

        im.can_extend = true;
        log::trace!(
            "open(): TRD type {:#04x}: {} cyls, {} sides, {} tracks in file",
            vib.disk_type,
            nr_cyls,
            nr_sides,
            tot_trks
        );
        Ok(true)
    }
}
