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

    src/boot_sector.rs

    Routines for reading the BIOS Parameter Block from sector 0 of a raw
    image. The BPB is probed only to disambiguate geometry - for example the
    MSX 320K size, which may be 80/1/8 or 40/2/8. Filesystem contents are
    never interpreted.
*/

use binrw::{binrw, BinReaderExt};

use crate::io::{ReadSeek, SeekFrom};

// Offset of the bios parameter block in the boot sector.
pub const BPB_OFFSET: u64 = 0x0B;
// Offset of the 0xAA55 boot signature.
pub const BOOT_SIG_OFFSET: u64 = 0x1FE;
pub const BOOT_SIG: u16 = 0xAA55;

/// The DOS 2.0 BIOS Parameter Block plus the DOS 3.0 geometry extension.
#[derive(Debug, Default)]
#[binrw]
#[brw(little)]
pub(crate) struct BiosParameterBlock {
    pub(crate) bytes_per_sector: u16,
    pub(crate) sectors_per_cluster: u8,
    pub(crate) reserved_sectors: u16,
    pub(crate) number_of_fats: u8,
    pub(crate) root_entries: u16,
    pub(crate) total_sectors: u16,
    pub(crate) media_descriptor: u8,
    pub(crate) sectors_per_fat: u16,
    pub(crate) sectors_per_track: u16,
    pub(crate) number_of_heads: u16,
    pub(crate) hidden_sectors: u32,
}

impl BiosParameterBlock {
    /// Sanity check on the BPB parameters. Returns true for plausible floppy
    /// geometry from 160K single-density up to 2.88M extended-density media.
    pub fn is_valid(&self) -> bool {
        if self.bytes_per_sector < 128 || self.bytes_per_sector > 4096 {
            return false;
        }
        if !self.bytes_per_sector.is_power_of_two() {
            return false;
        }
        if self.number_of_fats == 0 || self.number_of_fats > 2 {
            return false;
        }
        if self.total_sectors == 0 {
            return false;
        }
        if self.sectors_per_track == 0 || self.sectors_per_track > 63 {
            return false;
        }
        if self.number_of_heads == 0 || self.number_of_heads > 2 {
            return false;
        }
        true
    }

    /// Sector size code, if `bytes_per_sector` is a legal `128 << n`.
    pub fn n(&self) -> Option<u8> {
        (0..=6u8).find(|&n| (128u16 << n) == self.bytes_per_sector)
    }

    /// Cylinder count implied by the BPB, if the totals divide evenly.
    pub fn cylinders(&self) -> Option<u16> {
        let per_cyl = self.sectors_per_track as u32 * self.number_of_heads as u32;
        if per_cyl == 0 || self.total_sectors as u32 % per_cyl != 0 {
            return None;
        }
        Some((self.total_sectors as u32 / per_cyl) as u16)
    }
}

/// Read the BPB from sector 0, requiring the 0xAA55 boot signature. Returns
/// None on any short read or implausible field - detection then degrades to
/// size-based matching.
pub(crate) fn probe_bpb<RWS: ReadSeek>(io: &mut RWS, base_off: u64) -> Option<BiosParameterBlock> {
    io.seek(SeekFrom::Start(base_off + BOOT_SIG_OFFSET)).ok()?;
    let sig: u16 = io.read_le().ok()?;
    if sig != BOOT_SIG {
        return None;
    }

    io.seek(SeekFrom::Start(base_off + BPB_OFFSET)).ok()?;
    let bpb: BiosParameterBlock = io.read_le().ok()?;
    if !bpb.is_valid() {
        log::debug!("probe_bpb(): boot signature present but BPB fields implausible");
        return None;
    }
    Some(bpb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sector_with_bpb(spt: u16, heads: u16, total: u16, bps: u16) -> Vec<u8> {
        let mut buf = vec![0u8; 512];
        buf[11..13].copy_from_slice(&bps.to_le_bytes());
        buf[13] = 2; // sectors per cluster
        buf[14..16].copy_from_slice(&1u16.to_le_bytes()); // reserved
        buf[16] = 2; // fats
        buf[17..19].copy_from_slice(&0x70u16.to_le_bytes()); // root entries
        buf[19..21].copy_from_slice(&total.to_le_bytes());
        buf[21] = 0xF9;
        buf[22..24].copy_from_slice(&3u16.to_le_bytes()); // sectors per fat
        buf[24..26].copy_from_slice(&spt.to_le_bytes());
        buf[26..28].copy_from_slice(&heads.to_le_bytes());
        buf[510] = 0x55;
        buf[511] = 0xAA;
        buf
    }

    #[test]
    fn test_probe_valid_bpb() {
        let mut io = Cursor::new(sector_with_bpb(9, 2, 1440, 512));
        let bpb = probe_bpb(&mut io, 0).unwrap();
        assert_eq!(bpb.sectors_per_track, 9);
        assert_eq!(bpb.number_of_heads, 2);
        assert_eq!(bpb.n(), Some(2));
        assert_eq!(bpb.cylinders(), Some(80));
    }

    #[test]
    fn test_probe_requires_signature() {
        let mut sector = sector_with_bpb(9, 2, 1440, 512);
        sector[510] = 0;
        let mut io = Cursor::new(sector);
        assert!(probe_bpb(&mut io, 0).is_none());
    }

    #[test]
    fn test_probe_rejects_implausible_fields() {
        let mut io = Cursor::new(sector_with_bpb(0, 2, 1440, 512));
        assert!(probe_bpb(&mut io, 0).is_none());
    }
}
