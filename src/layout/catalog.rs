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

    src/layout/catalog.rs

    Compile-time geometry catalogues, one table per host brand plus a
    default table. A raw sector image with no recognizable header is matched
    against its host's table by exact file size: an entry matches when the
    size equals cyls * secs * (128 << n) * sides for some cylinder count in
    the entry's cylinder class. The first matching entry wins.
*/

use std::ops::RangeInclusive;

use crate::{host::HostPreference, layout::SimpleLayout};

/// Cylinder-count class. 40-track media tolerate 38..=42 cylinders, 80-track
/// media 77..=85, covering both trimmed and extended dumps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CylClass {
    Cyls40,
    Cyls80,
}

impl CylClass {
    pub fn range(&self) -> RangeInclusive<u16> {
        match self {
            CylClass::Cyls40 => 38..=42,
            CylClass::Cyls80 => 77..=85,
        }
    }
}

/// Rotation-rate class. The encoded rpm is `(class + 5) * 60`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RpmClass {
    Rpm300 = 0,
    Rpm360 = 1,
}

impl RpmClass {
    pub fn rpm(self) -> u16 {
        (self as u16 + 5) * 60
    }
}

/// One geometry catalogue entry.
#[derive(Copy, Clone, Debug)]
pub struct DiskType {
    pub nr_secs: u8,
    pub nr_sides: u8,
    pub has_iam: bool,
    /// Gap3 byte count; 0 = auto-fit at track prep time.
    pub gap3: u16,
    pub interleave: u8,
    pub n: u8,
    pub base_id: u8,
    pub cskew: u8,
    pub hskew: u8,
    pub cyls: CylClass,
    pub rpm: RpmClass,
}

impl DiskType {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        nr_secs: u8,
        nr_sides: u8,
        has_iam: bool,
        gap3: u16,
        interleave: u8,
        n: u8,
        base_id: u8,
        cskew: u8,
        hskew: u8,
        cyls: CylClass,
        rpm: RpmClass,
    ) -> DiskType {
        DiskType {
            nr_secs,
            nr_sides,
            has_iam,
            gap3,
            interleave,
            n,
            base_id,
            cskew,
            hskew,
            cyls,
            rpm,
        }
    }

    /// Raw image size for this entry at the given cylinder count.
    pub fn size_for(&self, nr_cyls: u16) -> u64 {
        nr_cyls as u64 * self.nr_secs as u64 * (128u64 << self.n) * self.nr_sides as u64
    }

    /// Return the cylinder count at which this entry exactly matches `size`,
    /// if any cylinder count within the entry's class does.
    pub fn match_size(&self, size: u64) -> Option<u16> {
        self.cyls.range().find(|&c| self.size_for(c) == size)
    }

    /// Expand the entry into a `SimpleLayout` for the track assembler.
    pub fn to_layout(&self) -> SimpleLayout {
        SimpleLayout {
            nr_sectors: self.nr_secs as u16,
            n: self.n,
            base: [self.base_id, self.base_id],
            has_iam: self.has_iam,
            rpm: self.rpm.rpm(),
            interleave: self.interleave,
            cskew: self.cskew,
            hskew: self.hskew,
            gap_3: match self.gap3 {
                0 => None,
                g => Some(g),
            },
            ..SimpleLayout::default()
        }
    }
}

use CylClass::*;
use RpmClass::*;

#[rustfmt::skip]
pub static PC_DOS_TYPES: &[DiskType] = &[
    //            secs sides  iam  gap3 il n  base cs hs
    DiskType::new(  8,  1,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300), // 160K
    DiskType::new(  9,  1,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300), // 180K
    DiskType::new(  8,  2,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300), // 320K
    DiskType::new(  9,  2,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300), // 360K
    DiskType::new(  9,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 720K
    DiskType::new( 15,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm360), // 1.2M
    DiskType::new( 18,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 1.44M
    DiskType::new( 21,  2,  true,  12, 2, 2, 1, 0, 0, Cyls80, Rpm300), // 1.68M DMF
    DiskType::new( 36,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 2.88M
];

// Derived from the PC-DOS 80-cylinder table: WD1772 controllers write no IAM,
// and the 9-sector variants carry the TOS-format skews.
#[rustfmt::skip]
pub static ATARI_ST_TYPES: &[DiskType] = &[
    DiskType::new(  9,  1, false,  84, 1, 2, 1, 2, 0, Cyls80, Rpm300), // 360K
    DiskType::new(  9,  2, false,  84, 1, 2, 1, 4, 2, Cyls80, Rpm300), // 720K
    DiskType::new( 10,  1, false,  30, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 400K
    DiskType::new( 10,  2, false,  30, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 800K
    DiskType::new( 11,  1, false,   1, 2, 2, 1, 0, 0, Cyls80, Rpm300), // 440K
    DiskType::new( 11,  2, false,   1, 2, 2, 1, 0, 0, Cyls80, Rpm300), // 880K
];

// The 320K and 360K sizes are ambiguous between 1DD 80-cylinder and 2D
// 40-cylinder media; the 1DD entry is listed first and a valid BPB may
// override the pick.
#[rustfmt::skip]
pub static MSX_TYPES: &[DiskType] = &[
    DiskType::new(  8,  1,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 320K 1DD
    DiskType::new(  8,  2,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300), // 320K 2D
    DiskType::new(  9,  1,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 360K 1DD
    DiskType::new(  9,  2,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300), // 360K 2D
    DiskType::new(  9,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 720K 2DD
];

#[rustfmt::skip]
pub static PC98_TYPES: &[DiskType] = &[
    DiskType::new(  8,  2,  true, 116, 1, 3, 1, 0, 0, Cyls80, Rpm360), // 1.25M 2HD
    DiskType::new( 15,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm360), // 1.2M
    DiskType::new(  9,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 720K 2DD
];

// Double-density entries only; single-density TI-99 media are FM-encoded and
// resolved by the TI-99 handler itself.
#[rustfmt::skip]
pub static TI99_TYPES: &[DiskType] = &[
    DiskType::new( 16,  2, false,  44, 4, 1, 0, 0, 0, Cyls40, Rpm300), // 320K DSDD
    DiskType::new( 18,  2, false,  24, 4, 1, 0, 0, 0, Cyls40, Rpm300), // 360K DSDD
    DiskType::new( 18,  2, false,  24, 4, 1, 0, 0, 0, Cyls80, Rpm300), // 720K DSDD80
];

#[rustfmt::skip]
pub static ACORN_TYPES: &[DiskType] = &[
    DiskType::new( 16,  1, false,  57, 1, 1, 0, 0, 0, Cyls40, Rpm300), // ADFS S
    DiskType::new( 16,  1, false,  57, 1, 1, 0, 0, 0, Cyls80, Rpm300), // ADFS M
    DiskType::new( 16,  2, false,  57, 1, 1, 0, 0, 0, Cyls80, Rpm300), // ADFS L
    DiskType::new(  5,  2, false, 116, 1, 3, 0, 0, 0, Cyls80, Rpm300), // ADFS D/E 800K
];

#[rustfmt::skip]
pub static AKAI_TYPES: &[DiskType] = &[
    DiskType::new(  5,  2,  true, 116, 1, 3, 1, 0, 0, Cyls80, Rpm300), // 800K DD
    DiskType::new( 10,  2,  true, 116, 1, 3, 1, 0, 0, Cyls80, Rpm300), // 1.6M HD
];

#[rustfmt::skip]
pub static CASIO_TYPES: &[DiskType] = &[
    DiskType::new(  8,  2,  true, 116, 1, 3, 1, 0, 0, Cyls80, Rpm360), // 1.28M
];

#[rustfmt::skip]
pub static DEC_TYPES: &[DiskType] = &[
    DiskType::new( 10,  1,  true,  30, 2, 2, 1, 0, 0, Cyls80, Rpm300), // RX50 400K
];

#[rustfmt::skip]
pub static ENSONIQ_TYPES: &[DiskType] = &[
    DiskType::new( 10,  2,  true,  30, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 800K DD
    DiskType::new( 20,  2,  true,  40, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 1.6M HD
];

#[rustfmt::skip]
pub static FLUKE_TYPES: &[DiskType] = &[
    DiskType::new( 16,  2,  true,  57, 1, 1, 1, 0, 0, Cyls80, Rpm300), // 640K
];

#[rustfmt::skip]
pub static MEMOTECH_TYPES: &[DiskType] = &[
    DiskType::new( 16,  2,  true,  57, 1, 2, 1, 0, 0, Cyls40, Rpm300), // type 03
    DiskType::new( 16,  2,  true,  57, 1, 2, 1, 0, 0, Cyls80, Rpm300), // type 07
];

#[rustfmt::skip]
pub static NASCOM_TYPES: &[DiskType] = &[
    DiskType::new( 16,  2,  true,  57, 1, 1, 1, 0, 0, Cyls80, Rpm300), // Gemini 640K
];

// Gap and sync quirks for the UKNC (post-CRC resyncs, short gaps, no IAM)
// are applied by the raw handler on top of this geometry.
#[rustfmt::skip]
pub static UKNC_TYPES: &[DiskType] = &[
    DiskType::new( 10,  2, false,  30, 1, 2, 1, 0, 0, Cyls80, Rpm300), // 800K
];

#[rustfmt::skip]
pub static DEFAULT_TYPES: &[DiskType] = &[
    DiskType::new(  8,  1,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300),
    DiskType::new(  9,  1,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300),
    DiskType::new(  8,  2,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300),
    DiskType::new(  9,  2,  true,  84, 1, 2, 1, 0, 0, Cyls40, Rpm300),
    DiskType::new(  9,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300),
    DiskType::new( 10,  2,  true,  30, 1, 2, 1, 0, 0, Cyls80, Rpm300),
    DiskType::new( 15,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm360),
    DiskType::new( 18,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300),
    DiskType::new( 21,  2,  true,  12, 2, 2, 1, 0, 0, Cyls80, Rpm300),
    DiskType::new( 36,  2,  true,  84, 1, 2, 1, 0, 0, Cyls80, Rpm300),
];

/// The catalogue table for a host brand. The default table stands in for
/// hosts with no table of their own.
pub fn types_for_host(host: HostPreference) -> &'static [DiskType] {
    match host {
        HostPreference::Acorn => ACORN_TYPES,
        HostPreference::Akai => AKAI_TYPES,
        HostPreference::Casio => CASIO_TYPES,
        HostPreference::Dec => DEC_TYPES,
        HostPreference::Ensoniq => ENSONIQ_TYPES,
        HostPreference::Fluke => FLUKE_TYPES,
        HostPreference::Memotech => MEMOTECH_TYPES,
        HostPreference::Msx => MSX_TYPES,
        HostPreference::Nascom => NASCOM_TYPES,
        HostPreference::Pc98 => PC98_TYPES,
        HostPreference::PcDos | HostPreference::Ibm3174 => PC_DOS_TYPES,
        HostPreference::Ti99 => TI99_TYPES,
        HostPreference::Uknc => UKNC_TYPES,
        HostPreference::Unspecified => DEFAULT_TYPES,
    }
}

/// Find the first catalogue entry, host table first and default table
/// second, whose geometry exactly accounts for `size` bytes.
pub fn select(host: HostPreference, size: u64) -> Option<(&'static DiskType, u16)> {
    for table in [types_for_host(host), DEFAULT_TYPES] {
        for entry in table {
            if let Some(nr_cyls) = entry.match_size(size) {
                log::debug!(
                    "select(): matched {}/{}/{} n={} at {} cylinders for {} bytes",
                    entry.nr_secs,
                    entry.nr_sides,
                    entry.rpm.rpm(),
                    entry.n,
                    nr_cyls,
                    size
                );
                return Some((entry, nr_cyls));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyl_class_ranges() {
        assert_eq!(CylClass::Cyls40.range(), 38..=42);
        assert_eq!(CylClass::Cyls80.range(), 77..=85);
    }

    #[test]
    fn test_rpm_class_encoding() {
        assert_eq!(RpmClass::Rpm300.rpm(), 300);
        assert_eq!(RpmClass::Rpm360.rpm(), 360);
    }

    #[test]
    fn test_pc_1440k_match() {
        let (entry, cyls) = select(HostPreference::PcDos, 1_474_560).unwrap();
        assert_eq!((entry.nr_secs, entry.nr_sides, entry.n, cyls), (18, 2, 2, 80));
        assert_eq!(entry.rpm.rpm(), 300);
        assert!(entry.has_iam);
    }

    #[test]
    fn test_off_by_one_rejected() {
        assert!(select(HostPreference::PcDos, 1_474_559).is_none());
        assert!(select(HostPreference::PcDos, 1_474_561).is_none());
    }

    #[test]
    fn test_msx_320k_prefers_1dd() {
        let (entry, cyls) = select(HostPreference::Msx, 327_680).unwrap();
        assert_eq!((entry.nr_secs, entry.nr_sides, cyls), (8, 1, 80));
    }

    #[test]
    fn test_host_table_falls_back_to_default() {
        // No Acorn entry accounts for a 1.44M image, but the default table does.
        let (entry, cyls) = select(HostPreference::Acorn, 1_474_560).unwrap();
        assert_eq!((entry.nr_secs, entry.nr_sides, cyls), (18, 2, 80));
    }

    #[test]
    fn test_every_entry_roundtrips_over_class() {
        let all: &[&[DiskType]] = &[
            PC_DOS_TYPES,
            ATARI_ST_TYPES,
            MSX_TYPES,
            PC98_TYPES,
            TI99_TYPES,
            ACORN_TYPES,
            AKAI_TYPES,
            CASIO_TYPES,
            DEC_TYPES,
            ENSONIQ_TYPES,
            FLUKE_TYPES,
            MEMOTECH_TYPES,
            NASCOM_TYPES,
            UKNC_TYPES,
            DEFAULT_TYPES,
        ];
        for table in all {
            for entry in *table {
                for cyls in entry.cyls.range() {
                    let size = entry.size_for(cyls);
                    assert!(entry.match_size(size).is_some());
                    assert!(entry.match_size(size + 1).is_none());
                    assert!(entry.match_size(size - 1).is_none());
                }
            }
        }
    }
}
