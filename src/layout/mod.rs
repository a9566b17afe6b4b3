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
*/

//! The `layout` module holds the per-image layout arena: a compact,
//! append-only store of track and sector descriptors referenced by small
//! indices from a track map. The arena is built once at open time and is
//! read-only thereafter; the write path mutates only file bytes and ring
//! buffers.
//!
//! Tracks reference their sectors by base index and count rather than by
//! pointer, which keeps the whole image state small and trivially
//! relocatable. Storage is bounded by a fixed scratch size; building a
//! layout that would exhaust it is a structural error, not a reallocation.

pub mod catalog;

use std::mem::size_of;

use crate::{types::TrackEncoding, ImageError, MAX_SECTOR_N, MAX_TRACK_SECTORS};

/// Total descriptor scratch size in bytes.
pub const ARENA_BYTES: usize = 8192;
/// Minimum headroom that must remain above the read-data buffer.
pub const ARENA_HEADROOM: usize = 1024;
/// The sector rotational-order map always reserves one byte per slot.
const SEC_MAP_BYTES: usize = 256;

/// Describes a single sector as it appears in its IDAM.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SecInfo {
    /// Sector id byte (`R`), independent of physical position.
    pub r: u8,
    /// Size code: sector bytes = `128 << n`, `n <= 6`.
    pub n: u8,
}

impl SecInfo {
    #[inline]
    pub fn bytes(&self) -> usize {
        128 << self.n
    }
}

/// Describes one track layout. Multiple physical tracks may share a layout
/// through the track map.
#[derive(Clone, Debug)]
pub struct TrkInfo {
    pub nr_sectors: u16,
    /// Index of this track's first sector in the sector arena.
    pub sec_off: u16,
    pub is_fm: bool,
    pub has_iam: bool,
    /// Data bytes are stored bitwise-inverted on disk (Atari ATR).
    pub invert_data: bool,
    /// Data rate in kbps; 0 = infer from geometry and RPM.
    pub data_rate: u16,
    /// Nominal rotation; 0 is treated as 300 RPM.
    pub rpm: u16,
    pub interleave: u8,
    pub cskew: u8,
    pub hskew: u8,
    /// IDAM head value: 0 = derive from physical side, else fixed `head - 1`.
    pub head: u8,
    /// Gap byte counts; None = auto-compute from encoding and data rate.
    pub gap_2: Option<u16>,
    pub gap_3: Option<u16>,
    pub gap_4a: Option<u16>,
}

impl TrkInfo {
    pub fn encoding(&self) -> TrackEncoding {
        if self.is_fm {
            TrackEncoding::Fm
        }
        else {
            TrackEncoding::Mfm
        }
    }
}

impl Default for TrkInfo {
    fn default() -> TrkInfo {
        TrkInfo {
            nr_sectors: 0,
            sec_off: 0,
            is_fm: false,
            has_iam: true,
            invert_data: false,
            data_rate: 0,
            rpm: 0,
            interleave: 1,
            cskew: 0,
            hskew: 0,
            head: 0,
            gap_2: None,
            gap_3: None,
            gap_4a: None,
        }
    }
}

/// A uniform per-side layout used by `LayoutArena::simple_layout` to build
/// the common case: every cylinder of a side shares one track layout, with
/// sector ids counting up from a per-side base.
#[derive(Clone, Debug)]
pub struct SimpleLayout {
    pub nr_sectors: u16,
    pub n: u8,
    /// Sector id base per side.
    pub base: [u8; 2],
    pub is_fm: bool,
    pub has_iam: bool,
    pub invert_data: bool,
    pub data_rate: u16,
    pub rpm: u16,
    pub interleave: u8,
    pub cskew: u8,
    pub hskew: u8,
    pub head: u8,
    pub gap_2: Option<u16>,
    pub gap_3: Option<u16>,
    pub gap_4a: Option<u16>,
    /// Append one empty track layout after the per-side layouts (used to
    /// blank trailing half-cylinders).
    pub has_empty: bool,
}

impl Default for SimpleLayout {
    fn default() -> SimpleLayout {
        SimpleLayout {
            nr_sectors: 0,
            n: 2,
            base: [1, 1],
            is_fm: false,
            has_iam: true,
            invert_data: false,
            data_rate: 0,
            rpm: 0,
            interleave: 1,
            cskew: 0,
            hskew: 0,
            head: 0,
            gap_2: None,
            gap_3: None,
            gap_4a: None,
            has_empty: false,
        }
    }
}

impl SimpleLayout {
    /// Produce the track descriptor for one side of this layout. The sector
    /// arena offset is assigned by the arena on insertion.
    fn to_trk(&self) -> TrkInfo {
        TrkInfo {
            nr_sectors: self.nr_sectors,
            sec_off: 0,
            is_fm: self.is_fm,
            has_iam: self.has_iam,
            invert_data: self.invert_data,
            data_rate: self.data_rate,
            rpm: self.rpm,
            interleave: self.interleave.max(1),
            cskew: self.cskew,
            hskew: self.hskew,
            head: self.head,
            gap_2: self.gap_2,
            gap_3: self.gap_3,
            gap_4a: self.gap_4a,
        }
    }
}

/// The layout arena: track map, track descriptors and sector descriptors,
/// all index-linked.
pub struct LayoutArena {
    nr_cyls:  u16,
    nr_sides: u8,
    trk_map:  Vec<u8>,
    trk_info: Vec<TrkInfo>,
    sec_info: Vec<SecInfo>,
}

impl Default for LayoutArena {
    fn default() -> LayoutArena {
        LayoutArena::new()
    }
}

impl LayoutArena {
    pub fn new() -> LayoutArena {
        LayoutArena {
            nr_cyls:  0,
            nr_sides: 0,
            trk_map:  Vec::new(),
            trk_info: Vec::new(),
            sec_info: Vec::new(),
        }
    }

    pub fn nr_cyls(&self) -> u16 {
        self.nr_cyls
    }

    pub fn nr_sides(&self) -> u8 {
        self.nr_sides
    }

    pub fn nr_layouts(&self) -> usize {
        self.trk_info.len()
    }

    fn bytes_used(&self) -> usize {
        self.trk_map.len()
            + SEC_MAP_BYTES
            + self.trk_info.len() * size_of::<TrkInfo>()
            + self.sec_info.len() * size_of::<SecInfo>()
    }

    fn check_headroom(&self, extra: usize) -> Result<(), ImageError> {
        if self.bytes_used() + extra + ARENA_HEADROOM > ARENA_BYTES {
            log::error!(
                "check_headroom(): layout arena exhausted ({} + {} bytes)",
                self.bytes_used(),
                extra
            );
            return Err(ImageError::BadImage("layout arena exhausted"));
        }
        Ok(())
    }

    /// Allocate the track map. Must be called before any layout is added.
    pub fn init_track_map(&mut self, nr_cyls: u16, nr_sides: u8) -> Result<(), ImageError> {
        if !(1..=255).contains(&nr_cyls) {
            return Err(ImageError::BadImage("cylinder count out of range"));
        }
        if !(1..=2).contains(&nr_sides) {
            return Err(ImageError::BadImage("side count out of range"));
        }
        self.nr_cyls = nr_cyls;
        self.nr_sides = nr_sides;
        self.check_headroom(nr_cyls as usize * nr_sides as usize)?;
        self.trk_map = vec![0u8; nr_cyls as usize * nr_sides as usize];
        Ok(())
    }

    /// Append a new track layout with `nr_sectors` blank sector slots and
    /// return its index. Sector slots are filled in by the caller through
    /// `sectors_mut`.
    pub fn add_track_layout(&mut self, nr_sectors: u16) -> Result<u8, ImageError> {
        if nr_sectors as usize > MAX_TRACK_SECTORS {
            return Err(ImageError::BadImage("too many sectors in track layout"));
        }
        if self.trk_info.len() >= u8::MAX as usize {
            return Err(ImageError::BadImage("too many track layouts"));
        }
        self.check_headroom(size_of::<TrkInfo>() + nr_sectors as usize * size_of::<SecInfo>())?;

        let trk = TrkInfo {
            nr_sectors,
            sec_off: self.sec_info.len() as u16,
            ..TrkInfo::default()
        };
        self.sec_info
            .extend(std::iter::repeat(SecInfo::default()).take(nr_sectors as usize));
        self.trk_info.push(trk);
        Ok((self.trk_info.len() - 1) as u8)
    }

    pub fn trk(&self, idx: u8) -> &TrkInfo {
        &self.trk_info[idx as usize]
    }

    pub fn trk_mut(&mut self, idx: u8) -> &mut TrkInfo {
        &mut self.trk_info[idx as usize]
    }

    pub fn sectors(&self, idx: u8) -> &[SecInfo] {
        let trk = &self.trk_info[idx as usize];
        &self.sec_info[trk.sec_off as usize..trk.sec_off as usize + trk.nr_sectors as usize]
    }

    pub fn sectors_mut(&mut self, idx: u8) -> &mut [SecInfo] {
        let trk = &self.trk_info[idx as usize];
        let (off, ct) = (trk.sec_off as usize, trk.nr_sectors as usize);
        &mut self.sec_info[off..off + ct]
    }

    pub fn map_get(&self, cyl: u16, side: u8) -> u8 {
        self.trk_map[cyl as usize * self.nr_sides as usize + side as usize]
    }

    pub fn map_set(&mut self, cyl: u16, side: u8, idx: u8) {
        self.trk_map[cyl as usize * self.nr_sides as usize + side as usize] = idx;
    }

    /// Total data bytes a physical track with this layout occupies in the
    /// backing file.
    pub fn track_data_bytes(&self, idx: u8) -> usize {
        self.sectors(idx).iter().map(|s| s.bytes()).sum()
    }

    /// Append one track layout described by `layout`, filling sector ids
    /// counting up from the given side's base. Returns the layout index for
    /// track-map assignment.
    pub fn add_layout(&mut self, layout: &SimpleLayout, side: u8) -> Result<u8, ImageError> {
        let idx = self.add_track_layout(layout.nr_sectors)?;
        let sec_off = self.trk_info[idx as usize].sec_off;
        self.trk_info[idx as usize] = TrkInfo {
            sec_off,
            ..layout.to_trk()
        };
        for (j, sec) in self.sectors_mut(idx).iter_mut().enumerate() {
            sec.r = layout.base[side as usize].wrapping_add(j as u8);
            sec.n = layout.n;
        }
        Ok(idx)
    }

    /// Build the common single-layout-per-side image: one track layout per
    /// side, sector ids counting up from the side's base id, and every
    /// track-map cell pointing at its side's layout.
    pub fn simple_layout(&mut self, layout: &SimpleLayout) -> Result<(), ImageError> {
        for side in 0..self.nr_sides {
            let idx = self.add_layout(layout, side)?;
            for cyl in 0..self.nr_cyls {
                self.map_set(cyl, side, idx);
            }
        }
        if layout.has_empty {
            self.add_track_layout(0)?;
        }
        Ok(())
    }

    /// Validate the finished arena. After this returns Ok, every track-map
    /// cell references a defined layout and every sector has a legal size
    /// code; callers may treat the arena as immutable.
    pub fn finalise_track_map(&self) -> Result<(), ImageError> {
        if self.trk_map.is_empty() || self.trk_info.is_empty() {
            return Err(ImageError::BadImage("no track layouts defined"));
        }
        for &cell in &self.trk_map {
            if cell as usize >= self.trk_info.len() {
                return Err(ImageError::BadImage("track map references undefined layout"));
            }
        }
        for trk in &self.trk_info {
            if trk.interleave == 0 {
                return Err(ImageError::BadImage("zero interleave"));
            }
        }
        for sec in &self.sec_info {
            if sec.n > MAX_SECTOR_N {
                return Err(ImageError::BadImage("sector size code out of range"));
            }
        }
        Ok(())
    }
}
