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

    src/file_parsers/ti99.rs

    TI-99/4A sector-dump images. Side 0 is stored cylinder-forward and side 1
    cylinder-reversed (the TI controller formats the flip side "backwards"),
    which maps to the SEQUENTIAL and REVERSE_SIDE(1) layout bits. A Volume
    Information Block in sector 0 carries the geometry; without it, detection
    degrades to size matching. Some utilities append a three-sector bad-block
    footer, which is ignored.
*/

use binrw::{binrw, BinReaderExt};

use crate::{
    image::Image,
    io::{ReadWriteSeek, SeekFrom},
    layout::SimpleLayout,
    types::FileLayout,
    ImageError,
};

pub const TI99_VIB_ID: [u8; 3] = *b"DSK";
/// The optional bad-block footer: three 256-byte sectors.
const TI99_FOOTER: u64 = 768;

/// The VIB occupies the start of sector 0; all multi-byte fields are
/// big-endian.
#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct Ti99Vib {
    pub vol_name: [u8; 10],
    pub tot_secs: u16,
    pub secs_per_trk: u8,
    pub dsk_id: [u8; 3],
    pub protection: u8,
    pub tracks_per_side: u8,
    pub sides: u8,
    pub density: u8,
}

pub struct Ti99Format;

impl Ti99Format {
    fn layout(nr_sectors: u16, is_fm: bool) -> SimpleLayout {
        SimpleLayout {
            nr_sectors,
            n: 1,
            base: [0, 0],
            is_fm,
            has_iam: false,
            interleave: 4,
            ..SimpleLayout::default()
        }
    }

    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        let geometry = Self::probe_vib(im)?.or_else(|| Self::geometry_from_size(im.file_size));
        let Some((nr_cyls, nr_sides, spt, is_fm)) = geometry else {
            return Ok(false);
        };

        // Exact size, or exact size plus the ignored footer.
        let body = nr_cyls as u64 * nr_sides as u64 * spt as u64 * 256;
        if im.file_size != body && im.file_size != body + TI99_FOOTER {
            log::debug!(
                "open(): TI-99 geometry implies {} bytes but file is {}",
                body,
                im.file_size
            );
            return Ok(false);
        }

        im.layout = FileLayout::SEQUENTIAL | FileLayout::REVERSE_SIDE_1;
        im.arena.init_track_map(nr_cyls, nr_sides)?;
        im.arena.simple_layout(&Self::layout(spt, is_fm))?;
        Ok(true)
    }

    /// Read the VIB and extract geometry from it, if its id bytes match.
    fn probe_vib<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<Option<(u16, u8, u16, bool)>, ImageError> {
        if im.file_size < 256 {
            return Ok(None);
        }
        im.io.seek(SeekFrom::Start(0))?;
        let vib: Ti99Vib = im.io.read_be()?;
        if vib.dsk_id != TI99_VIB_ID {
            return Ok(None);
        }
        if vib.tracks_per_side == 0 || vib.sides == 0 || vib.sides > 2 || vib.secs_per_trk == 0 {
            log::debug!("probe_vib(): VIB id present but geometry fields implausible");
            return Ok(None);
        }
        let is_fm = vib.density <= 1;
        log::trace!(
            "probe_vib(): {} sectors, {}x{}x{}, density {}",
            vib.tot_secs,
            vib.tracks_per_side,
            vib.sides,
            vib.secs_per_trk,
            vib.density
        );
        Ok(Some((
            vib.tracks_per_side as u16,
            vib.sides,
            vib.secs_per_trk as u16,
            is_fm,
        )))
    }

    /// Size-based fallback over the well-known TI-99 dump sizes.
    fn geometry_from_size(size: u64) -> Option<(u16, u8, u16, bool)> {
        let body = if size % 1024 == TI99_FOOTER % 1024 && size > TI99_FOOTER {
            size - TI99_FOOTER
        }
        else {
            size
        };
        match body {
            92_160 => Some((40, 1, 9, true)),   // SSSD
            184_320 => Some((40, 2, 9, true)),  // DSSD
            327_680 => Some((40, 2, 16, false)), // DSDD (16-sector)
            368_640 => Some((40, 2, 18, false)), // DSDD
            737_280 => Some((80, 2, 18, false)), // DSDD80
            _ => None,
        }
    }
}
