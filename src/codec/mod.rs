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

//! The `codec` module implements the IBM System 34 track structure shared by
//! the MFM and FM encoders: gap and sync sizing, address mark layout,
//! data-rate inference, and the 32-bit-cell track length quantization.
//!
//! The two encodings share structure but diverge in sync patterns, gap
//! defaults and cell timing; per-encoding word translation lives in the
//! `mfm` and `fm` submodules.

pub mod fm;
pub mod mfm;

use crate::{
    layout::{SecInfo, TrkInfo},
    ImageError,
};

/// Gap filler byte values.
pub const MFM_GAP_BYTE: u8 = 0x4E;
pub const FM_GAP_BYTE: u8 = 0xFF;

/// Sync run lengths (bytes of 0x00 preceding each address mark).
pub const MFM_GAP_SYNC: u32 = 12;
pub const FM_GAP_SYNC: u32 = 6;

/// Gap1 length following the IAM.
pub const MFM_GAP_1: u32 = 50;
pub const FM_GAP_1: u32 = 26;

/// Default Gap2 lengths. Extended-density MFM media use the perpendicular
/// recording value.
pub const MFM_GAP_2: u32 = 22;
pub const MFM_GAP_2_ED: u32 = 41;
pub const FM_GAP_2: u32 = 11;

/// Default post-index gaps.
pub const MFM_GAP_4A: u32 = 80;
pub const FM_GAP_4A_IAM: u32 = 40;
pub const FM_GAP_4A: u32 = 16;

/// Auto-fit Gap3 ceilings indexed by sector size code.
pub const MFM_GAP_3: [u32; 7] = [32, 54, 84, 116, 255, 255, 255];
pub const FM_GAP_3: [u32; 7] = [27, 42, 58, 138, 255, 255, 255];

/// CRC register values after feeding each address-mark prefix with the
/// 0xFFFF seed. The data CRC is seeded with the mark-prefix value so the
/// running register can be continued across 1 KiB sub-chunks.
pub const MFM_IDAM_CRC: u16 = 0xB230; // a1 a1 a1 fe
pub const MFM_DAM_CRC: u16 = 0xE295; // a1 a1 a1 fb
pub const FM_IDAM_CRC: u16 = 0xEF21; // fe
pub const FM_DAM_CRC: u16 = 0xBF84; // fb

/// Every encoded byte occupies 16 bit-cells in both MFM and FM.
pub const BC_PER_BYTE: u32 = 16;

/// Precomputed per-track encoding parameters. Sizes are in encoded bytes;
/// multiply by [`BC_PER_BYTE`] for bit-cells.
#[derive(Clone, Debug, Default)]
pub struct TrackPrep {
    pub is_fm: bool,
    /// Resolved data rate in kbps.
    pub data_rate: u32,
    pub rpm: u32,
    pub gap_sync: u32,
    pub gap_1: u32,
    pub gap_2: u32,
    pub gap_3: u32,
    pub gap_4a: u32,
    /// Terminal (pre-index) gap absorbing the track-length remainder.
    pub gap_4: u32,
    /// Bytes from the index to the first sector's IDAM sync.
    pub idx_sz: u32,
    /// IDAM sync+mark+id+CRC+Gap2, per sector.
    pub idam_sz: u32,
    /// DAM sync+mark, per sector.
    pub dam_sz_pre: u32,
    /// Data CRC+Gap3, per sector.
    pub dam_sz_post: u32,
    pub tracklen_bc: u32,
    pub post_crc_syncs: u32,
}

impl TrackPrep {
    /// Encoded size of one sector in bytes, IDAM through Gap3.
    #[inline]
    pub fn enc_sec_sz(&self, sec: &SecInfo) -> u32 {
        self.idam_sz + self.dam_sz_pre + sec.bytes() as u32 + self.dam_sz_post
    }

    #[inline]
    pub fn filler(&self) -> u8 {
        if self.is_fm {
            FM_GAP_BYTE
        }
        else {
            MFM_GAP_BYTE
        }
    }

    /// Mark length in bytes: the MFM marks carry a three-byte sync prefix.
    #[inline]
    pub fn mark_len(&self) -> u32 {
        if self.is_fm {
            1
        }
        else {
            4
        }
    }

    /// Duration of one bit-cell in nanoseconds.
    pub fn cell_ns(&self) -> u32 {
        500_000 / self.data_rate
    }
}

fn gap2_default(is_fm: bool, data_rate: u32) -> u32 {
    if is_fm {
        FM_GAP_2
    }
    else if data_rate >= 1000 {
        MFM_GAP_2_ED
    }
    else {
        MFM_GAP_2
    }
}

fn gap4a_default(is_fm: bool, has_iam: bool) -> u32 {
    match (is_fm, has_iam) {
        (false, _) => MFM_GAP_4A,
        (true, true) => FM_GAP_4A_IAM,
        (true, false) => FM_GAP_4A,
    }
}

/// Minimum track length in bytes for the given gap choices.
fn min_track_bytes(secs: &[SecInfo], prep: &TrackPrep, gap_3: u32) -> u32 {
    let per_sec: u32 = secs
        .iter()
        .map(|s| prep.idam_sz + prep.dam_sz_pre + s.bytes() as u32 + 2 + prep.post_crc_syncs + gap_3)
        .sum();
    prep.idx_sz + per_sec
}

/// Compute the full per-track encoding parameters: gap defaults, data-rate
/// inference, Gap3 auto-fit and track length quantization.
///
/// Data-rate inference finds the smallest standard rate whose nominal track
/// length, plus a small slack, can hold the data-forced minimum. The final
/// track length is the larger of the nominal length and the minimum, rounded
/// up to a multiple of 32 bit-cells; the excess becomes Gap4.
pub fn prep_track(trk: &TrkInfo, secs: &[SecInfo], post_crc_syncs: u8) -> Result<TrackPrep, ImageError> {
    let is_fm = trk.is_fm;
    let rpm = if trk.rpm == 0 { 300 } else { trk.rpm as u32 };

    let mut prep = TrackPrep {
        is_fm,
        rpm,
        gap_sync: if is_fm { FM_GAP_SYNC } else { MFM_GAP_SYNC },
        gap_1: if is_fm { FM_GAP_1 } else { MFM_GAP_1 },
        gap_4a: trk.gap_4a.map(u32::from).unwrap_or(gap4a_default(is_fm, trk.has_iam)),
        post_crc_syncs: post_crc_syncs as u32,
        ..TrackPrep::default()
    };

    let mark = prep.mark_len();
    prep.idx_sz = prep.gap_4a
        + if trk.has_iam {
            prep.gap_sync + mark + prep.gap_1
        }
        else {
            0
        };
    prep.dam_sz_pre = prep.gap_sync + mark;

    // Gap3 used for the fitting check: explicit value, or zero while auto.
    let fit_gap_3 = trk.gap_3.map(u32::from).unwrap_or(0);

    // Resolve the data rate, trying each standard rate from slowest up.
    let rate_shifts: &[u32] = if is_fm { &[0, 1] } else { &[1, 2, 3] };
    let mut data_rate = trk.data_rate as u32;
    if data_rate == 0 {
        for &i in rate_shifts {
            let rate = 125u32 << i;
            prep.gap_2 = trk.gap_2.map(u32::from).unwrap_or(gap2_default(is_fm, rate));
            prep.idam_sz = prep.gap_sync + mark + 4 + 2 + prep.post_crc_syncs + prep.gap_2;
            let min_bc = BC_PER_BYTE * min_track_bytes(secs, &prep, fit_gap_3);
            data_rate = rate;
            if min_bc < ((50_000 * 300 / rpm) << i) + 5_000 {
                break;
            }
        }
    }
    prep.data_rate = data_rate;
    prep.gap_2 = trk.gap_2.map(u32::from).unwrap_or(gap2_default(is_fm, data_rate));
    prep.idam_sz = prep.gap_sync + mark + 4 + 2 + prep.post_crc_syncs + prep.gap_2;

    // Nominal track length at this rate and rotation.
    let standard_bc = data_rate * 400 * 300 / rpm;

    // Gap3 auto-fit: divide the slack at nominal length evenly between the
    // sectors, capped by the per-size-code ceiling.
    prep.gap_3 = match trk.gap_3 {
        Some(g) => g as u32,
        None if trk.nr_sectors == 0 => 0,
        None => {
            let min_bc = BC_PER_BYTE * min_track_bytes(secs, &prep, 0);
            let space = standard_bc.saturating_sub(min_bc);
            let ceiling = if is_fm { FM_GAP_3 } else { MFM_GAP_3 };
            let n = secs.first().map(|s| s.n as usize).unwrap_or(0);
            (space / (BC_PER_BYTE * trk.nr_sectors as u32)).min(ceiling[n])
        }
    };
    prep.dam_sz_post = 2 + prep.post_crc_syncs + prep.gap_3;

    // Quantize: at least the data-forced minimum, multiple of 32 bit-cells.
    let min_bc = BC_PER_BYTE * min_track_bytes(secs, &prep, prep.gap_3);
    prep.tracklen_bc = standard_bc.max(min_bc);
    prep.tracklen_bc = (prep.tracklen_bc + 31) & !31;
    prep.gap_4 = (prep.tracklen_bc - min_bc) / BC_PER_BYTE;

    log::trace!(
        "prep_track(): {} rate={}kbps rpm={} tracklen={}bc gaps 2/3/4a/4 = {}/{}/{}/{}",
        trk.encoding(),
        prep.data_rate,
        prep.rpm,
        prep.tracklen_bc,
        prep.gap_2,
        prep.gap_3,
        prep.gap_4a,
        prep.gap_4
    );

    Ok(prep)
}

/// Convert a run of bit-cell words into flux transition intervals, measured
/// in cells. Shared by every format's read path; the front end scales by
/// [`TrackPrep::cell_ns`] for real time.
pub fn rdata_flux(words: &[u16], out: &mut Vec<u32>) {
    let mut acc = 0u32;
    for &word in words {
        for bit in (0..16).rev() {
            acc += 1;
            if word & (1 << bit) != 0 {
                out.push(acc);
                acc = 0;
            }
        }
    }
}
