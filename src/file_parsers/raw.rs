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

    src/file_parsers/raw.rs

    The raw sector-image handler: headerless images resolved by sidecar
    tags, host catalogue tables and BPB probing, including the per-host
    quirks (UKNC sync/gap overrides, the two-zone IBM 3174 2.4MB format).
*/

use crate::{
    boot_sector::probe_bpb,
    config::TagOptions,
    host::HostPreference,
    image::Image,
    io::ReadWriteSeek,
    layout::{catalog, SimpleLayout},
    ImageError,
};

/// The IBM 3174 Establishment Controller's 2.4MB diskette: 15 sectors per
/// track at 360 rpm on cylinder 0, 30 sectors at 180 rpm elsewhere.
pub const IBM_3174_SIZE: u64 = 2_442_240;
const IBM_3174_GAP_3: u16 = 104;

pub struct RawFormat;

impl RawFormat {
    pub(crate) fn open<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        // Sidecar tags take precedence over all probing.
        if im.tag_options.is_some() {
            return Self::open_tagged(im);
        }

        if matches!(
            im.host,
            HostPreference::Ibm3174 | HostPreference::PcDos | HostPreference::Unspecified
        ) && im.file_size == IBM_3174_SIZE
        {
            return Self::open_ibm_3174(im);
        }

        let Some((entry, nr_cyls)) = catalog::select(im.host, im.file_size) else {
            return Ok(false);
        };

        let mut layout = entry.to_layout();
        let mut nr_cyls = nr_cyls;
        let mut nr_sides = entry.nr_sides;

        // For PC-style media the BPB can settle geometry the size alone
        // cannot (MSX 320K being the classic case). The BPB is preferred
        // unless it contradicts the file size.
        if entry.n == 2
            && matches!(
                im.host,
                HostPreference::Unspecified | HostPreference::PcDos | HostPreference::Msx
            )
        {
            if let Some(bpb) = probe_bpb(&mut im.io, 0) {
                let implied = bpb.total_sectors as u64 * bpb.bytes_per_sector as u64;
                match (bpb.n(), bpb.cylinders()) {
                    (Some(n), Some(cyls)) if implied == im.file_size => {
                        log::debug!(
                            "open(): BPB geometry {}x{}x{} n={} overrides catalogue entry",
                            cyls,
                            bpb.number_of_heads,
                            bpb.sectors_per_track,
                            n
                        );
                        nr_cyls = cyls;
                        nr_sides = bpb.number_of_heads as u8;
                        layout.nr_sectors = bpb.sectors_per_track;
                        layout.n = n;
                    }
                    _ => {
                        log::debug!("open(): BPB present but contradicts file size; ignoring");
                    }
                }
            }
        }

        if im.host == HostPreference::Uknc {
            // UKNC DWP controllers: no IAM, short gaps, and one extra A1
            // resync word after each CRC.
            layout.has_iam = false;
            layout.gap_2 = Some(24);
            layout.gap_4a = Some(27);
            im.post_crc_syncs = 1;
        }

        im.arena.init_track_map(nr_cyls, nr_sides)?;
        im.arena.simple_layout(&layout)?;
        Ok(true)
    }

    /// Build a layout from the best-scoring sidecar config section. Zones
    /// introduced by `tracks=` directives each get their own track layouts;
    /// cells not claimed by any zone keep the base layout.
    fn open_tagged<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        let opts: TagOptions = match im.tag_options.take() {
            Some(opts) => opts,
            None => return Ok(false),
        };

        let nr_cyls = opts.cyls.ok_or(ImageError::BadImage("config section missing cyls"))?;
        let nr_sides = opts.heads.ok_or(ImageError::BadImage("config section missing heads"))?;
        im.step = opts.step.unwrap_or(1).clamp(1, 2);
        im.layout = opts.file_layout;

        im.arena.init_track_map(nr_cyls, nr_sides)?;
        im.arena.simple_layout(&opts.base)?;

        for zone in &opts.zones {
            Self::tag_add_layout(im, &zone.layout, &zone.selector)?;
        }
        Ok(true)
    }

    /// Add one zone's per-side track layouts and point the matching
    /// track-map cells at them.
    fn tag_add_layout<RWS: ReadWriteSeek>(
        im: &mut Image<RWS>,
        layout: &SimpleLayout,
        selector: &[crate::config::TrackRange],
    ) -> Result<(), ImageError> {
        let nr_sides = im.arena.nr_sides();
        let mut side_idx = [0u8; 2];
        for side in 0..nr_sides {
            side_idx[side as usize] = im.arena.add_layout(layout, side)?;
        }
        for cyl in 0..im.arena.nr_cyls() {
            for side in 0..nr_sides {
                if selector.iter().any(|r| r.matches(cyl, side)) {
                    im.arena.map_set(cyl, side, side_idx[side as usize]);
                }
            }
        }
        Ok(())
    }

    /// Two layouts in one image: the 3174's cylinder 0 is a 15-sector
    /// 360 rpm track, cylinders 1..79 carry 30 sectors at 180 rpm.
    fn open_ibm_3174<RWS: ReadWriteSeek>(im: &mut Image<RWS>) -> Result<bool, ImageError> {
        im.arena.init_track_map(80, 2)?;

        let cyl0 = SimpleLayout {
            nr_sectors: 15,
            n: 2,
            rpm: 360,
            gap_3: Some(IBM_3174_GAP_3),
            ..SimpleLayout::default()
        };
        let rest = SimpleLayout {
            nr_sectors: 30,
            rpm: 180,
            ..cyl0.clone()
        };

        for side in 0..2u8 {
            let idx0 = im.arena.add_layout(&cyl0, side)?;
            let idx1 = im.arena.add_layout(&rest, side)?;
            im.arena.map_set(0, side, idx0);
            for cyl in 1..80 {
                im.arena.map_set(cyl, side, idx1);
            }
        }
        Ok(true)
    }
}
