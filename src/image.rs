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

//! The `image` module defines the [`Image`] object: the open disk image, its
//! layout arena, the per-track encode/decode state, and the read/write
//! bit-cell rings pulled and pushed by the drive-emulation front end.
//!
//! Scheduling is single-threaded and cooperative. [`Image::read_track`] and
//! [`Image::write_track`] are non-blocking ticks: each either makes forward
//! progress or reports that it blocked on ring-buffer pressure. A
//! [`Image::setup_track`] call invalidates all per-track state and resets
//! both rings.

use crate::{
    codec::{self, fm, mfm, prep_track, TrackPrep, BC_PER_BYTE},
    config::TagOptions,
    file_parsers,
    host::HostPreference,
    io::{ReadWriteSeek, SeekFrom},
    layout::{LayoutArena, SecInfo, TrkInfo},
    ring::WordRing,
    types::FileLayout,
    util::{crc_ibm_3740_byte, get_length, CRC_CCITT_INITIAL},
    ConfigToken,
    ImageError,
    DATA_CHUNK,
};

/// Size of the read-side bit-cell ring in words. Must exceed the largest
/// single field (a 1 KiB data slice).
const RD_RING_WORDS: usize = 2048;
/// Size of the write-side ring: a full 8 KiB sector plus CRC must fit before
/// the decoder commits it to the file.
const WR_RING_WORDS: usize = 16384;

/// Mid-track write localization tolerance in bit-cells.
const WRITE_LOCATE_SLACK_BC: i64 = 64;

/// No IDAM has been seen on this track yet; a DAM must be located from the
/// write splice position.
const WRITE_SECTOR_NONE: i16 = -1;
/// Suppress DAMs until the next valid IDAM.
const WRITE_SECTOR_INVALID: i16 = -2;

/// Options supplied by the front end when opening an image.
#[derive(Debug, Default)]
pub struct OpenOptions {
    pub host: HostPreference,
    /// The image's file extension, used for handler dispatch and sidecar
    /// section scoring.
    pub tag: String,
    /// Token stream from the sidecar config parser; empty when absent.
    pub config: Vec<ConfigToken>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
enum WritePhase {
    /// Scanning the raw word stream for a sync pattern.
    #[default]
    Hunt,
    /// Synced; the next decoded byte is expected to be an address mark.
    Am,
    /// Collecting the IDAM id and CRC fields.
    IdamBody,
    /// Waiting for a full sector of data words plus CRC.
    DataWait,
}

pub struct Image<RWS: ReadWriteSeek> {
    pub(crate) io: RWS,
    pub(crate) file_size: u64,
    pub(crate) host: HostPreference,
    pub(crate) tag: String,
    pub(crate) tag_options: Option<TagOptions>,

    // Image envelope, populated by the format handler at open time.
    pub(crate) base_off: u64,
    pub(crate) step: u8,
    pub(crate) layout: FileLayout,
    pub(crate) post_crc_syncs: u8,
    pub(crate) can_extend: bool,
    pub(crate) arena: LayoutArena,
    /// Per-layout sector file-offset tables (XDF); empty for contiguous
    /// layouts. Indexed by track-layout index.
    pub(crate) sec_off_tables: Vec<Vec<u32>>,
    /// Fixed per-cylinder file span when sector-offset tables are in use.
    pub(crate) cyl_span: u64,
    /// Bit-cell delay applied to head 1 of non-zero cylinders (XDF head skew).
    pub(crate) head1_delay_bc: u32,

    // Per-track state, rebuilt by setup_track().
    cur_track: u16,
    cur_cyl: u16,
    cur_side: u8,
    cur_trk: TrkInfo,
    cur_secs: Vec<SecInfo>,
    cur_sec_offs: Option<Vec<u32>>,
    prep: TrackPrep,
    sec_map: [u8; 256],
    trk_off: u64,
    track_delay_bc: u32,

    // Read-path (encode) state.
    decode_pos: u32,
    trk_sec: u16,
    rd_sec_pos: u16,
    decode_data_pos: u16,
    crc: u16,
    mfm_prev: u16,
    rd_buf: Vec<u8>,
    rd_ring: WordRing,

    // Write-path (decode) state.
    wr_ring: WordRing,
    wr_phase: WritePhase,
    write_sector: i16,
    wr_sec: usize,
    wr_sec_sz: usize,
    wr_crc: u16,
    wr_buf: Vec<u8>,
    write_start_bc: u32,
}

impl<RWS: ReadWriteSeek> Image<RWS> {
    /// Open a disk image. Format handlers matching the tag are tried in
    /// order; a handler that positively claims the file populates the
    /// layout arena and envelope, after which the track map is finalised.
    pub fn open(io: RWS, options: OpenOptions) -> Result<Image<RWS>, ImageError> {
        let mut io = io;
        let file_size = get_length(&mut io)?;

        let mut im = Image {
            io,
            file_size,
            host: options.host,
            tag: options.tag.to_lowercase(),
            tag_options: None,
            base_off: 0,
            step: 1,
            layout: FileLayout::empty(),
            post_crc_syncs: 0,
            can_extend: false,
            arena: LayoutArena::new(),
            sec_off_tables: Vec::new(),
            cyl_span: 0,
            head1_delay_bc: 0,
            cur_track: 0,
            cur_cyl: 0,
            cur_side: 0,
            cur_trk: TrkInfo::default(),
            cur_secs: Vec::new(),
            cur_sec_offs: None,
            prep: TrackPrep::default(),
            sec_map: [0; 256],
            trk_off: 0,
            track_delay_bc: 0,
            decode_pos: 0,
            trk_sec: 0,
            rd_sec_pos: 0,
            decode_data_pos: 0,
            crc: CRC_CCITT_INITIAL,
            mfm_prev: 0,
            rd_buf: vec![0; DATA_CHUNK],
            rd_ring: WordRing::new(RD_RING_WORDS),
            wr_ring: WordRing::new(WR_RING_WORDS),
            wr_phase: WritePhase::Hunt,
            write_sector: WRITE_SECTOR_NONE,
            wr_sec: 0,
            wr_sec_sz: 0,
            wr_crc: 0,
            wr_buf: vec![0; DATA_CHUNK],
            write_start_bc: 0,
        };

        if !options.config.is_empty() {
            im.tag_options = crate::config::apply_tags(options.config, &im.tag, file_size)?;
        }

        for handler in file_parsers::handlers_for_tag(&im.tag) {
            match handler.open(&mut im) {
                Ok(true) => {
                    im.raw_open()?;
                    log::info!(
                        "open(): {:?} claimed image: {} cyls, {} sides, {} bytes",
                        handler,
                        im.arena.nr_cyls(),
                        im.arena.nr_sides(),
                        im.file_size
                    );
                    return Ok(im);
                }
                Ok(false) => {
                    // Not this format; discard any partial layout and move on.
                    im.reset_layout();
                }
                Err(e) => return Err(e),
            }
        }

        Err(ImageError::NotThisFormat)
    }

    fn reset_layout(&mut self) {
        self.arena = LayoutArena::new();
        self.base_off = 0;
        self.step = 1;
        self.layout = FileLayout::empty();
        self.post_crc_syncs = 0;
        self.can_extend = false;
        self.sec_off_tables = Vec::new();
        self.cyl_span = 0;
        self.head1_delay_bc = 0;
    }

    /// Final validation after a handler claims the image. The arena is
    /// immutable from here on.
    fn raw_open(&mut self) -> Result<(), ImageError> {
        self.arena.finalise_track_map()
    }

    // ------------------------------------------------------------------
    // Accessors

    pub fn nr_cyls(&self) -> u16 {
        self.arena.nr_cyls()
    }

    pub fn nr_sides(&self) -> u8 {
        self.arena.nr_sides()
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn file_layout(&self) -> FileLayout {
        self.layout
    }

    /// The encoding parameters of the current track.
    pub fn prep(&self) -> &TrackPrep {
        &self.prep
    }

    pub fn tracklen_bc(&self) -> u32 {
        self.prep.tracklen_bc
    }

    /// The current track's descriptor and sectors, in file order.
    pub fn track_info(&self) -> (&TrkInfo, &[SecInfo]) {
        (&self.cur_trk, &self.cur_secs)
    }

    /// The rotational-order map of the current track: slot -> sector index.
    pub fn sector_map(&self) -> &[u8] {
        &self.sec_map[..self.cur_secs.len()]
    }

    /// Absolute file offset of the current track's data.
    pub fn track_offset(&self) -> u64 {
        self.trk_off
    }

    /// The encoder's position state: `(decode_pos, trk_sec, rd_sec_pos,
    /// decode_data_pos)`. `decode_pos` is 0 in the post-index gap,
    /// `1 + 4k + f` within rotational slot k (f: IDAM, DAM preamble, data,
    /// post-data), and `4 * nr_sectors + 1` in the pre-index gap.
    pub fn position_state(&self) -> (u32, u16, u16, u16) {
        (self.decode_pos, self.trk_sec, self.rd_sec_pos, self.decode_data_pos)
    }

    // ------------------------------------------------------------------
    // Seek / position engine

    /// Select a physical track, rebuild the rotational map and encoding
    /// parameters, and reset both rings and all per-track encode/decode
    /// state. `start_pos_bc` is the bit-cell position the head currently
    /// occupies; the returned position is snapped back to the start of the
    /// enclosing field, where emission will resume.
    pub fn setup_track(&mut self, track: u16, start_pos_bc: u32) -> Result<u32, ImageError> {
        self.seek_track(track)?;

        self.rd_ring.clear();
        self.wr_ring.clear();
        self.wr_phase = WritePhase::Hunt;
        self.write_sector = WRITE_SECTOR_NONE;
        self.write_start_bc = 0;
        self.mfm_prev = 0;
        self.crc = CRC_CCITT_INITIAL;

        let pos = start_pos_bc % self.prep.tracklen_bc;
        Ok(self.calc_start_pos(pos))
    }

    fn seek_track(&mut self, track: u16) -> Result<(), ImageError> {
        let side = (track & 1) as u8;
        let cyl = (track >> 1) / self.step as u16;
        self.cur_track = track;
        self.cur_cyl = cyl;
        self.cur_side = side;

        if cyl < self.arena.nr_cyls() && side < self.arena.nr_sides() {
            let idx = self.arena.map_get(cyl, side);
            self.cur_trk = self.arena.trk(idx).clone();
            self.cur_secs = self.arena.sectors(idx).to_vec();
            self.cur_sec_offs = self.sec_off_tables.get(idx as usize).cloned();
        }
        else {
            // Seeked beyond the image geometry: present an unformatted track.
            log::debug!("seek_track(): track {} outside image geometry", track);
            self.cur_trk = TrkInfo::default();
            self.cur_secs = Vec::new();
            self.cur_sec_offs = None;
        }

        self.prep = prep_track(&self.cur_trk, &self.cur_secs, self.post_crc_syncs)?;
        self.build_sec_map();

        self.trk_off = if self.cyl_span != 0 {
            self.base_off + cyl as u64 * self.cyl_span
        }
        else {
            self.base_off + self.track_file_offset(cyl, side)
        };

        self.track_delay_bc = if side == 1 && cyl > 0 { self.head1_delay_bc } else { 0 };

        self.decode_pos = 0;
        self.trk_sec = 0;
        self.rd_sec_pos = 0;
        self.decode_data_pos = 0;

        log::trace!(
            "seek_track(): track {} -> cyl {} side {} @ {:#x}, {} sectors, {} bc",
            track,
            cyl,
            side,
            self.trk_off,
            self.cur_secs.len(),
            self.prep.tracklen_bc
        );
        Ok(())
    }

    /// Classic interleave fill: starting from the skewed origin, place file
    /// sector `i` every `interleave` rotational slots, skipping forward
    /// linearly over slots already taken.
    fn build_sec_map(&mut self) {
        let nr = self.cur_secs.len();
        self.sec_map = [0; 256];
        if nr == 0 {
            return;
        }
        let mut filled = [false; 256];
        let origin = (self.cur_cyl as usize * self.cur_trk.cskew as usize
            + self.cur_side as usize * self.cur_trk.hskew as usize)
            % nr;
        let interleave = self.cur_trk.interleave.max(1) as usize;

        let mut pos = origin;
        for i in 0..nr {
            while filled[pos] {
                pos = (pos + 1) % nr;
            }
            self.sec_map[pos] = i as u8;
            filled[pos] = true;
            pos = (pos + interleave) % nr;
        }
    }

    /// The ordinal of a physical track's data within the backing file, under
    /// the file-layout bits.
    fn file_index(&self, cyl: u16, side: u8) -> u32 {
        let nr_cyls = self.arena.nr_cyls() as u32;
        let nr_sides = self.arena.nr_sides() as u32;
        let s = if self.layout.contains(FileLayout::SIDES_SWAPPED) {
            (side ^ (self.arena.nr_sides() - 1)) as u32
        }
        else {
            side as u32
        };
        let c = if self.layout.is_reversed(s as u8) {
            nr_cyls - 1 - cyl as u32
        }
        else {
            cyl as u32
        };
        if self.layout.contains(FileLayout::SEQUENTIAL) {
            s * nr_cyls + c
        }
        else {
            c * nr_sides + s
        }
    }

    /// Byte offset of a track's data: the summed encoded data sizes of every
    /// physical track ordered before it in the file. Summing (rather than
    /// multiplying) accommodates images that mix track layouts, like the
    /// IBM 3174 2.4MB format.
    fn track_file_offset(&self, cyl: u16, side: u8) -> u64 {
        let my_index = self.file_index(cyl, side);
        let mut offset = 0u64;
        for c in 0..self.arena.nr_cyls() {
            for s in 0..self.arena.nr_sides() {
                if self.file_index(c, s) < my_index {
                    offset += self.arena.track_data_bytes(self.arena.map_get(c, s)) as u64;
                }
            }
        }
        offset
    }

    /// Byte offset of a sector's data within the current track's file span.
    fn sector_file_off(&self, sec_idx: usize) -> u64 {
        match &self.cur_sec_offs {
            Some(table) => table[sec_idx] as u64,
            None => self.cur_secs[..sec_idx].iter().map(|s| s.bytes() as u64).sum(),
        }
    }

    /// Translate a bit-cell position within the track into the decode state
    /// of the enclosing field, returning the field's start position.
    fn calc_start_pos(&mut self, pos_bc: u32) -> u32 {
        let nr = self.cur_secs.len() as u32;
        self.trk_sec = 0;
        self.rd_sec_pos = 0;
        self.decode_data_pos = 0;

        let mut acc = self.prep.idx_sz * BC_PER_BYTE;
        if pos_bc < acc {
            self.decode_pos = 0;
            return 0;
        }

        for k in 0..nr {
            let sec = self.cur_secs[self.sec_map[k as usize] as usize];

            let idam = self.prep.idam_sz * BC_PER_BYTE;
            if pos_bc < acc + idam {
                self.decode_pos = 1 + 4 * k;
                self.trk_sec = k as u16;
                return acc;
            }
            acc += idam;

            let pre = self.prep.dam_sz_pre * BC_PER_BYTE;
            if pos_bc < acc + pre {
                self.decode_pos = 1 + 4 * k + 1;
                self.trk_sec = k as u16;
                return acc;
            }
            acc += pre;

            let bytes = sec.bytes() as u32;
            let mut chunk = 0u32;
            while chunk * (DATA_CHUNK as u32) < bytes {
                let len = (bytes - chunk * DATA_CHUNK as u32).min(DATA_CHUNK as u32) * BC_PER_BYTE;
                if pos_bc < acc + len {
                    self.decode_pos = 1 + 4 * k + 2;
                    self.trk_sec = k as u16;
                    self.decode_data_pos = chunk as u16;
                    self.rd_sec_pos = chunk as u16;
                    // Resuming mid-sector: the CRC register restarts from the
                    // mark seed, as if from the first data byte.
                    self.crc = self.dam_crc_seed();
                    return acc;
                }
                acc += len;
                chunk += 1;
            }

            let post = self.prep.dam_sz_post * BC_PER_BYTE;
            if pos_bc < acc + post {
                self.decode_pos = 1 + 4 * k + 3;
                self.trk_sec = k as u16;
                return acc;
            }
            acc += post;
        }

        // Somewhere in the pre-index gap.
        let gap_start = acc;
        self.decode_pos = 4 * nr + 1;
        let mut chunk = 0u32;
        while acc < self.prep.tracklen_bc {
            let remain = (self.prep.gap_4 - chunk * DATA_CHUNK as u32).min(DATA_CHUNK as u32);
            let len = remain * BC_PER_BYTE;
            if pos_bc < acc + len || remain == 0 {
                self.decode_data_pos = chunk as u16;
                return acc;
            }
            acc += len;
            chunk += 1;
        }
        self.decode_data_pos = 0;
        gap_start
    }

    fn dam_crc_seed(&self) -> u16 {
        if self.prep.is_fm {
            codec::FM_DAM_CRC
        }
        else {
            codec::MFM_DAM_CRC
        }
    }

    // ------------------------------------------------------------------
    // Read path (track encoder)

    #[inline]
    fn emit_raw(&mut self, word: u16) {
        self.rd_ring.push(word);
        self.mfm_prev = word;
    }

    #[inline]
    fn emit_byte(&mut self, byte: u8) {
        let word = if self.prep.is_fm {
            fm::encode_byte(byte)
        }
        else {
            mfm::encode_byte(byte, self.mfm_prev)
        };
        self.emit_raw(word);
    }

    #[inline]
    fn emit_byte_crc(&mut self, byte: u8) {
        self.crc = crc_ibm_3740_byte(byte, self.crc);
        self.emit_byte(byte);
    }

    fn emit_fill(&mut self, byte: u8, count: u32) {
        for _ in 0..count {
            self.emit_byte(byte);
        }
    }

    /// Emit the post-CRC resync words some hosts expect (UKNC).
    fn emit_post_crc_syncs(&mut self) {
        for _ in 0..self.prep.post_crc_syncs {
            if self.prep.is_fm {
                self.emit_byte(0x00);
            }
            else {
                self.emit_raw(mfm::SYNC_WORD);
            }
        }
    }

    /// Load one sub-chunk of the current sector's file data into the read
    /// buffer.
    fn fetch_data(&mut self, sec_idx: usize, chunk: u16, len: usize) -> Result<(), ImageError> {
        let off = self.trk_off + self.sector_file_off(sec_idx) + chunk as u64 * DATA_CHUNK as u64;
        self.io.seek(SeekFrom::Start(off))?;
        self.io.read_exact(&mut self.rd_buf[..len])?;
        self.rd_sec_pos = chunk + 1;
        Ok(())
    }

    /// One encoder tick. Emits the next track field into the read ring if
    /// there is room for all of it, returning false when blocked. Emission
    /// proceeds in strict rotational order and wraps at the index.
    pub fn read_track(&mut self) -> Result<bool, ImageError> {
        let nr = self.cur_secs.len() as u32;
        let pos = self.decode_pos;
        let filler = self.prep.filler();

        // Post-index gap and IAM.
        if pos == 0 {
            if self.rd_ring.space() < self.prep.idx_sz as usize {
                return Ok(false);
            }
            self.emit_fill(filler, self.prep.gap_4a);
            if self.cur_trk.has_iam {
                self.emit_fill(0x00, self.prep.gap_sync);
                if self.prep.is_fm {
                    self.emit_raw(fm::sync_word(0xFC, fm::IAM_SYNC_CLK));
                }
                else {
                    for _ in 0..3 {
                        self.emit_raw(mfm::IAM_SYNC_WORD);
                    }
                    self.emit_byte(0xFC);
                }
                self.emit_fill(filler, self.prep.gap_1);
            }
            self.decode_pos = if nr == 0 { 4 * nr + 1 } else { 1 };
            self.trk_sec = 0;
            return Ok(true);
        }

        // Pre-index gap, emitted in sub-chunks.
        if pos == 4 * nr + 1 {
            let done = self.decode_data_pos as u32 * DATA_CHUNK as u32;
            let chunk = (self.prep.gap_4 - done).min(DATA_CHUNK as u32);
            if self.rd_ring.space() < chunk as usize {
                return Ok(false);
            }
            self.emit_fill(filler, chunk);
            if done + chunk >= self.prep.gap_4 {
                // Wrapped past the index; the next tick starts a fresh
                // revolution.
                self.decode_pos = 0;
                self.decode_data_pos = 0;
                self.trk_sec = 0;
            }
            else {
                self.decode_data_pos += 1;
            }
            return Ok(true);
        }

        let k = (pos - 1) / 4;
        let field = (pos - 1) % 4;
        let sec_idx = self.sec_map[k as usize] as usize;
        let sec = self.cur_secs[sec_idx];

        match field {
            0 => {
                // IDAM: sync, mark, C H R N, CRC, resyncs, Gap2.
                if self.rd_ring.space() < self.prep.idam_sz as usize {
                    return Ok(false);
                }
                let c = (self.cur_cyl & 0xFF) as u8;
                let h = match self.cur_trk.head {
                    0 => (self.cur_track & 1) as u8,
                    fixed => fixed - 1,
                };

                self.emit_fill(0x00, self.prep.gap_sync);
                self.crc = CRC_CCITT_INITIAL;
                if self.prep.is_fm {
                    self.emit_raw(fm::sync_word(0xFE, fm::SYNC_CLK));
                    self.crc = crc_ibm_3740_byte(0xFE, self.crc);
                }
                else {
                    for _ in 0..3 {
                        self.emit_raw(mfm::SYNC_WORD);
                        self.crc = crc_ibm_3740_byte(mfm::SYNC_BYTE, self.crc);
                    }
                    self.emit_byte_crc(0xFE);
                }
                self.emit_byte_crc(c);
                self.emit_byte_crc(h);
                self.emit_byte_crc(sec.r);
                self.emit_byte_crc(sec.n);
                let crc = self.crc;
                self.emit_byte((crc >> 8) as u8);
                self.emit_byte(crc as u8);
                self.emit_post_crc_syncs();
                self.emit_fill(filler, self.prep.gap_2);
                self.decode_pos += 1;
            }
            1 => {
                // DAM preamble. The CRC register is seeded with the CRC of
                // the mark prefix so it can be continued across data chunks.
                if self.rd_ring.space() < self.prep.dam_sz_pre as usize {
                    return Ok(false);
                }
                self.emit_fill(0x00, self.prep.gap_sync);
                if self.prep.is_fm {
                    self.emit_raw(fm::sync_word(0xFB, fm::SYNC_CLK));
                }
                else {
                    for _ in 0..3 {
                        self.emit_raw(mfm::SYNC_WORD);
                    }
                    self.emit_byte(0xFB);
                }
                self.crc = self.dam_crc_seed();
                self.rd_sec_pos = 0;
                self.decode_data_pos = 0;
                self.decode_pos += 1;
            }
            2 => {
                // Sector data, one sub-chunk per tick.
                let bytes = sec.bytes() as u32;
                let done = self.decode_data_pos as u32 * DATA_CHUNK as u32;
                let chunk = (bytes - done).min(DATA_CHUNK as u32);
                if self.rd_ring.space() < chunk as usize {
                    return Ok(false);
                }
                if self.rd_sec_pos <= self.decode_data_pos {
                    self.fetch_data(sec_idx, self.decode_data_pos, chunk as usize)?;
                }
                let invert = if self.cur_trk.invert_data { 0xFF } else { 0x00 };
                for i in 0..chunk as usize {
                    let b = self.rd_buf[i] ^ invert;
                    self.emit_byte_crc(b);
                }
                if done + chunk >= bytes {
                    self.decode_pos += 1;
                }
                else {
                    self.decode_data_pos += 1;
                }
            }
            _ => {
                // Post-data: data CRC, resyncs, Gap3.
                if self.rd_ring.space() < self.prep.dam_sz_post as usize {
                    return Ok(false);
                }
                let crc = self.crc;
                self.emit_byte((crc >> 8) as u8);
                self.emit_byte(crc as u8);
                self.emit_post_crc_syncs();
                self.emit_fill(filler, self.prep.gap_3);
                self.trk_sec += 1;
                self.decode_pos += 1;
            }
        }
        Ok(true)
    }

    /// Consume one word from the read ring.
    pub fn pop_read(&mut self) -> Option<u16> {
        self.rd_ring.pop()
    }

    /// Words currently buffered for the front end.
    pub fn read_buffered(&self) -> usize {
        self.rd_ring.len()
    }

    // ------------------------------------------------------------------
    // Write path (track decoder)

    /// Record the bit-cell position at which the front end opened the write
    /// splice, and reset the decoder's scan state.
    pub fn start_write(&mut self, pos_bc: u32) {
        self.write_start_bc = if self.prep.tracklen_bc != 0 {
            pos_bc % self.prep.tracklen_bc
        }
        else {
            pos_bc
        };
        self.wr_phase = WritePhase::Hunt;
    }

    /// Produce one word into the write ring. Returns false when full.
    pub fn push_write(&mut self, word: u16) -> bool {
        self.wr_ring.push(word)
    }

    pub fn write_space(&self) -> usize {
        self.wr_ring.space()
    }

    #[inline]
    fn decode_word(&self, word: u16) -> u8 {
        if self.prep.is_fm {
            fm::decode_byte(word)
        }
        else {
            mfm::decode_byte(word)
        }
    }

    /// A write began mid-track with no IDAM yet seen: localize the target
    /// sector from the splice position. Walking the rotational order, the
    /// splice must land within the locate slack of some sector's DAM area.
    fn raw_find_first_write_sector(&self) -> Option<usize> {
        let mut base = self.write_start_bc as i64 - self.track_delay_bc as i64;
        base -= ((self.prep.idx_sz + self.prep.idam_sz) * BC_PER_BYTE) as i64;
        for k in 0..self.cur_secs.len() {
            if base.abs() <= WRITE_LOCATE_SLACK_BC {
                return Some(self.sec_map[k] as usize);
            }
            let sec = self.cur_secs[self.sec_map[k] as usize];
            base -= (self.prep.enc_sec_sz(&sec) * BC_PER_BYTE) as i64;
        }
        None
    }

    fn dispatch_dam(&mut self) {
        if self.write_sector == WRITE_SECTOR_NONE {
            match self.raw_find_first_write_sector() {
                Some(idx) => {
                    log::debug!(
                        "dispatch_dam(): located mid-track write at sector index {} (id {})",
                        idx,
                        self.cur_secs[idx].r
                    );
                    self.write_sector = idx as i16;
                }
                None => {
                    log::warn!(
                        "dispatch_dam(): cannot locate mid-track write at {} bc; dropping",
                        self.write_start_bc
                    );
                    self.write_sector = WRITE_SECTOR_INVALID;
                    self.wr_phase = WritePhase::Hunt;
                    return;
                }
            }
        }
        if self.write_sector == WRITE_SECTOR_INVALID {
            log::debug!("dispatch_dam(): DAM with no valid IDAM; discarding");
            self.wr_phase = WritePhase::Hunt;
            return;
        }

        self.wr_sec = self.write_sector as usize;
        self.wr_sec_sz = self.cur_secs[self.wr_sec].bytes();
        self.wr_crc = self.dam_crc_seed();
        self.wr_phase = WritePhase::DataWait;
    }

    fn handle_am_byte(&mut self, byte: u8) {
        match byte {
            0xFE => {
                self.wr_crc = if self.prep.is_fm {
                    codec::FM_IDAM_CRC
                }
                else {
                    codec::MFM_IDAM_CRC
                };
                self.wr_phase = WritePhase::IdamBody;
            }
            0xFB => self.dispatch_dam(),
            _ => self.wr_phase = WritePhase::Hunt,
        }
    }

    /// Drain the full sector payload plus CRC, committing decoded bytes to
    /// the backing file in 1 KiB slices.
    fn flush_write_sector(&mut self) -> Result<(), ImageError> {
        let invert = if self.cur_trk.invert_data { 0xFF } else { 0x00 };
        let total = self.wr_sec_sz;
        let base = self.trk_off + self.sector_file_off(self.wr_sec);

        let mut chunk = 0usize;
        while chunk * DATA_CHUNK < total {
            let len = (total - chunk * DATA_CHUNK).min(DATA_CHUNK);
            for i in 0..len {
                let word = self.wr_ring.pop().unwrap_or(0);
                let byte = self.decode_word(word);
                self.wr_crc = crc_ibm_3740_byte(byte, self.wr_crc);
                self.wr_buf[i] = byte ^ invert;
            }
            self.io.seek(SeekFrom::Start(base + (chunk * DATA_CHUNK) as u64))?;
            self.io.write_all(&self.wr_buf[..len])?;
            chunk += 1;
        }

        for _ in 0..2 {
            let word = self.wr_ring.pop().unwrap_or(0);
            let byte = self.decode_word(word);
            self.wr_crc = crc_ibm_3740_byte(byte, self.wr_crc);
        }
        if self.wr_crc != 0 {
            // Keep the write: the drive firmware convention is that a
            // torn CRC does not undo bytes already committed.
            log::warn!(
                "flush_write_sector(): data CRC mismatch on sector id {}; keeping write",
                self.cur_secs[self.wr_sec].r
            );
        }
        log::trace!(
            "flush_write_sector(): wrote {} bytes for sector id {} at {:#x}",
            total,
            self.cur_secs[self.wr_sec].r,
            base
        );

        // A fresh IDAM is required before the next DAM is honored.
        self.write_sector = WRITE_SECTOR_INVALID;
        self.wr_phase = WritePhase::Hunt;
        Ok(())
    }

    /// One decoder tick. Consumes buffered write words, parses address
    /// marks, and commits located sectors to the file. Returns false when no
    /// forward progress could be made. Within a track-write cycle, the file
    /// write for a sector is issued strictly after its IDAM CRC validates
    /// and strictly before the next sector's IDAM is consumed.
    pub fn write_track(&mut self) -> Result<bool, ImageError> {
        // The producer's end index is sampled once per wait below; in the
        // original firmware a memory barrier separates that read from the
        // buffer reads that follow. Single-threaded here, the ring's
        // counter discipline carries the same ordering.
        let mut progress = false;

        loop {
            match self.wr_phase {
                WritePhase::Hunt => {
                    let Some(word) = self.wr_ring.pop() else { break };
                    progress = true;
                    let synced = if self.prep.is_fm {
                        word == fm::HUNT_WORD
                    }
                    else {
                        word == mfm::SYNC_WORD
                    };
                    if synced {
                        self.wr_phase = WritePhase::Am;
                    }
                }
                WritePhase::Am => {
                    let Some(word) = self.wr_ring.pop() else { break };
                    progress = true;
                    if self.prep.is_fm {
                        if word == fm::HUNT_WORD {
                            // Still in the sync run.
                        }
                        else if fm::decode_clock(word) == fm::SYNC_CLK {
                            let byte = fm::decode_byte(word);
                            self.handle_am_byte(byte);
                        }
                        else {
                            self.wr_phase = WritePhase::Hunt;
                        }
                    }
                    else {
                        let byte = mfm::decode_byte(word);
                        if byte == mfm::SYNC_BYTE {
                            // Another A1 of the triple-sync prefix.
                        }
                        else {
                            self.handle_am_byte(byte);
                        }
                    }
                }
                WritePhase::IdamBody => {
                    // C, H, R, N plus the CRC word.
                    if self.wr_ring.len() < 6 {
                        break;
                    }
                    progress = true;
                    let mut id = [0u8; 6];
                    for b in id.iter_mut() {
                        let word = self.wr_ring.pop().unwrap_or(0);
                        *b = self.decode_word(word);
                        self.wr_crc = crc_ibm_3740_byte(*b, self.wr_crc);
                    }
                    if self.wr_crc != 0 {
                        log::warn!(
                            "write_track(): IDAM CRC mismatch (C={} H={} R={} N={}); ignoring",
                            id[0],
                            id[1],
                            id[2],
                            id[3]
                        );
                    }
                    else {
                        let r = id[2];
                        match self.cur_secs.iter().position(|s| s.r == r) {
                            Some(idx) => self.write_sector = idx as i16,
                            None => {
                                log::warn!("write_track(): unknown sector id {} in IDAM", r);
                                self.write_sector = WRITE_SECTOR_INVALID;
                            }
                        }
                    }
                    self.wr_phase = WritePhase::Hunt;
                }
                WritePhase::DataWait => {
                    if self.wr_ring.len() < self.wr_sec_sz + 2 {
                        break;
                    }
                    self.flush_write_sector()?;
                    progress = true;
                }
            }
        }

        Ok(progress)
    }

    // ------------------------------------------------------------------
    // File growth

    /// Pad the backing file out to its full geometry size, for formats that
    /// permit growing on write. Returns the resulting file size.
    pub fn extend(&mut self) -> Result<u64, ImageError> {
        if !self.can_extend {
            return Ok(self.file_size);
        }
        let mut full = self.base_off;
        for c in 0..self.arena.nr_cyls() {
            for s in 0..self.arena.nr_sides() {
                full += self.arena.track_data_bytes(self.arena.map_get(c, s)) as u64;
            }
        }
        if self.file_size < full {
            log::debug!("extend(): padding image from {} to {} bytes", self.file_size, full);
            self.io.seek(SeekFrom::Start(self.file_size))?;
            let zeros = [0u8; 512];
            let mut remain = full - self.file_size;
            while remain > 0 {
                let n = remain.min(zeros.len() as u64) as usize;
                self.io.write_all(&zeros[..n])?;
                remain -= n as u64;
            }
            self.file_size = full;
        }
        Ok(self.file_size)
    }
}
