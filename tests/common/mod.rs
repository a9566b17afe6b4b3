#![allow(dead_code)]

use std::{
    cell::RefCell,
    io::{Cursor, Read, Result as IoResult, Seek, SeekFrom, Write},
    rc::Rc,
};

use trackcast::{
    codec::{fm, mfm},
    image::Image,
    util::crc_ibm_3740,
};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A cloneable in-memory backing file: the test keeps one handle while the
/// image owns another, so file contents can be inspected after writes.
#[derive(Clone)]
pub struct SharedBuf {
    inner: Rc<RefCell<Cursor<Vec<u8>>>>,
}

impl SharedBuf {
    pub fn new(data: Vec<u8>) -> SharedBuf {
        SharedBuf {
            inner: Rc::new(RefCell::new(Cursor::new(data))),
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.borrow().get_ref().clone()
    }
}

impl Read for SharedBuf {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.inner.borrow_mut().read(buf)
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        self.inner.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> IoResult<()> {
        self.inner.borrow_mut().flush()
    }
}

impl Seek for SharedBuf {
    fn seek(&mut self, pos: SeekFrom) -> IoResult<u64> {
        self.inner.borrow_mut().seek(pos)
    }
}

/// Deterministic pseudo-random fill so failures reproduce.
pub fn pattern_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect()
}

/// Pump the encoder for exactly one revolution's worth of bit-cell words.
pub fn pump_revolution<RWS>(im: &mut Image<RWS>) -> Vec<u16>
where
    RWS: Read + Write + Seek,
{
    let words_per_rev = (im.tracklen_bc() / 16) as usize;
    let mut words = Vec::with_capacity(words_per_rev);
    while words.len() < words_per_rev {
        while im.read_buffered() == 0 {
            assert!(im.read_track().expect("read_track"), "encoder stalled");
        }
        while words.len() < words_per_rev {
            match im.pop_read() {
                Some(w) => words.push(w),
                None => break,
            }
        }
    }
    words
}

/// Feed a word stream through the write ring, ticking the decoder whenever
/// the ring fills, then drain it.
pub fn feed_words<RWS>(im: &mut Image<RWS>, words: &[u16])
where
    RWS: Read + Write + Seek,
{
    for &word in words {
        while !im.push_write(word) {
            im.write_track().expect("write_track");
        }
    }
    while im.write_track().expect("write_track") {}
}

pub struct DecodedSector {
    pub c: u8,
    pub h: u8,
    pub r: u8,
    pub n: u8,
    pub idam_crc: u16,
    pub idam_ok: bool,
    pub data: Vec<u8>,
    pub data_ok: bool,
}

/// Decode an MFM bit-cell stream into its sectors, independently verifying
/// every CRC against the raw stream bytes.
pub fn decode_mfm_track(words: &[u16]) -> Vec<DecodedSector> {
    let mut sectors = Vec::new();
    let mut i = 0;
    let mut pending: Option<(u8, u8, u8, u8, u16, bool)> = None;

    while i < words.len() {
        if words[i] != mfm::SYNC_WORD {
            i += 1;
            continue;
        }
        // Skip the remainder of the sync prefix.
        while i < words.len() && words[i] == mfm::SYNC_WORD {
            i += 1;
        }
        if i >= words.len() {
            break;
        }
        let am = mfm::decode_byte(words[i]);
        i += 1;
        match am {
            0xFE => {
                if i + 6 > words.len() {
                    break;
                }
                let field: Vec<u8> = words[i..i + 6].iter().map(|&w| mfm::decode_byte(w)).collect();
                i += 6;
                let mut crc_buf = vec![0xA1, 0xA1, 0xA1, 0xFE];
                crc_buf.extend_from_slice(&field);
                let ok = crc_ibm_3740(&crc_buf, None) == 0;
                let crc = u16::from_be_bytes([field[4], field[5]]);
                pending = Some((field[0], field[1], field[2], field[3], crc, ok));
            }
            0xFB => {
                let Some((c, h, r, n, idam_crc, idam_ok)) = pending.take() else {
                    continue;
                };
                let len = 128usize << n;
                if i + len + 2 > words.len() {
                    break;
                }
                let data: Vec<u8> = words[i..i + len].iter().map(|&w| mfm::decode_byte(w)).collect();
                let crc_words: Vec<u8> = words[i + len..i + len + 2].iter().map(|&w| mfm::decode_byte(w)).collect();
                i += len + 2;
                let mut crc_buf = vec![0xA1, 0xA1, 0xA1, 0xFB];
                crc_buf.extend_from_slice(&data);
                crc_buf.extend_from_slice(&crc_words);
                let data_ok = crc_ibm_3740(&crc_buf, None) == 0;
                sectors.push(DecodedSector {
                    c,
                    h,
                    r,
                    n,
                    idam_crc,
                    idam_ok,
                    data,
                    data_ok,
                });
            }
            _ => {}
        }
    }
    sectors
}

/// Decode an FM bit-cell stream: marks are found by their violated clock
/// pattern.
pub fn decode_fm_track(words: &[u16]) -> Vec<DecodedSector> {
    let mut sectors = Vec::new();
    let mut i = 0;
    let mut pending: Option<(u8, u8, u8, u8, u16, bool)> = None;

    while i < words.len() {
        if fm::decode_clock(words[i]) != fm::SYNC_CLK {
            i += 1;
            continue;
        }
        let am = fm::decode_byte(words[i]);
        i += 1;
        match am {
            0xFE => {
                if i + 6 > words.len() {
                    break;
                }
                let field: Vec<u8> = words[i..i + 6].iter().map(|&w| fm::decode_byte(w)).collect();
                i += 6;
                let mut crc_buf = vec![0xFE];
                crc_buf.extend_from_slice(&field);
                let ok = crc_ibm_3740(&crc_buf, None) == 0;
                let crc = u16::from_be_bytes([field[4], field[5]]);
                pending = Some((field[0], field[1], field[2], field[3], crc, ok));
            }
            0xFB => {
                let Some((c, h, r, n, idam_crc, idam_ok)) = pending.take() else {
                    continue;
                };
                let len = 128usize << n;
                if i + len + 2 > words.len() {
                    break;
                }
                let data: Vec<u8> = words[i..i + len].iter().map(|&w| fm::decode_byte(w)).collect();
                let crc_words: Vec<u8> = words[i + len..i + len + 2].iter().map(|&w| fm::decode_byte(w)).collect();
                i += len + 2;
                let mut crc_buf = vec![0xFB];
                crc_buf.extend_from_slice(&data);
                crc_buf.extend_from_slice(&crc_words);
                let data_ok = crc_ibm_3740(&crc_buf, None) == 0;
                sectors.push(DecodedSector {
                    c,
                    h,
                    r,
                    n,
                    idam_crc,
                    idam_ok,
                    data,
                    data_ok,
                });
            }
            _ => {}
        }
    }
    sectors
}
