mod common;

use common::*;
use trackcast::{
    codec::mfm,
    util::{crc_ibm_3740, crc_ibm_3740_byte},
    HostPreference, Image, OpenOptions,
};

fn open_with(data: Vec<u8>, tag: &str, host: HostPreference) -> (Image<SharedBuf>, SharedBuf) {
    let buf = SharedBuf::new(data);
    let handle = buf.clone();
    let im = Image::open(
        buf,
        OpenOptions {
            host,
            tag: tag.to_string(),
            config: Vec::new(),
        },
    )
    .expect("open");
    (im, handle)
}

/// Stream every track listed out of `src` and through the write path of
/// `dst`, then require byte identity over the named file regions.
fn roundtrip_tracks(
    src_data: Vec<u8>,
    tag: &str,
    host: HostPreference,
    tracks: &[u16],
    regions: &[(usize, usize)],
) {
    let (mut src, src_handle) = open_with(src_data.clone(), tag, host);
    let (mut dst, dst_handle) = open_with(vec![0u8; src_data.len()], tag, host);

    for (&track, &(off, len)) in tracks.iter().zip(regions) {
        src.setup_track(track, 0).unwrap();
        dst.setup_track(track, 0).unwrap();
        dst.start_write(0);

        let words = pump_revolution(&mut src);
        feed_words(&mut dst, &words);

        let want = &src_handle.snapshot()[off..off + len];
        let got = &dst_handle.snapshot()[off..off + len];
        assert_eq!(want, got, "track {} region {:#x}+{:#x}", track, off, len);
    }
}

#[test]
fn test_mfm_roundtrip_pc_1440k() {
    init();
    // Property 1: the encoder's bit-cell stream, fed back into the write
    // path of an identical empty image, reconstructs the file bytes.
    let data = pattern_bytes(1_474_560, 11);
    let track_bytes = 18 * 512;
    roundtrip_tracks(
        data,
        "img",
        HostPreference::PcDos,
        &[0, 1, 75],
        &[
            (0, track_bytes),
            (track_bytes, track_bytes),
            (75 * track_bytes, track_bytes),
        ],
    );
}

#[test]
fn test_mfm_roundtrip_d81_swapped_sides() {
    init();
    // The swap applies identically on both paths, so physical track 0
    // reconstructs the file's second track slot.
    let data = pattern_bytes(819_200, 12);
    let track_bytes = 10 * 512;
    roundtrip_tracks(
        data,
        "d81",
        HostPreference::Unspecified,
        &[0, 1],
        &[(track_bytes, track_bytes), (0, track_bytes)],
    );
}

#[test]
fn test_fm_roundtrip_atr() {
    init();
    // FM write path plus double inversion restores the original bytes.
    let body = pattern_bytes(92_160, 13);
    let mut file = vec![0u8; 16];
    file[0] = 0x96;
    file[1] = 0x02;
    file[2..4].copy_from_slice(&((92_160u32 / 16) as u16).to_le_bytes());
    file[4..6].copy_from_slice(&128u16.to_le_bytes());
    file.extend_from_slice(&body);

    let (mut src, src_handle) = open_with(file.clone(), "atr", HostPreference::Unspecified);
    let mut empty = file.clone();
    empty[16..].fill(0);
    let (mut dst, dst_handle) = open_with(empty, "atr", HostPreference::Unspecified);

    for track in [0u16, 4] {
        src.setup_track(track, 0).unwrap();
        dst.setup_track(track, 0).unwrap();
        dst.start_write(0);
        let words = pump_revolution(&mut src);
        feed_words(&mut dst, &words);

        let off = 16 + (track >> 1) as usize * 18 * 128;
        let want = &src_handle.snapshot()[off..off + 18 * 128];
        let got = &dst_handle.snapshot()[off..off + 18 * 128];
        assert_eq!(want, got, "track {}", track);
    }
}

#[test]
fn test_xdf_roundtrip_large_sectors() {
    init();
    let data = pattern_bytes(1_884_160, 14);
    // Cylinder 2, both heads: each head rewrites its half of the packed
    // cylinder region.
    let cyl = 2usize;
    let (mut src, src_handle) = open_with(data.clone(), "xdf", HostPreference::Unspecified);
    let (mut dst, dst_handle) = open_with(vec![0u8; data.len()], "xdf", HostPreference::Unspecified);

    for track in [cyl as u16 * 2, cyl as u16 * 2 + 1] {
        src.setup_track(track, 0).unwrap();
        dst.setup_track(track, 0).unwrap();
        dst.start_write(0);
        let words = pump_revolution(&mut src);
        feed_words(&mut dst, &words);
    }

    let base = cyl * 23_552;
    let want = &src_handle.snapshot()[base..base + 23_552];
    let got = &dst_handle.snapshot()[base..base + 23_552];
    assert_eq!(want, got);
}

/// Build the MFM word stream of a bare DAM: sync run, mark, data, CRC.
fn dam_words(data: &[u8]) -> Vec<u16> {
    let mut words = Vec::new();
    let mut prev = 0u16;
    let mut push_byte = |words: &mut Vec<u16>, prev: &mut u16, b: u8| {
        let w = mfm::encode_byte(b, *prev);
        words.push(w);
        *prev = w;
    };
    for _ in 0..12 {
        push_byte(&mut words, &mut prev, 0x00);
    }
    for _ in 0..3 {
        words.push(mfm::SYNC_WORD);
        prev = mfm::SYNC_WORD;
    }
    push_byte(&mut words, &mut prev, 0xFB);
    let mut crc = crc_ibm_3740(&[0xA1, 0xA1, 0xA1, 0xFB], None);
    for &b in data {
        crc = crc_ibm_3740_byte(b, crc);
        push_byte(&mut words, &mut prev, b);
    }
    push_byte(&mut words, &mut prev, (crc >> 8) as u8);
    push_byte(&mut words, &mut prev, crc as u8);
    words
}

#[test]
fn test_mid_track_write_locates_sector() {
    init();
    // A write that begins mid-track with no preceding IDAM is located from
    // the splice position alone.
    let (mut im, handle) = open_with(vec![0u8; 1_474_560], "img", HostPreference::PcDos);
    im.setup_track(0, 0).unwrap();

    let slot = 4usize;
    let prep = im.prep().clone();
    let (_, secs) = im.track_info();
    let secs = secs.to_vec();
    let map: Vec<u8> = im.sector_map().to_vec();

    let mut pos_bytes = prep.idx_sz;
    for &s in &map[..slot] {
        pos_bytes += prep.enc_sec_sz(&secs[s as usize]);
    }
    pos_bytes += prep.idam_sz;
    im.start_write(pos_bytes * 16);

    let payload = pattern_bytes(512, 21);
    feed_words(&mut im, &dam_words(&payload));

    let target = map[slot] as usize;
    let file = handle.snapshot();
    assert_eq!(&file[target * 512..target * 512 + 512], &payload[..]);
    // Nothing else was touched.
    assert!(file[..target * 512].iter().all(|&b| b == 0));
    assert!(file[(target + 1) * 512..].iter().all(|&b| b == 0));
}

#[test]
fn test_unknown_sector_id_discards_dam() {
    init();
    let (mut im, handle) = open_with(vec![0u8; 1_474_560], "img", HostPreference::PcDos);
    im.setup_track(0, 0).unwrap();
    im.start_write(0);

    // A CRC-valid IDAM naming a sector id not present on the track.
    let mut words = Vec::new();
    let mut prev = 0u16;
    let mut push_byte = |words: &mut Vec<u16>, prev: &mut u16, b: u8| {
        let w = mfm::encode_byte(b, *prev);
        words.push(w);
        *prev = w;
    };
    for _ in 0..12 {
        push_byte(&mut words, &mut prev, 0x00);
    }
    for _ in 0..3 {
        words.push(mfm::SYNC_WORD);
        prev = mfm::SYNC_WORD;
    }
    push_byte(&mut words, &mut prev, 0xFE);
    let id = [0u8, 0, 200, 2];
    let mut crc = crc_ibm_3740(&[0xA1, 0xA1, 0xA1, 0xFE], None);
    for &b in &id {
        crc = crc_ibm_3740_byte(b, crc);
        push_byte(&mut words, &mut prev, b);
    }
    push_byte(&mut words, &mut prev, (crc >> 8) as u8);
    push_byte(&mut words, &mut prev, crc as u8);
    // Followed by a DAM that must be dropped.
    words.extend(dam_words(&pattern_bytes(512, 22)));

    feed_words(&mut im, &words);
    assert!(handle.snapshot().iter().all(|&b| b == 0));
}
