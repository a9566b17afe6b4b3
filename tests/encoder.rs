mod common;

use common::*;
use trackcast::{codec::mfm, HostPreference, Image, OpenOptions};

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

#[test]
fn test_mfm_stream_crcs_validate() {
    init();
    // Property 6: every IDAM and DAM CRC emitted by the encoder verifies
    // with an independent CRC decoder over the decoded stream bytes.
    let data = pattern_bytes(1_474_560, 1);
    let (mut im, _) = open_with(data, "img", HostPreference::PcDos);
    im.setup_track(0, 0).unwrap();
    let words = pump_revolution(&mut im);
    let sectors = decode_mfm_track(&words);

    assert_eq!(sectors.len(), 18);
    for sec in &sectors {
        assert!(sec.idam_ok, "IDAM CRC failed for sector {}", sec.r);
        assert!(sec.data_ok, "data CRC failed for sector {}", sec.r);
        assert_eq!(sec.c, 0);
        assert_eq!(sec.h, 0);
        assert_eq!(sec.n, 2);
    }
    // With interleave 1 the ids appear in ascending order.
    let ids: Vec<u8> = sectors.iter().map(|s| s.r).collect();
    assert_eq!(ids, (1..=18).collect::<Vec<u8>>());
}

#[test]
fn test_idam_crc_reference_value() {
    init();
    // S5: the IDAM for C=3 H=1 R=7 N=2 carries CRC 0xCC25.
    let data = pattern_bytes(1_474_560, 2);
    let (mut im, _) = open_with(data, "img", HostPreference::PcDos);
    // Physical track 7 is cylinder 3, head 1.
    im.setup_track(7, 0).unwrap();
    let words = pump_revolution(&mut im);
    let sectors = decode_mfm_track(&words);
    let sector7 = sectors.iter().find(|s| s.r == 7).expect("sector 7");
    assert_eq!((sector7.c, sector7.h, sector7.n), (3, 1, 2));
    assert!(sector7.idam_ok);
    assert_eq!(sector7.idam_crc, 0xCC25);
}

#[test]
fn test_revolution_is_exact_and_wraps() {
    init();
    // Property 5: one revolution's emission is exactly tracklen_bc bit-cells
    // and the encoder then wraps to the post-index state.
    let (mut im, _) = open_with(vec![0u8; 1_474_560], "img", HostPreference::PcDos);
    im.setup_track(0, 0).unwrap();
    let words = pump_revolution(&mut im);
    assert_eq!(words.len() as u32 * 16, im.tracklen_bc());

    // Whatever the encoder buffered beyond the revolution belongs to the
    // next one: drain and re-pump one field to observe the wrap.
    let (decode_pos, _, _, _) = im.position_state();
    assert!(decode_pos <= 1, "encoder did not wrap (decode_pos {})", decode_pos);
}

#[test]
fn test_atr_fm_track_with_inversion() {
    init();
    // S2: a 90 KiB single-density ATR: 40 cylinders of 18 FM sectors of 128
    // bytes, data inverted on the medium, 130 kbps, interleave 9.
    let body = pattern_bytes(92_160, 3);
    let mut file = vec![0u8; 16];
    file[0] = 0x96;
    file[1] = 0x02;
    file[2..4].copy_from_slice(&((92_160u32 / 16) as u16).to_le_bytes());
    file[4..6].copy_from_slice(&128u16.to_le_bytes());
    file.extend_from_slice(&body);

    let (mut im, _) = open_with(file, "atr", HostPreference::Unspecified);
    assert_eq!(im.nr_cyls(), 40);
    assert_eq!(im.nr_sides(), 1);

    im.setup_track(0, 0).unwrap();
    let (trk, secs) = im.track_info();
    assert!(trk.is_fm);
    assert!(trk.invert_data);
    assert_eq!(trk.interleave, 9);
    assert_eq!(secs.len(), 18);
    assert!(secs.iter().all(|s| s.n == 0));
    assert_eq!(im.prep().data_rate, 130);

    let words = pump_revolution(&mut im);
    let sectors = decode_fm_track(&words);
    assert_eq!(sectors.len(), 18);
    // Interleave 9 on 18 sectors: ids 1,3,5,..,17 then 2,4,..,18.
    let ids: Vec<u8> = sectors.iter().map(|s| s.r).collect();
    let expected: Vec<u8> = (0..18).map(|slot| im.sector_map()[slot] + 1).collect();
    assert_eq!(ids, expected);

    for sec in &sectors {
        assert!(sec.idam_ok && sec.data_ok, "CRC failure on sector {}", sec.r);
        // On-medium bytes are the file bytes inverted.
        let off = (sec.r as usize - 1) * 128;
        let expect: Vec<u8> = body[off..off + 128].iter().map(|b| !b).collect();
        assert_eq!(sec.data, expect, "sector {} data", sec.r);
    }
}

#[test]
fn test_uknc_resyncs_do_not_break_stream() {
    init();
    let data = pattern_bytes(819_200, 4);
    let (mut im, _) = open_with(data, "img", HostPreference::Uknc);
    im.setup_track(0, 0).unwrap();
    let words = pump_revolution(&mut im);
    // The post-CRC resync words must appear in the raw stream.
    let resyncs = words.iter().filter(|&&w| w == mfm::SYNC_WORD).count();
    // 3 per IDAM + 3 per DAM + 1 resync after each of the 2 CRCs, 10 sectors.
    assert_eq!(resyncs, 10 * 8);
    let sectors = decode_mfm_track(&words);
    assert_eq!(sectors.len(), 10);
    assert!(sectors.iter().all(|s| s.idam_ok && s.data_ok));
}

#[test]
fn test_xdf_large_sector_track() {
    init();
    let data = pattern_bytes(1_884_160, 5);
    let (mut im, handle) = open_with(data, "xdf", HostPreference::Unspecified);

    // Cylinder 1, head 0: one 8K, 2K, 1K and 512-byte sector, ids 128 + n.
    im.setup_track(2, 0).unwrap();
    let words = pump_revolution(&mut im);
    let sectors = decode_mfm_track(&words);
    let sizes: Vec<(u8, usize)> = sectors.iter().map(|s| (s.r, s.data.len())).collect();
    assert_eq!(sizes, vec![(134, 8192), (132, 2048), (131, 1024), (130, 512)]);
    assert!(sectors.iter().all(|s| s.idam_ok && s.data_ok));

    // The 8K sector's data comes from the head-0 slice of cylinder 1's
    // packed file region.
    let file = handle.snapshot();
    let cyl_base = 23_552usize;
    assert_eq!(sectors[0].data[..], file[cyl_base..cyl_base + 8192]);
    // And the 512-byte sector from the tail of the head-0 region.
    assert_eq!(sectors[3].data[..], file[cyl_base + 22_528..cyl_base + 23_040]);

    // Head 1 of a non-zero cylinder carries the bit-cell head skew.
    im.setup_track(3, 0).unwrap();
    let words = pump_revolution(&mut im);
    let sectors = decode_mfm_track(&words);
    assert_eq!(sectors.len(), 4);
    assert_eq!(sectors[0].r, 130);

    // Cylinder 0 head 0: AUX sectors 1..8 then MAIN 129..139.
    im.setup_track(0, 0).unwrap();
    let words = pump_revolution(&mut im);
    let sectors = decode_mfm_track(&words);
    assert_eq!(sectors.len(), 19);
    let ids: Vec<u8> = sectors.iter().map(|s| s.r).collect();
    let expected: Vec<u8> = (1..=8).chain(129..=139).collect();
    assert_eq!(ids, expected);
    assert_eq!(sectors[0].data[..], file[0..512]);
}
