mod common;

use common::*;
use trackcast::{config::tokenize, HostPreference, Image, OpenOptions};

/// Reference implementation of the classic interleave fill.
fn reference_map(nr: usize, interleave: usize, origin: usize) -> Vec<u8> {
    let mut map = vec![None; nr];
    let mut pos = origin;
    for i in 0..nr {
        while map[pos].is_some() {
            pos = (pos + 1) % nr;
        }
        map[pos] = Some(i as u8);
        pos = (pos + interleave) % nr;
    }
    map.into_iter().map(|s| s.unwrap()).collect()
}

fn tagged_image(cyls: u16, heads: u8, secs: u16, interleave: u8, cskew: u8, hskew: u8) -> Image<SharedBuf> {
    let size = cyls as usize * heads as usize * secs as usize * 512;
    let config = format!(
        "
        [img::{size}]
        cyls={cyls}
        heads={heads}
        secs={secs}
        bps=512
        interleave={interleave}
        cskew={cskew}
        hskew={hskew}
        "
    );
    Image::open(
        SharedBuf::new(vec![0u8; size]),
        OpenOptions {
            host: HostPreference::Unspecified,
            tag: "img".to_string(),
            config: tokenize(&config),
        },
    )
    .expect("open")
}

#[test]
fn test_sector_map_matches_reference() {
    init();
    for (secs, interleave, cskew, hskew) in [
        (9u16, 1u8, 0u8, 0u8),
        (9, 2, 0, 0),
        (18, 9, 0, 0),
        (15, 4, 2, 1),
        (10, 3, 1, 2),
        (17, 17, 3, 0),
    ] {
        let mut im = tagged_image(40, 2, secs, interleave, cskew, hskew);
        for track in [0u16, 1, 6, 13] {
            im.setup_track(track, 0).unwrap();
            let cyl = track >> 1;
            let side = track & 1;
            let origin =
                (cyl as usize * cskew as usize + side as usize * hskew as usize) % secs as usize;
            let expected = reference_map(secs as usize, interleave as usize, origin);
            assert_eq!(
                im.sector_map(),
                &expected[..],
                "secs={} il={} cskew={} hskew={} track={}",
                secs,
                interleave,
                cskew,
                hskew,
                track
            );
        }
    }
}

#[test]
fn test_sector_map_is_permutation() {
    init();
    let mut im = tagged_image(80, 2, 18, 7, 3, 2);
    for track in 0..32u16 {
        im.setup_track(track, 0).unwrap();
        let mut seen = vec![false; 18];
        for &slot in im.sector_map() {
            assert!(!seen[slot as usize], "duplicate slot on track {}", track);
            seen[slot as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}

#[test]
fn test_interleave_one_is_rotated_identity() {
    init();
    // With interleave 1 the map reduces to the identity rotated by the skew
    // origin.
    let mut im = tagged_image(40, 2, 9, 1, 2, 1);
    im.setup_track(6, 0).unwrap(); // cyl 3, side 0: origin = 6 % 9
    let map = im.sector_map();
    for (pos, &sec) in map.iter().enumerate() {
        assert_eq!((pos + 9 - 6) % 9, sec as usize);
    }
}

#[test]
fn test_tagged_zones_override_base() {
    init();
    // A two-zone config in the 3174 style: the zone layouts replace the base
    // on their selected cylinders.
    let size = 15 * 2 * 512 + 79 * 30 * 2 * 512;
    let config = format!(
        "
        [img::{size}]
        cyls=80
        heads=2
        bps=512
        tracks=0
        secs=15
        rpm=360
        tracks=1-79
        secs=30
        rpm=180
        "
    );
    let mut im = Image::open(
        SharedBuf::new(vec![0u8; size]),
        OpenOptions {
            host: HostPreference::Unspecified,
            tag: "img".to_string(),
            config: tokenize(&config),
        },
    )
    .expect("open");

    im.setup_track(0, 0).unwrap();
    assert_eq!(im.track_info().1.len(), 15);
    assert_eq!(im.prep().rpm, 360);
    im.setup_track(4, 0).unwrap();
    assert_eq!(im.track_info().1.len(), 30);
    assert_eq!(im.prep().rpm, 180);
}
