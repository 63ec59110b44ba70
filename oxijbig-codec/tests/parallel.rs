//! Independent streams on independent threads.

use oxijbig_codec::{Bitmap, EncoderConfig, JbigDecoder, StreamDecoder, encode_with_config};
use rayon::prelude::*;

fn image(seed: u32, width: u32, height: u32) -> Bitmap {
    Bitmap::from_fn(width, height, |x, y| {
        let v = (x / (2 + seed % 3)) * 29 + (y / (1 + seed % 4)) * 43 + seed * 7;
        (v ^ (v >> 4)) % 3 == 0
    })
    .expect("alloc")
}

#[test]
fn test_parallel_round_trips() {
    let jobs: Vec<(u32, u8)> = (0..16u32).map(|seed| (seed, (seed % 4) as u8)).collect();

    let results: Vec<(Bitmap, Vec<u8>)> = jobs
        .par_iter()
        .map(|&(seed, layers)| {
            let plane = image(seed, 97 + seed, 61 + 2 * seed);
            let bie = encode_with_config(
                plane.width(),
                plane.height(),
                std::slice::from_ref(&plane),
                layers,
                EncoderConfig::DEFAULT,
            )
            .expect("encode");
            (plane, bie)
        })
        .collect();

    results.par_iter().for_each(|(plane, bie)| {
        let mut decoder = JbigDecoder::new();
        decoder.feed_all(bie).expect("decode");
        assert_eq!(decoder.image(0), Some(plane));
    });
}

#[test]
fn test_parallel_matches_sequential() {
    let planes: Vec<Bitmap> = (0..8).map(|seed| image(seed, 120, 80)).collect();

    let sequential: Vec<Vec<u8>> = planes
        .iter()
        .map(|p| {
            encode_with_config(120, 80, std::slice::from_ref(p), 2, EncoderConfig::DEFAULT)
                .expect("encode")
        })
        .collect();
    let parallel: Vec<Vec<u8>> = planes
        .par_iter()
        .map(|p| {
            encode_with_config(120, 80, std::slice::from_ref(p), 2, EncoderConfig::DEFAULT)
                .expect("encode")
        })
        .collect();

    assert_eq!(sequential, parallel);
}
