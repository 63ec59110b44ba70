//! Round-trip tests over layer counts, orders and coding options.
//!
//! Every test decodes what the encoder produced and compares each
//! resolution layer against the reductions computed directly from the
//! source planes.

use oxijbig_codec::header::{BIH_LEN, stripe_count};
use oxijbig_codec::resolution::reduce;
use oxijbig_codec::{
    Bih, Bitmap, DecodeStatus, EncoderConfig, JbigDecoder, JbigEncoder, Options, Order,
    StreamDecoder, decode,
};

// ============================================================================
// Helpers
// ============================================================================

/// The four planes of the 23x20 scenario image.
fn scenario_planes() -> Vec<Bitmap> {
    (0..4u32)
        .map(|p| {
            Bitmap::from_fn(23, 20, |x, y| {
                ((x * 7 + y * 13 + p * 5) ^ (x * y)) % (3 + p) == 0
            })
            .expect("alloc")
        })
        .collect()
}

/// Text-like page: rows of simple glyphs with some irregular strokes.
fn page(width: u32, height: u32) -> Bitmap {
    Bitmap::from_fn(width, height, |x, y| {
        let (cx, cy) = (x % 12, y % 18);
        let glyph = (x / 12 + y / 18 * 7) % 5;
        match glyph {
            0 => (cx == 1 || cx == 2) && cy < 12,
            1 => cy == 10 && cx < 9 || cx == 4 && cy < 12,
            2 => (cx + cy) % 9 == 0 && cy < 12,
            3 => cx < 8 && cy < 12 && (cx == 0 || cx == 7 || cy == 0 || cy == 11),
            _ => false,
        }
    })
    .expect("alloc")
}

fn encode_with(
    width: u32,
    height: u32,
    planes: &[Bitmap],
    setup: impl FnOnce(&mut JbigEncoder<Vec<u8>>),
) -> Vec<u8> {
    let mut encoder =
        JbigEncoder::new(width, height, planes.to_vec(), Vec::new()).expect("encoder");
    setup(&mut encoder);
    encoder.run().expect("encode");
    encoder.into_inner()
}

fn header(bie: &[u8]) -> Bih {
    Bih::parse(bie[..BIH_LEN].try_into().expect("header")).expect("valid header")
}

/// Layers `0..=d` of `plane` as the encoder derives them.
fn expected_layers(plane: &Bitmap, d: u8, l0: u32, sdrst: bool) -> Vec<Bitmap> {
    let mut layers = vec![plane.clone()];
    for layer_hi in (1..=d).rev() {
        let hi = layers.last().expect("non-empty");
        let lo = reduce(hi, l0, layer_hi, sdrst).expect("reduce");
        layers.push(lo);
    }
    layers.reverse();
    layers
}

/// Feed `bie` in pieces of `size` bytes.
fn feed_in_chunks(decoder: &mut JbigDecoder, bie: &[u8], size: usize) -> DecodeStatus {
    let mut status = DecodeStatus::NeedMoreInput;
    for chunk in bie.chunks(size) {
        let mut pos = 0;
        loop {
            let (used, s) = decoder.feed(&chunk[pos..]).expect("decode");
            pos += used;
            status = s;
            if pos >= chunk.len() || s == DecodeStatus::DoneAtLimit {
                break;
            }
        }
    }
    status
}

/// Decode and compare every layer of every plane.
fn check_all_layers(bie: &[u8], planes: &[Bitmap], sdrst: bool, what: &str) {
    let bih = header(bie);
    let mut decoder = JbigDecoder::new();
    assert_eq!(
        decoder.feed_all(bie).expect(what),
        DecodeStatus::Done,
        "{what}"
    );
    assert_eq!(decoder.planes(), bih.planes, "{what}");
    assert_eq!(decoder.layer(), Some(bih.d), "{what}");
    for (p, plane) in planes.iter().enumerate() {
        let layers = expected_layers(plane, bih.d, bih.l0, sdrst);
        for (layer, expected) in layers.iter().enumerate() {
            assert_eq!(
                decoder.layer_image(p as u8, layer as u8),
                Some(expected),
                "{what}: plane {p} layer {layer}"
            );
        }
    }
}

const SCENARIO_ORDERS: [Order; 3] = [
    Order::NONE,
    Order::ILEAVE,
    Order::from_bits(Order::ILEAVE.bits() | Order::SMID.bits()),
];

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn test_scenario_four_planes() {
    let planes = scenario_planes();
    let options = EncoderConfig::DEFAULT.options;
    for d in 0..=3u8 {
        for order in SCENARIO_ORDERS {
            let bie = encode_with(23, 20, &planes, |e| {
                e.set_layers(d);
                e.set_options(order, options, 0, 8, 0);
            });
            let bih = header(&bie);
            assert_eq!((bih.xd, bih.yd, bih.planes), (23, 20, 4));
            assert_eq!(bih.order, order);
            check_all_layers(&bie, &planes, false, &format!("d {d} order {order:?}"));

            let image = decode(&bie).expect("decode");
            assert_eq!(image.planes, planes);
        }
    }
}

#[test]
fn test_scenario_option_sets() {
    let planes = scenario_planes();
    let option_sets = [
        Options::NONE,
        Options::TPBON,
        Options::LRLTWO | Options::TPBON,
        Options::TPDON,
        Options::DPON,
        Options::TPBON | Options::TPDON | Options::DPON | Options::SDRST,
        Options::TPBON | Options::DPON | Options::DELAY_AT,
    ];
    for options in option_sets {
        for d in [0u8, 2, 3] {
            for l0 in [1u32, 2, 3] {
                let bie = encode_with(23, 20, &planes, |e| {
                    e.set_layers(d);
                    e.set_options(Order::ILEAVE | Order::SMID, options, l0, 8, 0);
                });
                assert_eq!(header(&bie).l0, l0);
                let sdrst = options.contains(Options::SDRST);
                check_all_layers(
                    &bie,
                    &planes,
                    sdrst,
                    &format!("options {options:?} d {d} l0 {l0}"),
                );
            }
        }
    }
}

#[test]
fn test_every_legal_order() {
    let planes = scenario_planes();
    for bits in [0u8, 2, 3, 4, 5, 6] {
        let order = Order::from_bits(bits);
        let bie = encode_with(23, 20, &planes[..2], |e| {
            e.set_layers(2);
            e.set_options(order, EncoderConfig::DEFAULT.options, 2, 8, 0);
        });
        check_all_layers(&bie, &planes[..2], false, &format!("order {bits:#04x}"));
    }
}

#[test]
fn test_single_layer_config() {
    let plane = page(250, 300);
    let bie = encode_with(250, 300, std::slice::from_ref(&plane), |e| {
        e.set_config(EncoderConfig::SINGLE_LAYER);
    });
    let bih = header(&bie);
    assert_eq!((bih.dl, bih.d, bih.l0), (0, 0, 128));
    let image = decode(&bie).expect("decode");
    assert_eq!(image.planes[0], plane);
}

#[test]
fn test_larger_page_with_layers() {
    let plane = page(301, 257);
    for d in [0u8, 1, 4] {
        let bie = encode_with(301, 257, std::slice::from_ref(&plane), |e| e.set_layers(d));
        check_all_layers(&bie, std::slice::from_ref(&plane), false, &format!("d {d}"));
    }
}

#[test]
fn test_odd_sizes() {
    for (width, height) in [(1, 1), (1, 9), (9, 1), (8, 8), (17, 3), (65, 33)] {
        let plane = Bitmap::from_fn(width, height, |x, y| (x * 3 + y * 5) % 4 == 1).expect("alloc");
        for d in 0..=2u8 {
            let bie = encode_with(width, height, std::slice::from_ref(&plane), |e| e.set_layers(d));
            check_all_layers(
                &bie,
                std::slice::from_ref(&plane),
                false,
                &format!("{width}x{height} d {d}"),
            );
        }
    }
}

#[test]
fn test_blank_and_full_images() {
    let blank = Bitmap::new(200, 150).expect("alloc");
    let full = Bitmap::from_fn(200, 150, |_, _| true).expect("alloc");
    for plane in [blank, full] {
        let bie = encode_with(200, 150, std::slice::from_ref(&plane), |e| e.set_layers(2));
        assert!(bie.len() < 600, "{} bytes", bie.len());
        check_all_layers(&bie, std::slice::from_ref(&plane), false, "uniform");
    }
}

// ============================================================================
// Determinism and chunking
// ============================================================================

#[test]
fn test_encoding_is_deterministic() {
    let planes = scenario_planes();
    let first = encode_with(23, 20, &planes, |e| e.set_layers(3));
    let second = encode_with(23, 20, &planes, |e| e.set_layers(3));
    assert_eq!(first, second);
}

#[test]
fn test_chunking_independence() {
    let plane = page(160, 120);
    let bie = encode_with(160, 120, std::slice::from_ref(&plane), |e| {
        e.set_layers(2);
        e.set_comment(vec![0xffu8; 40]);
    });

    let mut reference = JbigDecoder::new();
    assert_eq!(reference.feed_all(&bie).expect("decode"), DecodeStatus::Done);
    let expected = reference.image(0).cloned();
    assert_eq!(expected.as_ref(), Some(&plane));

    for size in [1, 2, 3, 5, 19, 64, 1000] {
        let mut decoder = JbigDecoder::new();
        let status = feed_in_chunks(&mut decoder, &bie, size);
        assert_eq!(status, DecodeStatus::Done, "chunk size {size}");
        assert_eq!(decoder.image(0), expected.as_ref(), "chunk size {size}");
        for layer in 0..=2 {
            assert_eq!(
                decoder.layer_image(0, layer),
                reference.layer_image(0, layer),
                "chunk size {size} layer {layer}"
            );
        }
    }
}

#[test]
fn test_partial_image_grows_with_input() {
    let plane = page(96, 200);
    let bie = encode_with(96, 200, std::slice::from_ref(&plane), |e| {
        e.set_options(Order::NONE, Options::TPBON, 10, 8, 0);
    });
    let mut decoder = JbigDecoder::new();
    let (_, status) = decoder.feed(&bie[..bie.len() / 2]).expect("first half");
    assert_eq!(status, DecodeStatus::NeedMoreInput);
    let partial = decoder.image(0).expect("started").height();
    assert!(partial > 0 && partial < 200, "{partial} lines");
    let (_, status) = decoder.feed(&bie[bie.len() / 2..]).expect("second half");
    assert_eq!(status, DecodeStatus::Done);
    assert_eq!(decoder.image(0), Some(&plane));
}

// ============================================================================
// Stream structure
// ============================================================================

/// Walk the marker structure after the header, checking that every escape
/// byte in stripe data is followed by a known code. Returns the codes.
fn marker_codes(bie: &[u8]) -> Vec<u8> {
    let mut codes = Vec::new();
    let mut pos = BIH_LEN;
    while pos < bie.len() {
        if bie[pos] != 0xff {
            pos += 1;
            continue;
        }
        let code = bie[pos + 1];
        pos += 2;
        match code {
            0x00 => {}
            0x02 | 0x03 => codes.push(code),
            0x05 => {
                codes.push(code);
                pos += 4;
            }
            0x06 => {
                codes.push(code);
                pos += 6;
            }
            0x07 => {
                codes.push(code);
                let len = u32::from_be_bytes([bie[pos], bie[pos + 1], bie[pos + 2], bie[pos + 3]]);
                pos += 4 + len as usize;
            }
            other => panic!("unexpected marker {other:#04x} at {}", pos - 2),
        }
    }
    codes
}

#[test]
fn test_escape_bytes_are_stuffed() {
    let noise = Bitmap::from_fn(128, 128, |x, y| {
        (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503)).count_ones() % 2 == 0
    })
    .expect("alloc");
    for d in [0u8, 2] {
        let bie = encode_with(128, 128, std::slice::from_ref(&noise), |e| e.set_layers(d));
        let bih = header(&bie);
        let codes = marker_codes(&bie);
        let sdes = stripe_count(bih.yd, bih.d, bih.l0) as usize * (usize::from(d) + 1);
        assert_eq!(codes.iter().filter(|&&c| c == 0x02).count(), sdes);
        assert_eq!(codes.last(), Some(&0x02));
        check_all_layers(&bie, std::slice::from_ref(&noise), false, "noise");
    }
}

#[test]
fn test_sdrst_terminates_every_stripe() {
    let planes = scenario_planes();
    let bie = encode_with(23, 20, &planes[..2], |e| {
        e.set_layers(1);
        e.set_options(
            Order::SEQ,
            Options::TPBON | Options::TPDON | Options::SDRST,
            2,
            0,
            0,
        );
    });
    let codes = marker_codes(&bie);
    assert!(!codes.is_empty());
    assert!(codes.iter().all(|&c| c == 0x03));
    check_all_layers(&bie, &planes[..2], true, "sdrst");
}

// ============================================================================
// Adaptive template
// ============================================================================

fn stripes_with_period(width: u32, height: u32) -> Bitmap {
    Bitmap::from_fn(width, height, |x, _| x % 6 < 3).expect("alloc")
}

#[test]
fn test_at_move_emitted_and_decoded() {
    let plane = stripes_with_period(64, 96);
    let bie = encode_with(64, 96, std::slice::from_ref(&plane), |e| {
        e.set_options(Order::NONE, Options::NONE, 48, 8, 0);
    });
    assert_eq!(&bie[BIH_LEN..BIH_LEN + 2], &[0xff, 0x06]);
    assert_eq!(bie[BIH_LEN + 6], 6);
    assert_eq!(bie[BIH_LEN + 7], 0);
    assert_eq!(decode(&bie).expect("decode").planes[0], plane);
}

#[test]
fn test_at_move_respects_mx() {
    let plane = stripes_with_period(64, 96);
    for mx in [3u8, 5] {
        let bie = encode_with(64, 96, std::slice::from_ref(&plane), |e| {
            e.set_options(Order::NONE, Options::NONE, 48, mx, 0);
        });
        let mut pos = BIH_LEN;
        while let Some(n) = bie[pos..].windows(2).position(|w| w == [0xff, 0x06]) {
            let at = pos + n;
            assert!(bie[at + 6] <= mx, "tx {} above mx {mx}", bie[at + 6]);
            pos = at + 8;
        }
        assert_eq!(decode(&bie).expect("decode").planes[0], plane);
    }
}

#[test]
fn test_delayed_at_move() {
    let plane = stripes_with_period(64, 96);
    let bie = encode_with(64, 96, std::slice::from_ref(&plane), |e| {
        e.set_options(Order::NONE, Options::DELAY_AT, 48, 8, 0);
    });
    assert_ne!(&bie[BIH_LEN..BIH_LEN + 2], &[0xff, 0x06]);
    let move_at_line_zero = [0xff, 0x06, 0, 0, 0, 0, 6, 0];
    assert!(bie.windows(8).any(|w| w == move_at_line_zero));
    assert_eq!(decode(&bie).expect("decode").planes[0], plane);
}

#[test]
fn test_delayed_at_move_interleaved_planes() {
    let planes = vec![
        stripes_with_period(64, 96),
        Bitmap::from_fn(64, 96, |x, y| (x + y) % 5 == 0).expect("alloc"),
    ];
    for order in [Order::NONE, Order::SEQ, Order::ILEAVE | Order::SMID] {
        let bie = encode_with(64, 96, &planes, |e| {
            e.set_layers(1);
            e.set_options(order, Options::TPBON | Options::DELAY_AT, 24, 8, 0);
        });
        check_all_layers(&bie, &planes, false, &format!("order {order:?}"));
    }
}

#[test]
fn test_at_with_two_line_template() {
    let plane = stripes_with_period(96, 96);
    let bie = encode_with(96, 96, std::slice::from_ref(&plane), |e| {
        e.set_options(Order::NONE, Options::LRLTWO | Options::TPBON, 32, 16, 0);
    });
    assert_eq!(decode(&bie).expect("decode").planes[0], plane);
}
