//! Property-based tests using proptest
//!
//! Codec agreement on arbitrary data and slice invariants over randomly
//! generated bundles.

mod common;

use common::{build, page, resource, Part};
use djvu_oxide::decoders::{bzz_compress, bzz_decompress, ZpDecoder, ZpEncoder};
use djvu_oxide::Document;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for a bundle: per page, the subset of `ndicts` dictionaries it includes.
fn layout_strategy() -> impl Strategy<Value = (usize, Vec<Vec<usize>>)> {
    (1usize..6).prop_flat_map(|ndicts| {
        let page = proptest::collection::vec(0..ndicts, 0..3);
        (Just(ndicts), proptest::collection::vec(page, 1..12))
    })
}

fn build_layout(ndicts: usize, pages: &[Vec<usize>]) -> bytes::Bytes {
    let names: Vec<String> = (0..ndicts).map(|d| format!("dict{}", d)).collect();
    let mut parts: Vec<Part> = names.iter().map(|n| resource(n, &[])).collect();
    for (i, includes) in pages.iter().enumerate() {
        let ids: Vec<&str> = includes.iter().map(|&d| names[d].as_str()).collect();
        parts.push(page(&format!("page{}", i), &ids));
    }
    build(&parts, None)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// BZZ decoding inverts encoding for any input and block size
    #[test]
    fn bzz_round_trip(data in proptest::collection::vec(any::<u8>(), 0..4096), block_kb in 1usize..8) {
        let packed = bzz_compress(&data, block_kb);
        prop_assert_eq!(bzz_decompress(&packed).unwrap(), data);
    }

    /// Skewed text survives too, where the MTF model sees long runs
    #[test]
    fn bzz_round_trip_text(text in "[a-c\\x00]{0,2000}") {
        let packed = bzz_compress(text.as_bytes(), 50);
        prop_assert_eq!(bzz_decompress(&packed).unwrap(), text.as_bytes());
    }

    /// The ZP decoder reproduces any mix of context and pass-through bits
    #[test]
    fn zp_agreement(bits in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..2000)) {
        let mut enc = ZpEncoder::new();
        let mut ctx = [0u8; 2];
        for &(bit, raw) in &bits {
            if raw {
                enc.encode_passthrough(bit);
            } else {
                enc.encode(bit, &mut ctx[bit as usize & 1]);
            }
        }
        let packed = enc.finish();

        let mut dec = ZpDecoder::new(&packed).unwrap();
        let mut ctx = [0u8; 2];
        for &(bit, raw) in &bits {
            let got = if raw {
                dec.decode_passthrough().unwrap()
            } else {
                dec.decode(&mut ctx[bit as usize & 1]).unwrap()
            };
            prop_assert_eq!(got, bit);
        }
    }

    /// A slice has `to - from` pages and exactly the dictionaries they include
    #[test]
    fn slice_page_count_and_closure((ndicts, pages) in layout_strategy(), a in 0usize..12, b in 0usize..12) {
        let doc = Document::open(build_layout(ndicts, &pages)).unwrap();
        let n = doc.page_count();
        prop_assert_eq!(n, pages.len());
        let (from, to) = (a.min(b).min(n), a.max(b).min(n));

        let out = Document::open(doc.slice(from..to).unwrap()).unwrap();
        prop_assert_eq!(out.page_count(), to - from);

        let expected: BTreeSet<String> = pages[from..to]
            .iter()
            .flatten()
            .map(|d| format!("dict{}", d))
            .collect();
        let got: BTreeSet<String> = out.resource_ids().into_iter().map(str::to_string).collect();
        prop_assert_eq!(got, expected);
    }
}
