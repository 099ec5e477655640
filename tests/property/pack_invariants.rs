//! Structural invariants of verification runs over generated packs.
//!
//! Each generated pack mixes literal objects with OFS and REF deltas whose
//! bases appear earlier in the pack, so every chain is resolvable. The
//! report must then satisfy the accounting and depth rules regardless of
//! shape.

use std::collections::HashMap;

use proptest::prelude::*;

use pack_verify::pack::test_utils::{append_delta, numbered_oid as oid, PackBuilder};
use pack_verify::pack::{verify_bytes, PACK_HEADER_LEN};
use pack_verify::{ObjectFormat, ObjectId, ObjectKind, VerifyOptions};

#[derive(Clone, Debug)]
enum Shape {
    Literal { kind: u8, data: Vec<u8> },
    Delta { base: usize, by_ref: bool, suffix: Vec<u8> },
}

fn shape_strategy() -> impl Strategy<Value = Shape> {
    prop_oneof![
        (0u8..4, prop::collection::vec(any::<u8>(), 1..96))
            .prop_map(|(kind, data)| Shape::Literal { kind, data }),
        (any::<usize>(), any::<bool>(), prop::collection::vec(any::<u8>(), 0..24))
            .prop_map(|(base, by_ref, suffix)| Shape::Delta { base, by_ref, suffix }),
    ]
}

fn kind_of(tag: u8) -> ObjectKind {
    match tag {
        0 => ObjectKind::Commit,
        1 => ObjectKind::Tree,
        2 => ObjectKind::Blob,
        _ => ObjectKind::Tag,
    }
}

/// A generated pack plus what the verifier is expected to derive.
struct Generated {
    format: ObjectFormat,
    pack: Vec<u8>,
    idx: Vec<u8>,
    root_kind: HashMap<ObjectId, ObjectKind>,
}

fn build(format: ObjectFormat, shapes: &[Shape]) -> Generated {
    let mut b = PackBuilder::new(format);
    // (id, offset, content length, root kind) of every object so far.
    let mut placed: Vec<(ObjectId, u64, usize, ObjectKind)> = Vec::new();

    for (n, shape) in shapes.iter().enumerate() {
        let id = oid(format, n as u32);
        match shape {
            Shape::Literal { kind, data } => {
                let kind = kind_of(*kind);
                let offset = b.literal(id, kind, data);
                placed.push((id, offset, data.len(), kind));
            }
            Shape::Delta { .. } if placed.is_empty() => {
                let offset = b.literal(id, ObjectKind::Blob, b"seed");
                placed.push((id, offset, 4, ObjectKind::Blob));
            }
            Shape::Delta {
                base,
                by_ref,
                suffix,
            } => {
                let (base_id, base_offset, base_len, kind) = placed[base % placed.len()];
                let delta = append_delta(base_len, suffix);
                let offset = if *by_ref {
                    b.ref_delta(id, base_id, &delta)
                } else {
                    b.ofs_delta(id, base_offset, &delta)
                };
                placed.push((id, offset, base_len + suffix.len(), kind));
            }
        }
    }

    let root_kind = placed.iter().map(|&(id, _, _, kind)| (id, kind)).collect();
    let (pack, idx) = b.finish();
    Generated {
        format,
        pack,
        idx,
        root_kind,
    }
}

fn format_strategy() -> impl Strategy<Value = ObjectFormat> {
    prop_oneof![Just(ObjectFormat::Sha1), Just(ObjectFormat::Sha256)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_packs_satisfy_invariants(
        format in format_strategy(),
        shapes in prop::collection::vec(shape_strategy(), 0..24),
    ) {
        let generated = build(format, &shapes);
        let options = VerifyOptions {
            verbose: true,
            format: generated.format,
            ..VerifyOptions::default()
        };
        let run = verify_bytes(&generated.idx, &generated.pack, &options).unwrap();
        let records = run.records();
        prop_assert_eq!(records.len(), shapes.len());

        // Offsets strictly increase and spans partition the body.
        for pair in records.windows(2) {
            prop_assert!(pair[0].offset < pair[1].offset);
        }
        let spans: u64 = records.iter().map(|r| r.packed_size).sum();
        prop_assert_eq!(
            PACK_HEADER_LEN + spans + format.trailer_len(),
            generated.pack.len() as u64
        );

        // depth(d) = 1 + depth(base); literals have depth 0 and no base.
        let depth_of: HashMap<ObjectId, u32> =
            records.iter().map(|r| (r.hash, r.depth)).collect();
        for record in records {
            match record.base_hash {
                Some(base) => {
                    prop_assert!(record.is_delta());
                    prop_assert_eq!(record.depth, 1 + depth_of[&base]);
                }
                None => {
                    prop_assert!(!record.is_delta());
                    prop_assert_eq!(record.depth, 0);
                }
            }
            prop_assert_eq!(record.resolved_type, Some(generated.root_kind[&record.hash]));
        }

        // Aggregates agree with the records.
        let report = run.report();
        prop_assert_eq!(
            report.non_delta_count() + report.delta_count(),
            records.len() as u64
        );
        prop_assert_eq!(
            report.chain_histogram().values().sum::<u64>(),
            report.delta_count()
        );
        prop_assert!(report.chain_histogram().keys().all(|&depth| depth >= 1));
    }

    #[test]
    fn truncated_packs_never_panic(
        shapes in prop::collection::vec(shape_strategy(), 1..8),
        cut in any::<prop::sample::Index>(),
    ) {
        let generated = build(ObjectFormat::Sha1, &shapes);
        let mut pack = generated.pack;
        let keep = cut.index(pack.len());
        pack.truncate(keep);
        let _ = verify_bytes(&generated.idx, &pack, &VerifyOptions::default());
    }
}
