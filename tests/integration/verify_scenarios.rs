//! End-to-end verification of fixture packs written to disk.

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pack_verify::pack::test_utils::{
    append_delta, encode_entry_header, numbered_oid as oid, PackBuilder,
};
use pack_verify::pack::{DiskType, UnresolvedBase, VerifyError};
use pack_verify::{
    verify_bytes, verify_pack, verify_pack_to, ObjectFormat, ObjectKind, VerifyOptions,
};
use tempfile::TempDir;

const SHA1: ObjectFormat = ObjectFormat::Sha1;

fn verbose() -> VerifyOptions {
    VerifyOptions {
        verbose: true,
        ..VerifyOptions::default()
    }
}

fn render(path: &Path, options: &VerifyOptions) -> Result<String, VerifyError> {
    let mut out = Vec::new();
    verify_pack_to(path, options, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn three_literals() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    let commit = b.literal(oid(SHA1, 1), ObjectKind::Commit, b"tree 0000\n\nmsg\n");
    let tree = b.literal(oid(SHA1, 2), ObjectKind::Tree, b"100644 a\0xxxxxxxxxxxxxxxxxxxx");
    let blob = b.literal(oid(SHA1, 3), ObjectKind::Blob, b"hello\n");
    let end = b.next_offset();
    let path = b.write_to(dir.path(), "pack-three").unwrap();

    let text = render(&path, &verbose()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5, "{text}");
    assert_eq!(
        lines[0],
        format!("{} commit 15 {} {commit}", oid(SHA1, 1), tree - commit)
    );
    assert_eq!(
        lines[1],
        format!("{} tree   29 {} {tree}", oid(SHA1, 2), blob - tree)
    );
    assert_eq!(
        lines[2],
        format!("{} blob   6 {} {blob}", oid(SHA1, 3), end - blob)
    );
    assert_eq!(lines[3], "non delta: 3 objects");
    assert_eq!(lines[4], format!("{}: ok", path.display()));
}

#[test]
fn literal_and_ref_delta() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    b.literal(oid(SHA1, 1), ObjectKind::Blob, b"base content");
    let delta = append_delta(12, b" plus more");
    let d = b.ref_delta(oid(SHA1, 2), oid(SHA1, 1), &delta);
    let path = b.write_to(dir.path(), "pack-ref").unwrap();

    let text = render(&path, &verbose()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(
        lines[1].starts_with(&format!("{} blob   {} ", oid(SHA1, 2), delta.len())),
        "{text}"
    );
    assert!(lines[1].ends_with(&format!(" {d} 1 {}", oid(SHA1, 1))));
    assert_eq!(
        &lines[2..],
        [
            "non delta: 1 objects".to_string(),
            "chain length = 1: 1 object".to_string(),
            format!("{}: ok", path.display()),
        ]
    );
}

#[test]
fn delta_of_delta() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    let base = b.literal(oid(SHA1, 1), ObjectKind::Tree, b"0123456789");
    let mid = b.ofs_delta(oid(SHA1, 2), base, &append_delta(10, b"ab"));
    b.ofs_delta(oid(SHA1, 3), mid, &append_delta(12, b"cd"));
    let path = b.write_to(dir.path(), "pack-chain").unwrap();

    let run = verify_pack(&path, &verbose()).unwrap();
    let depths: Vec<u32> = run.records().iter().map(|r| r.depth).collect();
    assert_eq!(depths, [0, 1, 2]);
    assert_eq!(run.records()[2].base_hash, Some(oid(SHA1, 2)));
    assert!(run
        .records()
        .iter()
        .all(|r| r.resolved_type == Some(ObjectKind::Tree)));

    let text = render(&path, &verbose()).unwrap();
    assert!(text.contains("chain length = 1: 1 object\nchain length = 2: 1 object\n"));
}

#[test]
fn corrupt_ofs_base_emits_nothing() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    b.literal(oid(SHA1, 1), ObjectKind::Blob, b"some base bytes");
    // Lands inside the literal's compressed payload.
    b.ofs_delta_raw(oid(SHA1, 2), 5, &append_delta(15, b"!"));
    let path = b.write_to(dir.path(), "pack-bad-ofs").unwrap();

    let mut out = Vec::new();
    let err = verify_pack_to(&path, &verbose(), &mut out).unwrap_err();
    assert!(
        matches!(
            err,
            VerifyError::UnresolvedDeltaBase {
                reason: UnresolvedBase::NotAnEntry { .. },
                ..
            }
        ),
        "{err}"
    );
    assert!(out.is_empty());
}

#[test]
fn missing_ref_base() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    b.ref_delta(oid(SHA1, 1), oid(SHA1, 99), &append_delta(4, b"x"));
    let path = b.write_to(dir.path(), "pack-thin").unwrap();

    let err = verify_pack(&path, &VerifyOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        VerifyError::UnresolvedDeltaBase {
            reason: UnresolvedBase::MissingHash(_),
            ..
        }
    ));
}

#[test]
fn empty_pack_is_ok() {
    let dir = TempDir::new().unwrap();
    let path = PackBuilder::new(SHA1).write_to(dir.path(), "pack-empty").unwrap();
    assert_eq!(
        render(&path, &verbose()).unwrap(),
        format!("non delta: 0 objects\n{}: ok\n", path.display())
    );
}

#[test]
fn quiet_mode_prints_status_only() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    b.literal(oid(SHA1, 1), ObjectKind::Blob, b"x");
    let path = b.write_to(dir.path(), "pack-quiet").unwrap();
    assert_eq!(
        render(&path, &VerifyOptions::default()).unwrap(),
        format!("{}: ok\n", path.display())
    );
}

#[test]
fn pack_path_is_accepted() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    b.literal(oid(SHA1, 1), ObjectKind::Blob, b"x");
    let idx = b.write_to(dir.path(), "pack-by-pack").unwrap();
    let pack = idx.with_extension("pack");
    assert_eq!(
        render(&pack, &VerifyOptions::default()).unwrap(),
        format!("{}: ok\n", pack.display())
    );
}

#[test]
fn sha256_pack() {
    let format = ObjectFormat::Sha256;
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(format);
    b.literal(oid(format, 1), ObjectKind::Blob, b"abcdef");
    let d = b.ref_delta(oid(format, 2), oid(format, 1), &append_delta(6, b"g"));
    let end = b.next_offset();
    let path = b.write_to(dir.path(), "pack-256").unwrap();

    let options = VerifyOptions {
        verbose: true,
        format,
        ..VerifyOptions::default()
    };
    let run = verify_pack(&path, &options).unwrap();
    let last = &run.records()[1];
    assert_eq!(last.packed_size, end - d);
    assert_eq!(last.base_hash, Some(oid(format, 1)));

    let text = render(&path, &options).unwrap();
    let first = text.lines().next().unwrap();
    assert_eq!(first.split(' ').next().unwrap().len(), 64);

    // The same files read as SHA-1 do not decode.
    assert!(verify_pack(&path, &verbose()).is_err());
}

#[test]
fn invalid_extension() {
    let err = verify_pack(Path::new("objects/pack-1.keep"), &verbose()).unwrap_err();
    assert!(matches!(err, VerifyError::InvalidFileName { .. }));
}

#[test]
fn missing_pack_file() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    b.literal(oid(SHA1, 1), ObjectKind::Blob, b"x");
    let idx = b.write_to(dir.path(), "pack-gone").unwrap();
    std::fs::remove_file(idx.with_extension("pack")).unwrap();

    match verify_pack(&idx, &verbose()) {
        Err(VerifyError::Io { path, .. }) => assert_eq!(path, idx.with_extension("pack")),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn reports_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(SHA1);
    let base = b.literal(oid(SHA1, 1), ObjectKind::Blob, b"shared base");
    b.ofs_delta(oid(SHA1, 2), base, &append_delta(11, b"1"));
    b.ref_delta(oid(SHA1, 3), oid(SHA1, 1), &append_delta(11, b"2"));
    let path = b.write_to(dir.path(), "pack-again").unwrap();

    let first = render(&path, &verbose()).unwrap();
    let second = render(&path, &verbose()).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("chain length = 1: 2 objects\n"));
}

#[test]
#[ignore]
fn blob_past_one_gib() {
    let size = (1usize << 30) + 1;
    let chunk = vec![0u8; 1 << 20];
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    let mut left = size;
    while left > 0 {
        let n = left.min(chunk.len());
        encoder.write_all(&chunk[..n]).unwrap();
        left -= n;
    }
    let compressed = encoder.finish().unwrap();

    let mut b = PackBuilder::new(SHA1);
    let header = encode_entry_header(DiskType::Blob, size as u64);
    b.raw_entry(oid(SHA1, 1), &header, &compressed);
    let (pack, idx) = b.finish();

    let run = verify_bytes(&idx, &pack, &verbose()).unwrap();
    assert_eq!(run.records()[0].declared_size, size as u64);
    assert_eq!(run.records()[0].resolved_type, Some(ObjectKind::Blob));
}
