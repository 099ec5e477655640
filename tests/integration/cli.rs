//! `verify-pack` binary behavior: exit codes and stream separation.

use assert_cmd::cargo::cargo_bin_cmd;
use pack_verify::pack::test_utils::{append_delta, numbered_oid as oid, PackBuilder};
use pack_verify::{ObjectFormat, ObjectKind};
use tempfile::TempDir;

fn fixture(dir: &TempDir) -> std::path::PathBuf {
    let mut b = PackBuilder::new(ObjectFormat::Sha1);
    let base = b.literal(oid(ObjectFormat::Sha1, 1), ObjectKind::Blob, b"cli base");
    b.ofs_delta(oid(ObjectFormat::Sha1, 2), base, &append_delta(8, b"!"));
    b.write_to(dir.path(), "pack-cli").unwrap()
}

#[test]
fn verbose_report_on_stdout() {
    let dir = TempDir::new().unwrap();
    let idx = fixture(&dir);

    let assert = cargo_bin_cmd!("verify-pack")
        .arg("-v")
        .arg(&idx)
        .env_remove("RUST_LOG")
        .env_remove("GIT_TRACE")
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5, "{stdout}");
    assert!(lines[1].ends_with(&format!(" 1 {}", oid(ObjectFormat::Sha1, 1))));
    assert_eq!(lines[2], "non delta: 1 objects");
    assert_eq!(lines[3], "chain length = 1: 1 object");
    assert_eq!(lines[4], format!("{}: ok", idx.display()));
    assert!(assert.get_output().stderr.is_empty());
}

#[test]
fn quiet_run_prints_ok_line() {
    let dir = TempDir::new().unwrap();
    let idx = fixture(&dir);
    let pack = idx.with_extension("pack");

    cargo_bin_cmd!("verify-pack")
        .arg(&pack)
        .assert()
        .success()
        .stdout(format!("{}: ok\n", pack.display()));
}

#[test]
fn trace_logs_go_to_stderr() {
    let dir = TempDir::new().unwrap();
    let idx = fixture(&dir);

    let assert = cargo_bin_cmd!("verify-pack")
        .arg(&idx)
        .env_remove("RUST_LOG")
        .env("GIT_TRACE", "1")
        .assert()
        .success()
        .stdout(format!("{}: ok\n", idx.display()));
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("index decoded"), "{stderr}");
}

#[test]
fn bad_extension_fails() {
    let assert = cargo_bin_cmd!("verify-pack")
        .arg("pack-1.bitmap")
        .assert()
        .code(1);
    let output = assert.get_output();
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr.clone()).unwrap();
    assert!(stderr.starts_with("error: "), "{stderr}");
    assert!(stderr.contains(".idx or .pack"), "{stderr}");
}

#[test]
fn corrupt_pack_fails_without_partial_output() {
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(ObjectFormat::Sha1);
    b.literal(oid(ObjectFormat::Sha1, 1), ObjectKind::Blob, b"base");
    b.ref_delta(
        oid(ObjectFormat::Sha1, 2),
        oid(ObjectFormat::Sha1, 7),
        &append_delta(4, b"x"),
    );
    let idx = b.write_to(dir.path(), "pack-broken").unwrap();

    let assert = cargo_bin_cmd!("verify-pack")
        .arg("--verbose")
        .arg(&idx)
        .assert()
        .code(1);
    assert!(assert.get_output().stdout.is_empty());
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("unresolved delta base"), "{stderr}");
}

#[test]
fn sha256_flag() {
    let format = ObjectFormat::Sha256;
    let dir = TempDir::new().unwrap();
    let mut b = PackBuilder::new(format);
    b.literal(oid(format, 1), ObjectKind::Commit, b"tree x\n");
    let idx = b.write_to(dir.path(), "pack-256").unwrap();

    let assert = cargo_bin_cmd!("verify-pack")
        .args(["--sha256", "-v"])
        .arg(&idx)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.starts_with(&format!("{} commit 7 ", oid(format, 1))));
}

#[test]
fn object_cap_applies_to_delta_bases_only() {
    let dir = TempDir::new().unwrap();
    let idx = fixture(&dir);
    let assert = cargo_bin_cmd!("verify-pack")
        .args(["--max-object-bytes", "4"])
        .arg(&idx)
        .assert()
        .code(1);
    assert!(assert.get_output().stdout.is_empty());
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("cap is 4"), "{stderr}");

    let mut b = PackBuilder::new(ObjectFormat::Sha1);
    b.literal(oid(ObjectFormat::Sha1, 1), ObjectKind::Blob, b"larger than four");
    let literal_only = b.write_to(dir.path(), "pack-literal").unwrap();
    cargo_bin_cmd!("verify-pack")
        .args(["--max-object-bytes", "4"])
        .arg(&literal_only)
        .assert()
        .success();
}

#[test]
fn missing_argument_is_usage_error() {
    cargo_bin_cmd!("verify-pack").assert().code(2);
}
