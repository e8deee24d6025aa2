mod common;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

use common::CacheBuilder;

fn evocache() -> Command {
    let mut cmd = Command::cargo_bin("evocache").unwrap();
    // Keep user config and log files out of the tests.
    cmd.env("EVOCACHE_CONFIG", "/nonexistent/evocache.toml");
    cmd.env("RUST_LOG", "off");
    cmd
}

fn sample(dir: &std::path::Path) -> std::path::PathBuf {
    let mut b = CacheBuilder::new(20);
    b.dir(0, "sub");
    b.pad_to(100).raw_file(1, "a.txt", &[7u8; 50], -1);
    b.raw_file(0, "top.cfg", b"key=value", -1);
    b.write(dir, "game")
}

#[test]
fn test_cli_extract_default_output_dir() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let base = sample(tmp.path());
    let cache = base.with_extension("cache");

    evocache()
        .arg(&cache)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extraction complete."));

    let out = tmp.path().join("game.cache_extracted");
    assert_eq!(fs::read(out.join("sub").join("a.txt"))?, vec![7u8; 50]);
    assert_eq!(fs::read(out.join("top.cfg"))?, b"key=value");
    Ok(())
}

#[test]
fn test_cli_extract_to_named_dir() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let base = sample(tmp.path());
    let dest = tmp.path().join("elsewhere");

    evocache()
        .arg(&base)
        .arg("-d")
        .arg(&dest)
        .assert()
        .success();
    assert!(dest.join("sub").join("a.txt").exists());
    Ok(())
}

#[test]
fn test_cli_list() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let base = sample(tmp.path());

    evocache()
        .arg("list")
        .arg(&base)
        .assert()
        .success()
        .stdout(predicate::str::contains("sub/a.txt").and(predicate::str::contains("top.cfg")));

    let output = evocache().arg("list").arg("--json").arg(&base).output()?;
    assert!(output.status.success());
    let items: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(items[0]["path"], "sub/a.txt");
    assert_eq!(items[0]["offset"], 100);
    assert_eq!(items[1]["length"], 9);
    Ok(())
}

#[test]
fn test_cli_cat() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let base = sample(tmp.path());
    evocache()
        .arg("cat")
        .arg(&base)
        .arg("top.cfg")
        .assert()
        .success()
        .stdout("key=value");
    Ok(())
}

#[test]
fn test_cli_stats() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let base = sample(tmp.path());

    evocache()
        .arg("stats")
        .arg(&base)
        .assert()
        .success()
        .stdout(predicate::str::contains("Version").and(predicate::str::contains("20")));

    let output = evocache().arg("stats").arg("--json").arg(&base).output()?;
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(stats["version"], 20);
    assert_eq!(stats["files"], 2);
    assert_eq!(stats["directories"], 1);
    assert_eq!(stats["compressed_files"], 0);
    assert_eq!(stats["total_length"], 59);
    assert_eq!(stats["scope_anomalies"], 0);
    Ok(())
}

#[test]
fn test_cli_extract_single_file() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let base = sample(tmp.path());
    let dest = tmp.path().join("one");

    evocache()
        .arg("extract")
        .arg(&base)
        .arg("-d")
        .arg(&dest)
        .arg("--file")
        .arg("sub/a.txt")
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted"));
    assert_eq!(fs::read(dest.join("sub").join("a.txt"))?, vec![7u8; 50]);
    assert!(!dest.join("top.cfg").exists());

    evocache()
        .arg("extract")
        .arg(&base)
        .arg("-d")
        .arg(&dest)
        .arg("--file")
        .arg("sub/missing.txt")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("sub/missing.txt"));
    Ok(())
}

#[test]
fn test_cli_missing_archive_argument() {
    evocache().assert().code(1);
}

#[test]
fn test_cli_duplicate_output_dir() {
    evocache()
        .args(["game", "-d", "a", "-d", "b"])
        .assert()
        .code(1);
}

#[test]
fn test_cli_bad_magic_exit_code() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let mut b = CacheBuilder::with_magic(0x1111_1111, 20);
    b.raw_file(0, "a.txt", b"x", -1);
    let base = b.write(tmp.path(), "game");

    evocache()
        .arg(&base)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error opening cache"));
    assert!(!tmp.path().join("game_extracted").exists());
    Ok(())
}

#[test]
fn test_cli_output_root_not_creatable() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let base = sample(tmp.path());
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, b"file, not a dir")?;

    evocache()
        .arg(&base)
        .arg("-d")
        .arg(blocker.join("out"))
        .assert()
        .code(3);
    Ok(())
}
