use assert_fs::prelude::*;
use bundle_fs::{checksum, io};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_file_and_parents() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested/dir/test.txt");

    io::write_atomic(&path, b"hello world").unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "hello world");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "original").unwrap();

    io::write_atomic(&file_path, b"updated").unwrap();

    assert_eq!(fs::read_to_string(&file_path).unwrap(), "updated");
}

#[test]
fn test_write_atomic_leaves_no_temp_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let target = temp.child("state.properties");

    io::write_atomic(target.path(), b"a=b").unwrap();

    target.assert("a=b");
    let leftovers: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_read_text_nonexistent_file() {
    let temp = TempDir::new().unwrap();
    let result = io::read_text(&temp.path().join("missing.txt"));
    assert!(result.is_err());
}

#[test]
fn test_copy_with_checksum_returns_digest_of_copy() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("src.txt");
    src.write_str("payload").unwrap();
    let dest = temp.child("out/deeper/dest.txt");

    let digest = io::copy_with_checksum(src.path(), dest.path()).unwrap();

    dest.assert("payload");
    assert_eq!(digest, checksum::compute_content_checksum("payload"));
}

#[test]
fn test_purge_removes_trees_and_tolerates_missing() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("tree/a/b.txt").write_str("b").unwrap();
    temp.child("single.txt").write_str("s").unwrap();

    io::purge(&temp.path().join("tree")).unwrap();
    io::purge(&temp.path().join("single.txt")).unwrap();
    io::purge(&temp.path().join("never-existed")).unwrap();

    temp.child("tree").assert(predicate::path::missing());
    temp.child("single.txt").assert(predicate::path::missing());
}

#[test]
fn test_usable_space_walks_up_to_existing_ancestor() {
    let temp = TempDir::new().unwrap();
    let space = io::usable_space(&temp.path().join("does/not/exist")).unwrap();
    assert!(space > 0);
}
