//! Tests for hashcode maps on real directory trees

use std::collections::BTreeSet;
use std::fs;

use bundle_core::{DELETED_FILE_HASHCODE, DIRECTORY_HASHCODE, FileHashcodeMap, PathPattern};
use bundle_fs::checksum::compute_content_checksum;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;

fn write(root: &std::path::Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_generate_uses_forward_slash_keys() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a/b/c.txt", "c");
    write(temp.path(), "top.txt", "t");

    let mut ignored = BTreeSet::new();
    let map = FileHashcodeMap::generate_file_hashcode_map(temp.path(), None, &mut ignored).unwrap();

    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a/b/c.txt", "top.txt"]);
    assert_eq!(map.get("top.txt"), Some(compute_content_checksum("t").as_str()));
    assert!(ignored.is_empty());
}

#[test]
fn test_generate_reports_ignored_directory_once() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "logs/a.log", "a");
    write(temp.path(), "logs/nested/b.log", "b");
    write(temp.path(), "app.txt", "app");

    let pattern = PathPattern::new("logs").unwrap();
    let mut ignored = BTreeSet::new();
    let map = FileHashcodeMap::generate_file_hashcode_map(temp.path(), Some(&pattern), &mut ignored).unwrap();

    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["app.txt"]);
    assert_eq!(ignored.into_iter().collect::<Vec<_>>(), vec!["logs".to_string()]);
}

#[test]
fn test_rescan_after_generate_reports_manual_edits() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "keep.txt", "keep");
    write(temp.path(), "edit.txt", "before");
    write(temp.path(), "gone.txt", "gone");

    let mut ignored = BTreeSet::new();
    let original = FileHashcodeMap::generate_file_hashcode_map(temp.path(), None, &mut ignored).unwrap();

    write(temp.path(), "edit.txt", "after");
    fs::remove_file(temp.path().join("gone.txt")).unwrap();
    write(temp.path(), "new.txt", "new");

    let current = original.rescan(temp.path(), None, true).unwrap();

    assert_eq!(current.additions().keys().collect::<Vec<_>>(), vec!["new.txt"]);
    assert_eq!(current.changes().keys().collect::<Vec<_>>(), vec!["edit.txt"]);
    assert_eq!(current.deletions().keys().collect::<Vec<_>>(), vec!["gone.txt"]);
    assert_eq!(current.get("gone.txt"), Some(DELETED_FILE_HASHCODE));
    assert_eq!(current.get("keep.txt"), original.get("keep.txt"));
    assert!(current.unknown_content().is_none());
}

#[test]
fn test_rescan_tracks_recorded_directories() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "dir/a.txt", "a");

    let mut original = FileHashcodeMap::new();
    original.insert("dir/a.txt", compute_content_checksum("a"));
    original.add_directory_entries();

    let current = original.rescan(temp.path(), None, false).unwrap();
    assert_eq!(current.get("dir"), Some(DIRECTORY_HASHCODE));
    assert!(current.changes().is_empty());

    fs::remove_dir_all(temp.path().join("dir")).unwrap();
    let current = original.rescan(temp.path(), None, false).unwrap();
    assert_eq!(current.get("dir"), Some(DELETED_FILE_HASHCODE));
    assert_eq!(current.get("dir/a.txt"), Some(DELETED_FILE_HASHCODE));
}

#[test]
fn test_stored_map_survives_reload() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "dir/a.txt", "a");
    write(temp.path(), "name with spaces.txt", "s");

    let mut ignored = BTreeSet::new();
    let map = FileHashcodeMap::generate_file_hashcode_map(temp.path(), None, &mut ignored).unwrap();
    let file = temp.path().join("hashcodes.dat");
    map.store_to_file(&file).unwrap();

    assert_eq!(FileHashcodeMap::load_from_file(&file).unwrap(), map);
}

proptest! {
    #[test]
    fn prop_store_then_load_is_identity(
        entries in prop::collection::btree_map("[a-z0-9 ._-]{1,12}(/[a-z0-9 ._-]{1,12}){0,3}", "[0-9a-f]{64}", 0..20)
    ) {
        let temp = TempDir::new().unwrap();
        let map: FileHashcodeMap = entries.into_iter().collect();
        let file = temp.path().join("hashcodes.dat");

        map.store_to_file(&file).unwrap();
        prop_assert_eq!(FileHashcodeMap::load_from_file(&file).unwrap(), map);
    }
}
