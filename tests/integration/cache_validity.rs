use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;

use bundle_repack::cache::{CacheStore, ToolVersion, VersionPolicy};
use tempfile::TempDir;

type Lookup = BTreeMap<String, String>;

fn policy(content: &str, current: ToolVersion, floor: &str) -> VersionPolicy {
    VersionPolicy::new(content, floor)
        .unwrap()
        .with_tool_version(current)
}

fn seed(dir: &TempDir, content: &str, tool: ToolVersion) {
    let store = CacheStore::new(dir.path(), policy(content, tool, "0.1.0"));
    let cached = store
        .load_or_create("cabs.json", || {
            let mut lookup = Lookup::new();
            lookup.insert("cab-aaaa".to_string(), "scenes/tut_01.bundle".to_string());
            Ok(lookup)
        })
        .unwrap();
    cached.flush().unwrap();
}

/// Generator calls made when loading with `reader`
fn generations(dir: &TempDir, reader: VersionPolicy) -> usize {
    let calls = Cell::new(0);
    let store = CacheStore::new(dir.path(), reader);
    let cached = store
        .load_or_create("cabs.json", || {
            calls.set(calls.get() + 1);
            Ok(Lookup::new())
        })
        .unwrap();
    if calls.get() == 0 {
        assert_eq!(cached.read()["cab-aaaa"], "scenes/tut_01.bundle");
    }
    calls.get()
}

#[test]
fn matching_versions_reuse_the_file() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "1.0", ToolVersion::new(0, 3, 1));
    assert_eq!(generations(&dir, policy("1.0", ToolVersion::new(0, 3, 1), "0.1.0")), 0);
    assert_eq!(generations(&dir, policy("1.0", ToolVersion::new(0, 4, 0), "0.3.0")), 0);
}

#[test]
fn stamp_below_the_floor_regenerates() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "1.0", ToolVersion::new(0, 3, 1));
    assert_eq!(generations(&dir, policy("1.0", ToolVersion::new(0, 5, 0), "0.4.0")), 1);
}

#[test]
fn stamp_newer_than_the_running_tool_regenerates() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "1.0", ToolVersion::new(0, 3, 1));
    assert_eq!(generations(&dir, policy("1.0", ToolVersion::new(0, 3, 0), "0.1.0")), 1);
}

#[test]
fn major_mismatch_regenerates() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "1.0", ToolVersion::new(0, 3, 1));
    assert_eq!(generations(&dir, policy("1.0", ToolVersion::new(1, 0, 0), "0.1.0")), 1);
}

#[test]
fn content_version_change_regenerates() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "1.0", ToolVersion::new(0, 3, 1));
    assert_eq!(generations(&dir, policy("1.1", ToolVersion::new(0, 3, 1), "0.1.0")), 1);
}

#[test]
fn corrupt_file_regenerates() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("cabs.json"), b"{ not json").unwrap();
    assert_eq!(generations(&dir, policy("1.0", ToolVersion::new(0, 3, 1), "0.1.0")), 1);
}

#[test]
fn envelope_carries_the_stamp() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "1.0.28324", ToolVersion::new(0, 3, 1));

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("cabs.json")).unwrap()).unwrap();
    assert_eq!(raw["content_version"], "1.0.28324");
    assert_eq!(raw["tool_version"], "0.3.1");
    assert_eq!(raw["value"]["cab-aaaa"], "scenes/tut_01.bundle");
    assert!(!dir.path().join("cabs.json.tmp").exists());
}
