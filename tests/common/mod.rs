//! Shared fixtures for the integration tests

#![allow(dead_code)]

use pbsnbd::domain::entities::{BackupTime, SnapshotRef};
use pbsnbd::infrastructure::restore_client::InMemoryRepository;
use pbsnbd::{ConfigBuilder, Configuration};

pub const REPO: &str = "host:store";
pub const PASSWORD: &str = "secret";
pub const FINGERPRINT: &str = "aa:bb:cc:dd:ee:ff";
pub const VMID: &str = "100";
pub const TIMESTAMP: &str = "2025-06-01T12:00:00Z";
pub const IMAGE: &str = "disk-0";
pub const IMAGE_LEN: usize = 64 * 1024;

/// Deterministic, non-repeating-per-page image content
pub fn image_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ (i / 4096) as u8).collect()
}

pub fn params() -> Vec<(&'static str, &'static str)> {
    vec![
        ("image", IMAGE),
        ("timestamp", TIMESTAMP),
        ("vmid", VMID),
        ("repo", REPO),
        ("password", PASSWORD),
        ("fingerprint", FINGERPRINT),
    ]
}

pub fn config() -> Configuration {
    let mut builder = ConfigBuilder::new();
    for (key, value) in params() {
        builder.set(key, value).unwrap();
    }
    builder.complete().unwrap()
}

/// Repository holding `disk-0` (and a small `disk-1`) in the test snapshot
pub fn repository() -> InMemoryRepository {
    let repo = InMemoryRepository::new(REPO, PASSWORD, FINGERPRINT);
    let time = BackupTime::parse(TIMESTAMP).unwrap();
    let snapshot = SnapshotRef::vm(VMID, time);
    repo.add_image(None, &snapshot, IMAGE, image_data(IMAGE_LEN))
        .unwrap();
    repo.add_image(None, &snapshot, "disk-1", vec![0xAB; 4096])
        .unwrap();
    repo
}
