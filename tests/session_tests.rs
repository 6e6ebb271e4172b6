//! Session manager tests

mod common;

use pbsnbd::domain::entities::{BackupTime, SnapshotRef};
use pbsnbd::infrastructure::restore_client::InMemoryRepository;
use pbsnbd::{ConnectError, Session};
use rstest::*;

#[fixture]
fn repo() -> InMemoryRepository {
    common::repository()
}

#[rstest]
fn test_connect_binds_snapshot(repo: InMemoryRepository) {
    let session = Session::connect(&common::config(), &repo).unwrap();
    assert_eq!(session.snapshot().as_str(), "vm/100/2025-06-01T12:00:00Z");
    assert_eq!(session.repository(), common::REPO);
}

#[rstest]
fn test_malformed_vmid_fails_snapshot_id(repo: InMemoryRepository) {
    let mut config = common::config();
    config.vmid = "10 0".into();
    assert!(matches!(
        Session::connect(&config, &repo),
        Err(ConnectError::SnapshotId(_))
    ));
}

#[rstest]
#[case::wrong_password("password")]
#[case::wrong_fingerprint("fingerprint")]
#[case::wrong_repository("repository")]
fn test_connect_failures(repo: InMemoryRepository, #[case] field: &str) {
    let mut config = common::config();
    match field {
        "password" => config.password = "wrong".into(),
        "fingerprint" => config.fingerprint = "00:11:22".into(),
        _ => config.repository = "elsewhere:store".into(),
    }

    match Session::connect(&config, &repo) {
        Err(ConnectError::Connect { repository, source }) => {
            assert_eq!(repository, config.repository);
            assert!(!source.detail.is_empty());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("connect should fail"),
    }
}

#[rstest]
fn test_fingerprint_mismatch_detail(repo: InMemoryRepository) {
    let mut config = common::config();
    config.fingerprint = "00:11:22".into();
    let err = Session::connect(&config, &repo).err().unwrap();
    assert!(err.to_string().contains("fingerprint mismatch"));
}

#[rstest]
fn test_missing_snapshot_fails_connect(repo: InMemoryRepository) {
    let mut config = common::config();
    config.backup_time = BackupTime::parse("2020-01-01T00:00:00Z").unwrap();
    assert!(matches!(
        Session::connect(&config, &repo),
        Err(ConnectError::Connect { .. })
    ));
}

#[test]
fn test_namespace_selects_snapshot() {
    let repo = InMemoryRepository::new(common::REPO, common::PASSWORD, common::FINGERPRINT);
    let time = BackupTime::parse(common::TIMESTAMP).unwrap();
    repo.add_image(
        Some("prod"),
        &SnapshotRef::vm(common::VMID, time),
        common::IMAGE,
        vec![1; 512],
    )
    .unwrap();

    // Root namespace holds nothing
    assert!(Session::connect(&common::config(), &repo).is_err());

    let mut config = common::config();
    config.namespace = Some("prod".into());
    assert!(Session::connect(&config, &repo).is_ok());
}
