//! Image handle registry and block adapter tests

mod common;

use pbsnbd::infrastructure::restore_client::{InMemoryClient, InMemoryRepository};
use pbsnbd::{ReadError, SnapshotDevice};
use rstest::*;
use std::thread;

struct Fixture {
    repo: InMemoryRepository,
    device: SnapshotDevice<InMemoryClient>,
    data: Vec<u8>,
}

#[fixture]
fn fixture() -> Fixture {
    let repo = common::repository();
    let device = SnapshotDevice::connect(common::config(), &repo).unwrap();
    Fixture {
        repo,
        device,
        data: common::image_data(common::IMAGE_LEN),
    }
}

// ============================================================================
// Registry Tests
// ============================================================================

#[rstest]
fn test_open_registers_handle(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    let entry = fixture.device.registry().entry(&handle).unwrap();
    assert_eq!(entry.archive, "disk-0.fidx");
    assert_eq!(fixture.device.registry().len(), 1);

    fixture.device.close(handle);
    assert!(fixture.device.registry().is_empty());
}

#[rstest]
fn test_handles_have_distinct_entries(fixture: Fixture) {
    let a = fixture.device.open().unwrap();
    let b = fixture.device.open().unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(fixture.device.registry().len(), 2);
}

#[rstest]
fn test_missing_image_leaves_session_usable(fixture: Fixture) {
    let registry = fixture.device.registry();
    let session = fixture.device.session();

    let err = registry.open_image(session, "disk-9").unwrap_err();
    assert_eq!(err.archive, "disk-9.fidx");
    assert!(err.to_string().contains("disk-9.fidx"));
    assert!(registry.is_empty());

    let handle = registry.open_image(session, "disk-1").unwrap();
    assert_eq!(fixture.device.size(&handle).unwrap(), 4096);
}

#[rstest]
fn test_close_does_not_affect_other_handle(fixture: Fixture) {
    let keep = fixture.device.open().unwrap();
    let closed = fixture.device.open().unwrap();
    fixture.device.close(closed);

    assert_eq!(
        fixture.device.size(&keep).unwrap(),
        common::IMAGE_LEN as u64
    );
    let bytes = fixture.device.read(&keep, 1024, 512).unwrap();
    assert_eq!(&bytes[..], &fixture.data[1024..1536]);
}

// ============================================================================
// Size Tests
// ============================================================================

#[rstest]
fn test_size_is_stable(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    let first = fixture.device.size(&handle).unwrap();
    for _ in 0..4 {
        assert_eq!(fixture.device.size(&handle).unwrap(), first);
    }
    assert_eq!(first, common::IMAGE_LEN as u64);
}

#[rstest]
fn test_size_surfaces_remote_error(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    fixture.repo.fail_length("index corrupt");
    let err = fixture.device.size(&handle).unwrap_err();
    assert!(matches!(err, ReadError::Length(_)));
    assert!(err.to_string().contains("index corrupt"));
}

// ============================================================================
// Read Tests
// ============================================================================

#[rstest]
#[case(0, 512)]
#[case(4095, 2)]
#[case(10_000, 4096)]
#[case(common::IMAGE_LEN as u64 - 512, 512)]
fn test_read_returns_exact_range(fixture: Fixture, #[case] offset: u64, #[case] len: u32) {
    let handle = fixture.device.open().unwrap();
    let bytes = fixture.device.read(&handle, offset, len).unwrap();
    let start = offset as usize;
    assert_eq!(bytes.len(), len as usize);
    assert_eq!(&bytes[..], &fixture.data[start..start + len as usize]);
}

#[rstest]
fn test_zero_length_read_skips_remote(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    let before = fixture.repo.fetches();
    assert!(fixture.device.read(&handle, 0, 0).unwrap().is_empty());
    assert_eq!(fixture.repo.fetches(), before);
}

#[rstest]
fn test_read_split_at_chunk_boundaries(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    let adapter = fixture.device.adapter().with_chunk_size(4096);

    let before = fixture.repo.fetches();
    let bytes = adapter.read(&handle, 4000, 8300).unwrap();
    // 4000..4096, 4096..8192, 8192..12288, 12288..12300
    assert_eq!(fixture.repo.fetches() - before, 4);
    assert_eq!(&bytes[..], &fixture.data[4000..12300]);
}

#[rstest]
fn test_short_read_is_an_error(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    fixture.repo.limit_reads(100);

    let err = fixture.device.read(&handle, 0, 512).unwrap_err();
    assert_eq!(
        err,
        ReadError::ShortRead {
            offset: 0,
            requested: 512,
            returned: 100,
        }
    );
    assert_eq!(err.bytes_returned(), 100);
}

#[rstest]
fn test_short_read_counts_earlier_fetches(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    let adapter = fixture.device.adapter().with_chunk_size(1024);
    fixture.repo.limit_reads(600);

    // 1000..1024 comes back whole, 1024..2048 stops after 600 bytes
    let err = adapter.read(&handle, 1000, 1100).unwrap_err();
    assert_eq!(
        err,
        ReadError::ShortRead {
            offset: 1000,
            requested: 1100,
            returned: 624,
        }
    );
}

#[rstest]
fn test_read_past_end_is_short(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    let offset = common::IMAGE_LEN as u64 - 256;

    let err = fixture.device.read(&handle, offset, 512).unwrap_err();
    assert_eq!(err.bytes_returned(), 256);
}

#[rstest]
fn test_failed_read_reports_minus_one(fixture: Fixture) {
    let handle = fixture.device.open().unwrap();
    fixture.repo.fail_reads("chunk verification failed");

    let err = fixture.device.read(&handle, 0, 512).unwrap_err();
    assert_eq!(err.bytes_returned(), -1);
    assert!(err.to_string().contains("chunk verification failed"));

    fixture.repo.clear_faults();
    assert!(fixture.device.read(&handle, 0, 512).is_ok());
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[rstest]
fn test_concurrent_reads_on_two_handles(fixture: Fixture) {
    let a = fixture.device.open().unwrap();
    let b = fixture.device.open().unwrap();
    let device = &fixture.device;
    let data = &fixture.data;

    thread::scope(|s| {
        for (handle, stride) in [(&a, 512u64), (&b, 4096u64)] {
            s.spawn(move || {
                let mut offset = 0u64;
                while offset + 512 <= common::IMAGE_LEN as u64 {
                    let bytes = device.read(handle, offset, 512).unwrap();
                    let start = offset as usize;
                    assert_eq!(&bytes[..], &data[start..start + 512]);
                    offset += stride;
                }
            });
        }
    });
}

#[rstest]
fn test_close_while_other_handle_reads(fixture: Fixture) {
    let reader = fixture.device.open().unwrap();
    let device = &fixture.device;

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..64 {
                let handle = device.open().unwrap();
                device.close(handle);
            }
        });
        s.spawn(|| {
            for i in 0..64u64 {
                let bytes = device.read(&reader, i * 512, 512).unwrap();
                assert_eq!(bytes.len(), 512);
            }
        });
    });

    assert_eq!(device.registry().len(), 1);
}
