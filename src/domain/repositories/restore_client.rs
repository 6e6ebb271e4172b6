//! Remote restore client traits
//!
//! Defines the interface to the backup repository's restore API. The
//! repository only knows how to read N bytes at an image-relative offset
//! from an image it has opened; everything above that lives in the
//! application layer.

use crate::domain::entities::{DeviceId, SnapshotId, SnapshotRef};
use thiserror::Error;

/// Default chunk size of the remote store (4 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Failure reported by the remote store
///
/// Carries the store's own message verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{detail}")]
pub struct RemoteError {
    pub detail: String,
}

impl RemoteError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Parameters a restore session is bound to
#[derive(Debug, Clone, Copy)]
pub struct SessionParams<'a> {
    /// Repository address
    pub repository: &'a str,
    /// Snapshot to restore from
    pub snapshot: &'a SnapshotId,
    /// Password or API token secret
    pub password: &'a str,
    /// Expected server certificate fingerprint
    pub fingerprint: &'a str,
    /// Datastore namespace, `None` for the root namespace
    pub namespace: Option<&'a str>,
}

/// Entry point of a restore API
///
/// A connector derives snapshot identifiers and allocates sessions. It
/// performs no network I/O itself.
pub trait RestoreConnector: Send + Sync {
    /// Session type produced by this connector
    type Client: RestoreClient;

    /// Renders a snapshot reference into the store's identifier format
    fn snapshot_id(&self, snapshot: &SnapshotRef<'_>) -> Result<SnapshotId, RemoteError>;

    /// Allocates a session bound to `params` without connecting it
    fn new_session(&self, params: &SessionParams<'_>) -> Result<Self::Client, RemoteError>;

    /// Version string of the client implementation, for diagnostics
    fn version(&self) -> String;

    /// Chunk size the store reads in
    fn chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }
}

/// One restore session against a single snapshot
///
/// After `connect` succeeds, every other method may be called from
/// several threads at once. Reads are keyed by explicit offset; there is
/// no stream position.
pub trait RestoreClient: Send + Sync {
    /// Performs the handshake and verifies the server's identity
    fn connect(&mut self) -> Result<(), RemoteError>;

    /// Opens an archive of the snapshot as a readable image
    fn open_image(&self, archive: &str) -> Result<DeviceId, RemoteError>;

    /// Returns the length in bytes of an open image
    fn image_length(&self, device: DeviceId) -> Result<u64, RemoteError>;

    /// Reads into `buf` starting at `offset`
    ///
    /// # Returns
    ///
    /// The number of bytes placed in `buf`, which may be less than
    /// `buf.len()`
    fn read_image_at(
        &self,
        device: DeviceId,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, RemoteError>;
}
