//! Session manager
//!
//! Establishes the single authenticated connection to the backup
//! repository that every image handle is opened against.

use super::error::ConnectError;
use crate::domain::entities::{Configuration, SnapshotId};
use crate::domain::repositories::{RemoteError, RestoreClient, RestoreConnector, SessionParams};

/// An established restore session for one snapshot
///
/// Owns the remote client; dropping the session releases it. Shared
/// read-only between worker threads once connected.
pub struct Session<C: RestoreClient> {
    client: C,
    repository: String,
    snapshot: SnapshotId,
    chunk_size: usize,
}

impl<C: RestoreClient> Session<C> {
    /// Derives the snapshot id, allocates a client and connects it
    ///
    /// Must run after nbdkit has forked: the connection does not survive
    /// being inherited by a child process.
    pub fn connect<K>(config: &Configuration, connector: &K) -> Result<Self, ConnectError>
    where
        K: RestoreConnector<Client = C>,
    {
        let snapshot = connector
            .snapshot_id(&config.snapshot())
            .map_err(ConnectError::SnapshotId)?;

        let params = SessionParams {
            repository: &config.repository,
            snapshot: &snapshot,
            password: &config.password,
            fingerprint: &config.fingerprint,
            namespace: config.namespace.as_deref(),
        };
        let connect_error = |source: RemoteError| ConnectError::Connect {
            repository: config.repository.clone(),
            source,
        };

        let mut client = connector.new_session(&params).map_err(connect_error)?;

        tracing::info!(
            repository = %config.repository,
            snapshot = %snapshot,
            namespace = config.namespace.as_deref().unwrap_or("/"),
            "Connecting PBS"
        );
        client.connect().map_err(connect_error)?;

        let chunk_size = connector.chunk_size();
        tracing::info!(
            version = %connector.version(),
            chunk_size,
            "Connected via restore library"
        );

        Ok(Self {
            client,
            repository: config.repository.clone(),
            snapshot,
            chunk_size,
        })
    }

    /// Returns the remote client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the repository address
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns the snapshot this session reads from
    pub fn snapshot(&self) -> &SnapshotId {
        &self.snapshot
    }

    /// Returns the chunk size reads are split at
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl<C: RestoreClient> Drop for Session<C> {
    fn drop(&mut self) {
        tracing::debug!(snapshot = %self.snapshot, "Closing restore session");
    }
}
