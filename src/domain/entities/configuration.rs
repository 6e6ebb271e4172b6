//! Configuration entity
//!
//! Everything needed to address one image inside one snapshot of a
//! remote repository. Built and validated by the configuration validator.

use super::backup_time::BackupTime;
use super::snapshot::SnapshotRef;
use std::fmt;

/// Validated plugin configuration
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Repository address, e.g. `user@pbs@host:datastore`
    pub repository: String,
    /// Password or API token secret
    pub password: String,
    /// Expected TLS certificate fingerprint of the server
    pub fingerprint: String,
    /// Owning guest id
    pub vmid: String,
    /// Snapshot creation time
    pub backup_time: BackupTime,
    /// Image to expose, without the index suffix
    pub image: String,
    /// Datastore namespace; `None` addresses the root namespace
    pub namespace: Option<String>,
}

impl Configuration {
    /// Returns the snapshot this configuration points at
    pub fn snapshot(&self) -> SnapshotRef<'_> {
        SnapshotRef::vm(&self.vmid, self.backup_time)
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("repository", &self.repository)
            .field("password", &"<redacted>")
            .field("fingerprint", &self.fingerprint)
            .field("vmid", &self.vmid)
            .field("backup_time", &self.backup_time)
            .field("image", &self.image)
            .field("namespace", &self.namespace)
            .finish()
    }
}
