//! Snapshot identity
//!
//! A snapshot is addressed by entity kind, owner id and backup time. The
//! remote library renders these into the identifier string it expects.

use super::backup_time::BackupTime;
use std::fmt;

/// Entity kind used for virtual machine backups
pub const VM_BACKUP_KIND: &str = "vm";

/// The parts a snapshot identifier is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRef<'a> {
    /// Entity kind (always `vm` for this plugin)
    pub kind: &'a str,
    /// Owning entity id (the guest's VMID)
    pub owner: &'a str,
    /// When the snapshot was taken
    pub time: BackupTime,
}

impl<'a> SnapshotRef<'a> {
    /// Reference to a VM snapshot
    pub fn vm(owner: &'a str, time: BackupTime) -> Self {
        Self {
            kind: VM_BACKUP_KIND,
            owner,
            time,
        }
    }
}

/// Snapshot identifier as returned by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
