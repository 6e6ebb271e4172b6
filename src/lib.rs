//! Read-only block device access to a Proxmox Backup Server snapshot.
//!
//! The crate is organised in three layers:
//!
//! - [`domain`]: value objects and the restore client traits
//! - [`application`]: configuration, session, handle registry, block adapter
//! - [`infrastructure`]: the `libproxmox_backup_qemu` binding and an
//!   in-memory repository
//!
//! The nbdkit plugin itself lives in the `pbsnbd_plugin` crate.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{
    BlockAdapter, ConfigBuilder, ConfigError, ConnectError, ImageRegistry, Lifecycle,
    LifecycleError, LifecycleState, OpenError, ReadError, Session, SnapshotDevice,
};
pub use domain::entities::{BackupTime, Configuration, DeviceId, ImageHandle, SnapshotId};
pub use domain::repositories::{RemoteError, RestoreClient, RestoreConnector};
