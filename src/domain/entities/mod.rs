//! Domain entities
//!
//! Value objects naming snapshots, images and the configuration that
//! selects them.

mod backup_time;
mod configuration;
mod image;
mod snapshot;

pub use backup_time::{BackupTime, TIMESTAMP_FORMAT};
pub use configuration::Configuration;
pub use image::{DeviceId, FIXED_INDEX_SUFFIX, HandleId, ImageHandle, archive_name};
pub use snapshot::{SnapshotId, SnapshotRef, VM_BACKUP_KIND};
