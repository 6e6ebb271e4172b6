//! Image handle registry
//!
//! Tracks which remote device each open handle refers to. Open and close
//! take the write lock for the duration of a map update; lookups from the
//! read path share the read lock.

use super::error::OpenError;
use super::session::Session;
use crate::domain::entities::{DeviceId, HandleId, ImageHandle, archive_name};
use crate::domain::repositories::RestoreClient;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bookkeeping for one open handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Archive name the image was opened under
    pub archive: String,
    /// Device id the remote store assigned
    pub device: DeviceId,
}

/// Registry of open image handles
#[derive(Debug, Default)]
pub struct ImageRegistry {
    next_id: AtomicU64,
    entries: RwLock<HashMap<HandleId, ImageEntry>>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `image` within the session's snapshot
    ///
    /// The registry lock is not held across the remote open.
    pub fn open_image<C: RestoreClient>(
        &self,
        session: &Session<C>,
        image: &str,
    ) -> Result<ImageHandle, OpenError> {
        let archive = archive_name(image);
        tracing::info!(archive = %archive, "Opening image");

        let device = session
            .client()
            .open_image(&archive)
            .map_err(|source| OpenError {
                archive: archive.clone(),
                source,
            })?;

        let id = HandleId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(handle = %id, device = %device, "Image opened");
        self.entries.write().insert(id, ImageEntry { archive, device });

        Ok(ImageHandle::new(id))
    }

    /// Forgets a handle
    ///
    /// The remote image stays open; its lifetime is tied to the session.
    pub fn close_image(&self, handle: ImageHandle) {
        if let Some(entry) = self.entries.write().remove(&handle.id()) {
            tracing::debug!(handle = %handle.id(), archive = %entry.archive, "Image closed");
        }
    }

    /// Returns the remote device behind `handle`
    pub fn device(&self, handle: &ImageHandle) -> Option<DeviceId> {
        self.entries.read().get(&handle.id()).map(|entry| entry.device)
    }

    /// Returns a copy of the entry behind `handle`
    pub fn entry(&self, handle: &ImageHandle) -> Option<ImageEntry> {
        self.entries.read().get(&handle.id()).cloned()
    }

    /// Returns the number of open handles
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns whether no handle is open
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
