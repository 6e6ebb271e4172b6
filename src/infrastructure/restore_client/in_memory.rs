//! In-memory restore repository
//!
//! A self-contained stand-in for a backup server: snapshots keyed by
//! namespace and snapshot id, each holding named archives. Checks the
//! same credentials a real server would and can be told to misbehave,
//! which is what the tests use it for.

use crate::domain::entities::{DeviceId, FIXED_INDEX_SUFFIX, SnapshotId, SnapshotRef, archive_name};
use crate::domain::repositories::{RemoteError, RestoreClient, RestoreConnector, SessionParams};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Device ids are a single byte wide
const MAX_DEVICES: usize = 256;

type SnapshotKey = (Option<String>, SnapshotId);

#[derive(Debug, Default)]
struct Faults {
    read_error: Option<String>,
    length_error: Option<String>,
    max_read: Option<usize>,
}

#[derive(Debug)]
struct RepositoryState {
    address: String,
    password: String,
    fingerprint: String,
    snapshots: RwLock<HashMap<SnapshotKey, HashMap<String, Arc<Vec<u8>>>>>,
    faults: Mutex<Faults>,
    fetches: AtomicU64,
}

/// An in-process repository
///
/// Cloning shares the underlying state, so faults injected after a
/// session was opened apply to that session.
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    state: Arc<RepositoryState>,
}

impl InMemoryRepository {
    /// Creates an empty repository reachable at `address`
    pub fn new(address: &str, password: &str, fingerprint: &str) -> Self {
        Self {
            state: Arc::new(RepositoryState {
                address: address.to_string(),
                password: password.to_string(),
                fingerprint: fingerprint.to_string(),
                snapshots: RwLock::new(HashMap::new()),
                faults: Mutex::new(Faults::default()),
                fetches: AtomicU64::new(0),
            }),
        }
    }

    /// Stores `data` as image `image` of a snapshot
    ///
    /// The archive is stored under the image name plus the fixed index
    /// suffix, the way a VM backup lays out its disks.
    pub fn add_image(
        &self,
        namespace: Option<&str>,
        snapshot: &SnapshotRef<'_>,
        image: &str,
        data: Vec<u8>,
    ) -> Result<(), RemoteError> {
        let id = self.snapshot_id(snapshot)?;
        let archive = archive_name(image);
        self.state
            .snapshots
            .write()
            .entry((namespace.map(str::to_string), id))
            .or_default()
            .insert(archive, Arc::new(data));
        Ok(())
    }

    /// Makes every following read fail with `detail`
    pub fn fail_reads(&self, detail: &str) {
        self.state.faults.lock().read_error = Some(detail.to_string());
    }

    /// Makes every following length query fail with `detail`
    pub fn fail_length(&self, detail: &str) {
        self.state.faults.lock().length_error = Some(detail.to_string());
    }

    /// Caps the bytes a single read returns
    pub fn limit_reads(&self, max: usize) {
        self.state.faults.lock().max_read = Some(max);
    }

    /// Removes all injected faults
    pub fn clear_faults(&self) {
        *self.state.faults.lock() = Faults::default();
    }

    /// Number of read calls served so far
    pub fn fetches(&self) -> u64 {
        self.state.fetches.load(Ordering::Relaxed)
    }
}

impl RestoreConnector for InMemoryRepository {
    type Client = InMemoryClient;

    fn snapshot_id(&self, snapshot: &SnapshotRef<'_>) -> Result<SnapshotId, RemoteError> {
        if snapshot.kind.is_empty() || !is_valid_backup_id(snapshot.owner) {
            return Err(RemoteError::new(format!(
                "invalid backup id '{}'",
                snapshot.owner
            )));
        }
        Ok(SnapshotId::new(format!(
            "{}/{}/{}",
            snapshot.kind, snapshot.owner, snapshot.time
        )))
    }

    fn new_session(&self, params: &SessionParams<'_>) -> Result<InMemoryClient, RemoteError> {
        if params.repository.is_empty() {
            return Err(RemoteError::new("empty repository string"));
        }
        Ok(InMemoryClient {
            state: Arc::clone(&self.state),
            repository: params.repository.to_string(),
            snapshot: params.snapshot.clone(),
            password: params.password.to_string(),
            fingerprint: params.fingerprint.to_string(),
            namespace: params.namespace.map(str::to_string),
            archives: None,
            devices: RwLock::new(Vec::new()),
        })
    }

    fn version(&self) -> String {
        format!("in-memory {}", env!("CARGO_PKG_VERSION"))
    }
}

/// A session against an [`InMemoryRepository`]
#[derive(Debug)]
pub struct InMemoryClient {
    state: Arc<RepositoryState>,
    repository: String,
    snapshot: SnapshotId,
    password: String,
    fingerprint: String,
    namespace: Option<String>,
    archives: Option<HashMap<String, Arc<Vec<u8>>>>,
    devices: RwLock<Vec<Arc<Vec<u8>>>>,
}

impl InMemoryClient {
    fn image(&self, device: DeviceId) -> Result<Arc<Vec<u8>>, RemoteError> {
        self.devices
            .read()
            .get(device.raw() as usize)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("no such device {device}")))
    }
}

impl RestoreClient for InMemoryClient {
    fn connect(&mut self) -> Result<(), RemoteError> {
        if self.repository != self.state.address {
            return Err(RemoteError::new(format!(
                "error connecting to {}: host unreachable",
                self.repository
            )));
        }
        if self.fingerprint != self.state.fingerprint {
            return Err(RemoteError::new(
                "certificate validation failed - fingerprint mismatch",
            ));
        }
        if self.password != self.state.password {
            return Err(RemoteError::new("authentication failed"));
        }

        let key = (self.namespace.clone(), self.snapshot.clone());
        let archives = self
            .state
            .snapshots
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("snapshot '{}' not found", self.snapshot)))?;
        self.archives = Some(archives);
        Ok(())
    }

    fn open_image(&self, archive: &str) -> Result<DeviceId, RemoteError> {
        let archives = self
            .archives
            .as_ref()
            .ok_or_else(|| RemoteError::new("not connected"))?;
        if !archive.ends_with(FIXED_INDEX_SUFFIX) {
            return Err(RemoteError::new(format!(
                "unsupported archive type '{archive}'"
            )));
        }
        let data = archives
            .get(archive)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("unable to find archive '{archive}'")))?;

        let mut devices = self.devices.write();
        if devices.len() >= MAX_DEVICES {
            return Err(RemoteError::new("image registry full"));
        }
        devices.push(data);
        Ok(DeviceId::new((devices.len() - 1) as u8))
    }

    fn image_length(&self, device: DeviceId) -> Result<u64, RemoteError> {
        if let Some(detail) = &self.state.faults.lock().length_error {
            return Err(RemoteError::new(detail.clone()));
        }
        Ok(self.image(device)?.len() as u64)
    }

    fn read_image_at(
        &self,
        device: DeviceId,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, RemoteError> {
        self.state.fetches.fetch_add(1, Ordering::Relaxed);
        let max_read = {
            let faults = self.state.faults.lock();
            if let Some(detail) = &faults.read_error {
                return Err(RemoteError::new(detail.clone()));
            }
            faults.max_read
        };

        let image = self.image(device)?;
        let len = image.len() as u64;
        if offset >= len {
            return Err(RemoteError::new(format!(
                "read at offset {offset} beyond end of image ({len} bytes)"
            )));
        }

        let start = offset as usize;
        let mut n = buf.len().min(image.len() - start);
        if let Some(max) = max_read {
            n = n.min(max);
        }
        buf[..n].copy_from_slice(&image[start..start + n]);
        Ok(n)
    }
}

// Mirrors the server's BACKUP_ID regex.
fn is_valid_backup_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
