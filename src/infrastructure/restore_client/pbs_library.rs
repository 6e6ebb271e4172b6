//! Proxmox Backup restore client
//!
//! Binds the C API of `libproxmox_backup_qemu` at runtime. The library is
//! loaded with `dlopen` rather than linked so the crate builds and tests
//! on hosts that do not have it installed.

use crate::domain::entities::{DeviceId, SnapshotId, SnapshotRef};
use crate::domain::repositories::{
    DEFAULT_CHUNK_SIZE, RemoteError, RestoreClient, RestoreConnector, SessionParams,
};
use libloading::Library;
use std::env;
use std::ffi::{CStr, CString, OsString, c_char, c_int, c_long};
use std::ptr::{self, NonNull};
use std::sync::Arc;
use thiserror::Error;

/// Library loaded when `PBSNBD_LIBRARY` is not set
pub const DEFAULT_LIBRARY: &str = "libproxmox_backup_qemu.so.0";

/// Environment variable overriding the library path
pub const LIBRARY_ENV: &str = "PBSNBD_LIBRARY";

/// Opaque restore handle owned by the library
#[repr(C)]
pub struct ProxmoxRestoreHandle {
    _private: [u8; 0],
}

type SnapshotStringFn =
    unsafe extern "C" fn(*const c_char, *const c_char, i64, *mut *mut c_char) -> *mut c_char;
type RestoreNewNsFn = unsafe extern "C" fn(
    *const c_char, // repo
    *const c_char, // snapshot
    *const c_char, // namespace
    *const c_char, // password
    *const c_char, // keyfile
    *const c_char, // key password
    *const c_char, // fingerprint
    *mut *mut c_char,
) -> *mut ProxmoxRestoreHandle;
type RestoreConnectFn = unsafe extern "C" fn(*mut ProxmoxRestoreHandle, *mut *mut c_char) -> c_int;
type RestoreDisconnectFn = unsafe extern "C" fn(*mut ProxmoxRestoreHandle);
type OpenImageFn =
    unsafe extern "C" fn(*mut ProxmoxRestoreHandle, *const c_char, *mut *mut c_char) -> c_int;
type ImageLengthFn =
    unsafe extern "C" fn(*mut ProxmoxRestoreHandle, u8, *mut *mut c_char) -> c_long;
type ReadImageAtFn = unsafe extern "C" fn(
    *mut ProxmoxRestoreHandle,
    u8,
    *mut u8,
    u64,
    u64,
    *mut *mut c_char,
) -> c_int;
type VersionFn = unsafe extern "C" fn() -> *const c_char;
type FreeErrorFn = unsafe extern "C" fn(*mut c_char);

/// Errors loading the restore library
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("unable to load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("symbol {name} missing from {path}: {source}")]
    Symbol {
        name: &'static str,
        path: String,
        #[source]
        source: libloading::Error,
    },
}

struct PbsApi {
    snapshot_string: SnapshotStringFn,
    restore_new_ns: RestoreNewNsFn,
    restore_connect: RestoreConnectFn,
    restore_disconnect: RestoreDisconnectFn,
    open_image: OpenImageFn,
    image_length: ImageLengthFn,
    read_image_at: ReadImageAtFn,
    version: VersionFn,
    free_error: FreeErrorFn,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl PbsApi {
    /// Converts an error string handed out by the library and frees it
    fn take_error(&self, raw: *mut c_char, fallback: &str) -> RemoteError {
        if raw.is_null() {
            return RemoteError::new(fallback);
        }
        let detail = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { (self.free_error)(raw) };
        RemoteError::new(detail)
    }
}

/// Handle on the dynamically loaded restore library
#[derive(Clone)]
pub struct PbsLibrary {
    api: Arc<PbsApi>,
}

impl PbsLibrary {
    /// Loads the library named by `PBSNBD_LIBRARY`, or the default soname
    pub fn load_default() -> Result<Self, LibraryError> {
        let path = env::var_os(LIBRARY_ENV).unwrap_or_else(|| OsString::from(DEFAULT_LIBRARY));
        Self::load(path)
    }

    /// Loads the library at `path` and resolves every entry point
    pub fn load(path: impl Into<OsString>) -> Result<Self, LibraryError> {
        let path = path.into();
        let shown = path.to_string_lossy().into_owned();

        // Runs the library's initialisers.
        let library = unsafe { Library::new(&path) }.map_err(|source| LibraryError::Load {
            path: shown.clone(),
            source,
        })?;

        let api = PbsApi {
            snapshot_string: resolve(&library, "proxmox_backup_snapshot_string", &shown)?,
            restore_new_ns: resolve(&library, "proxmox_restore_new_ns", &shown)?,
            restore_connect: resolve(&library, "proxmox_restore_connect", &shown)?,
            restore_disconnect: resolve(&library, "proxmox_restore_disconnect", &shown)?,
            open_image: resolve(&library, "proxmox_restore_open_image", &shown)?,
            image_length: resolve(&library, "proxmox_restore_get_image_length", &shown)?,
            read_image_at: resolve(&library, "proxmox_restore_read_image_at", &shown)?,
            version: resolve(&library, "proxmox_backup_qemu_version", &shown)?,
            free_error: resolve(&library, "proxmox_backup_free_error", &shown)?,
            _library: library,
        };

        tracing::debug!(path = %shown, "Loaded restore library");
        Ok(Self { api: Arc::new(api) })
    }
}

impl RestoreConnector for PbsLibrary {
    type Client = PbsRestore;

    fn snapshot_id(&self, snapshot: &SnapshotRef<'_>) -> Result<SnapshotId, RemoteError> {
        let kind = c_string(snapshot.kind, "backup type")?;
        let owner = c_string(snapshot.owner, "backup id")?;
        let mut error = ptr::null_mut();

        let raw = unsafe {
            (self.api.snapshot_string)(
                kind.as_ptr(),
                owner.as_ptr(),
                snapshot.time.epoch(),
                &mut error,
            )
        };
        if raw.is_null() {
            return Err(self
                .api
                .take_error(error, "proxmox_backup_snapshot_string failed"));
        }

        // The snapshot string comes from strdup(), not from a CString.
        let id = unsafe { take_malloced_string(raw) };
        Ok(SnapshotId::new(id))
    }

    fn new_session(&self, params: &SessionParams<'_>) -> Result<PbsRestore, RemoteError> {
        let repository = c_string(params.repository, "repository")?;
        let snapshot = c_string(params.snapshot.as_str(), "snapshot")?;
        let password = c_string(params.password, "password")?;
        let fingerprint = c_string(params.fingerprint, "fingerprint")?;
        let namespace = params
            .namespace
            .map(|ns| c_string(ns, "namespace"))
            .transpose()?;
        let mut error = ptr::null_mut();

        let raw = unsafe {
            (self.api.restore_new_ns)(
                repository.as_ptr(),
                snapshot.as_ptr(),
                namespace.as_ref().map_or(ptr::null(), |ns| ns.as_ptr()),
                password.as_ptr(),
                ptr::null(),
                ptr::null(),
                fingerprint.as_ptr(),
                &mut error,
            )
        };

        match NonNull::new(raw) {
            Some(handle) => Ok(PbsRestore {
                api: Arc::clone(&self.api),
                handle,
            }),
            None => Err(self.api.take_error(error, "proxmox_restore_new_ns failed")),
        }
    }

    fn version(&self) -> String {
        let raw = unsafe { (self.api.version)() };
        if raw.is_null() {
            return String::from("unknown");
        }
        unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()
    }

    fn chunk_size(&self) -> usize {
        DEFAULT_CHUNK_SIZE
    }
}

/// A restore session opened through [`PbsLibrary`]
///
/// Dropping it disconnects and frees the library's handle.
pub struct PbsRestore {
    api: Arc<PbsApi>,
    handle: NonNull<ProxmoxRestoreHandle>,
}

// The restore handle dispatches every call onto the library's own runtime
// and may be used from any thread.
unsafe impl Send for PbsRestore {}
unsafe impl Sync for PbsRestore {}

impl RestoreClient for PbsRestore {
    fn connect(&mut self) -> Result<(), RemoteError> {
        let mut error = ptr::null_mut();
        let rc = unsafe { (self.api.restore_connect)(self.handle.as_ptr(), &mut error) };
        if rc < 0 {
            return Err(self.api.take_error(error, "proxmox_restore_connect failed"));
        }
        Ok(())
    }

    fn open_image(&self, archive: &str) -> Result<DeviceId, RemoteError> {
        let name = c_string(archive, "archive name")?;
        let mut error = ptr::null_mut();
        let rc =
            unsafe { (self.api.open_image)(self.handle.as_ptr(), name.as_ptr(), &mut error) };
        if rc < 0 {
            return Err(self
                .api
                .take_error(error, "proxmox_restore_open_image failed"));
        }
        u8::try_from(rc)
            .map(DeviceId::new)
            .map_err(|_| RemoteError::new(format!("device id {rc} out of range")))
    }

    fn image_length(&self, device: DeviceId) -> Result<u64, RemoteError> {
        let mut error = ptr::null_mut();
        let length = unsafe {
            (self.api.image_length)(self.handle.as_ptr(), device.raw(), &mut error)
        };
        if length < 0 {
            return Err(self
                .api
                .take_error(error, "proxmox_restore_get_image_length failed"));
        }
        Ok(length as u64)
    }

    fn read_image_at(
        &self,
        device: DeviceId,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize, RemoteError> {
        let mut error = ptr::null_mut();
        let rc = unsafe {
            (self.api.read_image_at)(
                self.handle.as_ptr(),
                device.raw(),
                buf.as_mut_ptr(),
                offset,
                buf.len() as u64,
                &mut error,
            )
        };
        if rc < 0 {
            return Err(self
                .api
                .take_error(error, "proxmox_restore_read_image_at failed"));
        }
        Ok(rc as usize)
    }
}

impl Drop for PbsRestore {
    fn drop(&mut self) {
        unsafe { (self.api.restore_disconnect)(self.handle.as_ptr()) };
    }
}

// Every `T` passed in is the exact signature from proxmox-backup-qemu.h.
fn resolve<T: Copy>(
    library: &Library,
    name: &'static str,
    path: &str,
) -> Result<T, LibraryError> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|source| {
        LibraryError::Symbol {
            name,
            path: path.to_string(),
            source,
        }
    })?;
    Ok(*symbol)
}

/// Copies a `malloc`ed C string and releases it with `free`
///
/// # Safety
///
/// `raw` must be a non-null, NUL-terminated string allocated by the C
/// allocator and not used afterwards.
unsafe fn take_malloced_string(raw: *mut c_char) -> String {
    let owned = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
    unsafe { libc::free(raw.cast()) };
    owned
}

fn c_string(value: &str, what: &str) -> Result<CString, RemoteError> {
    CString::new(value).map_err(|_| RemoteError::new(format!("{what} contains a NUL byte")))
}
