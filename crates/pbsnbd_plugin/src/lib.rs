//! nbdkit plugin exporting one image of a Proxmox Backup Server snapshot
//!
//! ```text
//! nbdkit ./libnbdkit_pbsnbd_plugin.so repo=root@pam@pbs:store \
//!     password=... fingerprint=... vmid=100 \
//!     timestamp=2025-06-01T12:00:00Z image=drive-scsi0.img
//! ```
//!
//! nbdkit calls the configuration hooks as free functions, so the
//! process [`Lifecycle`] sits in one static. Connections take their own
//! `Arc` of the device on open and never go back to it.

use anyhow::Context;
use nbdkit::*;
use parking_lot::Mutex;
use pbsnbd::application::{CONFIG_HELP, Lifecycle, SnapshotDevice};
use pbsnbd::infrastructure::restore_client::{PbsLibrary, PbsRestore};
use pbsnbd::ImageHandle;
use std::sync::{Arc, LazyLock, Once};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "PBSNBD_LOG";

static LIFECYCLE: LazyLock<Mutex<Lifecycle<PbsRestore>>> =
    LazyLock::new(|| Mutex::new(Lifecycle::new()));

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

// nbdkit reports the message itself through nbdkit_error.
fn to_nbd_error(errno: i32, err: impl std::fmt::Display) -> Error {
    Error::new(errno, err.to_string())
}

fn establish() -> anyhow::Result<()> {
    let library = PbsLibrary::load_default().context("loading restore library")?;
    LIFECYCLE
        .lock()
        .establish(&library)
        .context("establishing restore session")?;
    Ok(())
}

/// One client connection
struct PbsNbd {
    device: Arc<SnapshotDevice<PbsRestore>>,
    handle: Option<ImageHandle>,
}

impl PbsNbd {
    fn handle(&self) -> Result<&ImageHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| Error::new(libc::EBADF, "image handle already closed"))
    }
}

impl Drop for PbsNbd {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.device.close(handle);
        }
    }
}

impl Server for PbsNbd {
    fn name() -> &'static str {
        "pbsnbd"
    }

    fn thread_model() -> Result<ThreadModel> {
        Ok(ThreadModel::Parallel)
    }

    fn config(key: &str, value: &str) -> Result<()> {
        init_logging();
        LIFECYCLE
            .lock()
            .configure(key, value)
            .map_err(|e| to_nbd_error(libc::EINVAL, e))
    }

    fn config_complete() -> Result<()> {
        init_logging();
        let mut lifecycle = LIFECYCLE.lock();
        let config = lifecycle
            .complete()
            .map_err(|e| to_nbd_error(libc::EINVAL, e))?;
        tracing::debug!(?config, "configuration complete");
        Ok(())
    }

    fn config_help() -> Option<&'static str> {
        Some(CONFIG_HELP)
    }

    fn after_fork() -> Result<()> {
        init_logging();
        establish().map_err(|e| to_nbd_error(libc::EIO, format!("{e:#}")))
    }

    fn unload() {
        if let Some(device) = LIFECYCLE.lock().release() {
            tracing::debug!(snapshot = %device.session().snapshot(), "unloading");
        }
    }

    fn open(_readonly: bool) -> Result<Box<dyn Server>> {
        let device = LIFECYCLE
            .lock()
            .serve()
            .map_err(|e| to_nbd_error(libc::EIO, e))?;
        let handle = device.open().map_err(|e| to_nbd_error(libc::ENOENT, e))?;
        Ok(Box::new(PbsNbd {
            device,
            handle: Some(handle),
        }))
    }

    fn get_size(&self) -> Result<i64> {
        let size = self
            .device
            .size(self.handle()?)
            .map_err(|e| to_nbd_error(libc::EIO, e))?;
        i64::try_from(size).map_err(|_| Error::new(libc::EOVERFLOW, "image size exceeds i64"))
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        self.device
            .read_into(self.handle()?, buf, offset)
            .map_err(|e| to_nbd_error(libc::EIO, e))
    }
}

plugin!(PbsNbd {
    thread_model,
    config,
    config_complete,
    config_help,
    after_fork,
    unload
});
