//! Serving context
//!
//! Bundles the configuration, the session and the handle registry into
//! the one object every connection works through. Created once, after
//! the session is established, and shared behind an `Arc`.

use super::block_adapter::BlockAdapter;
use super::error::{ConnectError, OpenError, ReadError};
use super::image_registry::ImageRegistry;
use super::session::Session;
use crate::domain::entities::{Configuration, ImageHandle};
use crate::domain::repositories::{RestoreClient, RestoreConnector};
use bytes::Bytes;

/// The exported snapshot image
pub struct SnapshotDevice<C: RestoreClient> {
    config: Configuration,
    session: Session<C>,
    registry: ImageRegistry,
}

impl<C: RestoreClient> SnapshotDevice<C> {
    /// Connects to the repository named in `config`
    pub fn connect<K>(config: Configuration, connector: &K) -> Result<Self, ConnectError>
    where
        K: RestoreConnector<Client = C>,
    {
        let session = Session::connect(&config, connector)?;
        Ok(Self::from_session(config, session))
    }

    /// Wraps an already established session
    pub fn from_session(config: Configuration, session: Session<C>) -> Self {
        Self {
            config,
            session,
            registry: ImageRegistry::new(),
        }
    }

    /// Opens the configured image for one client connection
    pub fn open(&self) -> Result<ImageHandle, OpenError> {
        self.registry.open_image(&self.session, &self.config.image)
    }

    /// Releases a client's handle
    pub fn close(&self, handle: ImageHandle) {
        self.registry.close_image(handle);
    }

    /// Image length in bytes
    pub fn size(&self, handle: &ImageHandle) -> Result<u64, ReadError> {
        self.adapter().size(handle)
    }

    /// Reads exactly `length` bytes at `offset`
    pub fn read(
        &self,
        handle: &ImageHandle,
        offset: u64,
        length: u32,
    ) -> Result<Bytes, ReadError> {
        self.adapter().read(handle, offset, length)
    }

    /// Fills `buf` from `offset`
    pub fn read_into(
        &self,
        handle: &ImageHandle,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<(), ReadError> {
        self.adapter().read_into(handle, buf, offset)
    }

    /// Returns a block adapter over this device's session
    pub fn adapter(&self) -> BlockAdapter<'_, C> {
        BlockAdapter::new(&self.session, &self.registry)
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    pub fn registry(&self) -> &ImageRegistry {
        &self.registry
    }
}
