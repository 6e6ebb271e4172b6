//! Block adapter
//!
//! Serves the block device contract (size query, bounded read) on top of
//! an open image handle. A device read is split at the remote store's
//! chunk boundaries into one or more fetches; every fetch must come back
//! complete or the whole read fails.

use super::error::ReadError;
use super::image_registry::ImageRegistry;
use super::session::Session;
use crate::domain::entities::{DeviceId, ImageHandle};
use crate::domain::repositories::RestoreClient;
use bytes::{Bytes, BytesMut};
use std::ops::Range;

/// One remote fetch of a split read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    /// Image-relative offset of the fetch
    pub offset: u64,
    /// Destination range within the caller's buffer
    pub range: Range<usize>,
}

/// Iterator splitting `(offset, len)` at multiples of a chunk size
#[derive(Debug, Clone)]
pub struct FetchPlan {
    offset: u64,
    done: usize,
    len: usize,
    chunk_size: u64,
}

impl FetchPlan {
    /// Plans fetches for `len` bytes at `offset`
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn new(offset: u64, len: usize, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            offset,
            done: 0,
            len,
            chunk_size: chunk_size as u64,
        }
    }
}

impl Iterator for FetchPlan {
    type Item = Fetch;

    fn next(&mut self) -> Option<Fetch> {
        if self.done >= self.len {
            return None;
        }

        let offset = self.offset + self.done as u64;
        let to_boundary = self.chunk_size - offset % self.chunk_size;
        let remaining = (self.len - self.done) as u64;
        let take = to_boundary.min(remaining) as usize;

        let range = self.done..self.done + take;
        self.done += take;
        Some(Fetch { offset, range })
    }
}

/// Block device view over a session and its handle registry
pub struct BlockAdapter<'a, C: RestoreClient> {
    session: &'a Session<C>,
    registry: &'a ImageRegistry,
    chunk_size: usize,
}

impl<'a, C: RestoreClient> BlockAdapter<'a, C> {
    pub fn new(session: &'a Session<C>, registry: &'a ImageRegistry) -> Self {
        Self {
            session,
            registry,
            chunk_size: session.chunk_size().max(1),
        }
    }

    /// Overrides the chunk size reads are split at
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Returns the image length as reported by the remote store
    ///
    /// Not cached; every call asks the store.
    pub fn size(&self, handle: &ImageHandle) -> Result<u64, ReadError> {
        let device = self.device(handle)?;
        self.session
            .client()
            .image_length(device)
            .map_err(ReadError::Length)
    }

    /// Reads exactly `length` bytes at `offset`
    pub fn read(
        &self,
        handle: &ImageHandle,
        offset: u64,
        length: u32,
    ) -> Result<Bytes, ReadError> {
        let mut buf = BytesMut::zeroed(length as usize);
        self.read_into(handle, &mut buf, offset)?;
        Ok(buf.freeze())
    }

    /// Fills `buf` with the image bytes starting at `offset`
    ///
    /// Bounds are not checked against [`BlockAdapter::size`]; a read past
    /// the end fails in the remote store.
    pub fn read_into(
        &self,
        handle: &ImageHandle,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<(), ReadError> {
        if buf.is_empty() {
            return Ok(());
        }

        let device = self.device(handle)?;
        let requested = buf.len();
        let mut returned = 0usize;

        for fetch in FetchPlan::new(offset, requested, self.chunk_size) {
            let dst = &mut buf[fetch.range];
            let want = dst.len();
            tracing::trace!(device = %device, offset = fetch.offset, len = want, "fetch");

            let got = self
                .session
                .client()
                .read_image_at(device, fetch.offset, dst)
                .map_err(|source| {
                    tracing::error!(offset, requested, error = %source, "pread failed");
                    ReadError::Remote {
                        offset,
                        requested,
                        source,
                    }
                })?;

            returned += got.min(want);
            if got < want {
                tracing::warn!(offset, requested, returned, "short read");
                return Err(ReadError::ShortRead {
                    offset,
                    requested,
                    returned,
                });
            }
        }

        Ok(())
    }

    fn device(&self, handle: &ImageHandle) -> Result<DeviceId, ReadError> {
        self.registry
            .device(handle)
            .ok_or(ReadError::UnknownHandle(handle.id()))
    }
}
