//! Image identity
//!
//! Images inside a snapshot are stored as fixed-index archives. The remote
//! store hands out a small device id for every archive it opens.

use std::fmt;

/// Suffix of the fixed index file backing a block image
pub const FIXED_INDEX_SUFFIX: &str = ".fidx";

/// Returns the archive name the remote store knows an image by
pub fn archive_name(image: &str) -> String {
    format!("{image}{FIXED_INDEX_SUFFIX}")
}

/// Opaque id of an image opened by the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u8);

impl DeviceId {
    pub fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw id passed back to the remote store
    pub fn raw(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// Local id of one open image handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A client's claim on one open image
///
/// Handles are neither `Clone` nor `Copy`: closing one consumes it, so no
/// read can be issued against a handle after it was closed.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    id: HandleId,
}

impl ImageHandle {
    pub(crate) fn new(id: HandleId) -> Self {
        Self { id }
    }

    /// Returns the registry id of this handle
    pub fn id(&self) -> HandleId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_name_appends_suffix() {
        assert_eq!(archive_name("disk-0"), "disk-0.fidx");
        assert_eq!(archive_name("drive-scsi0.img"), "drive-scsi0.img.fidx");
    }
}
