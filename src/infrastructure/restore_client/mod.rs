//! Restore client implementations

mod in_memory;
mod pbs_library;

pub use in_memory::{InMemoryClient, InMemoryRepository};
pub use pbs_library::{
    DEFAULT_LIBRARY, LIBRARY_ENV, LibraryError, PbsLibrary, PbsRestore, ProxmoxRestoreHandle,
};
