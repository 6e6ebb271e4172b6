//! Infrastructure layer
//!
//! Concrete implementations of the domain repositories. This layer holds
//! the FFI binding to the restore library and the in-process stand-in.

pub mod restore_client;
