//! Repository traits (interfaces)
//!
//! Contracts for the remote backup repository. Concrete bindings live in
//! the infrastructure layer.

mod restore_client;

pub use restore_client::{
    DEFAULT_CHUNK_SIZE, RemoteError, RestoreClient, RestoreConnector, SessionParams,
};
