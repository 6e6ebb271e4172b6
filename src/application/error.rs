//! Application error taxonomy
//!
//! One enum per stage of the device's life. Every variant that originates
//! in the remote store keeps the store's message.

use super::lifecycle::LifecycleState;
use crate::domain::entities::HandleId;
use crate::domain::repositories::RemoteError;
use thiserror::Error;

/// Errors raised while collecting and validating parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("parameter '{0}' must not be empty")]
    EmptyParameter(&'static str),

    #[error(
        "you must supply the {0}=<{upper}> parameter after the plugin name on the command line",
        upper = .0.to_uppercase()
    )]
    MissingParameter(&'static str),

    #[error("unable to convert timestamp '{0}', expected YYYY-MM-DDTHH:MM:SSZ")]
    InvalidTimestamp(String),
}

/// Errors raised while establishing the session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("unable to derive snapshot id: {0}")]
    SnapshotId(#[source] RemoteError),

    #[error("unable to connect to {repository}: {source}")]
    Connect {
        repository: String,
        #[source]
        source: RemoteError,
    },
}

/// Failure to open an image within the session's snapshot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unable to open image '{archive}': {source}")]
pub struct OpenError {
    pub archive: String,
    #[source]
    pub source: RemoteError,
}

/// Errors raised while serving a size query or a read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("image handle {0} is not open")]
    UnknownHandle(HandleId),

    #[error("read of {requested} bytes at offset {offset} failed: {source}")]
    Remote {
        offset: u64,
        requested: usize,
        #[source]
        source: RemoteError,
    },

    #[error("short read at offset {offset}: got {returned} of {requested} bytes")]
    ShortRead {
        offset: u64,
        requested: usize,
        returned: usize,
    },

    #[error("unable to query image length: {0}")]
    Length(#[source] RemoteError),
}

impl ReadError {
    /// Bytes obtained before the failure, or `-1` if the fetch failed outright
    pub fn bytes_returned(&self) -> i64 {
        match self {
            ReadError::ShortRead { returned, .. } => *returned as i64,
            _ => -1,
        }
    }
}

/// Errors raised while driving the process through its states
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}
