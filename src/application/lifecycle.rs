//! Process lifecycle
//!
//! `Unconfigured → Configured → SessionEstablished → Serving`. Transitions
//! only move forward; a callback arriving in the wrong state is an error
//! rather than a silent no-op.

use super::config_validator::ConfigBuilder;
use super::device::SnapshotDevice;
use super::error::LifecycleError;
use crate::domain::entities::Configuration;
use crate::domain::repositories::{RestoreClient, RestoreConnector};
use std::fmt;
use std::sync::Arc;

/// Process-level state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Unconfigured,
    Configured,
    SessionEstablished,
    Serving,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Configured => "configured",
            LifecycleState::SessionEstablished => "session-established",
            LifecycleState::Serving => "serving",
        };
        f.write_str(name)
    }
}

/// Owns everything the process accumulates between startup and serving
pub struct Lifecycle<C: RestoreClient> {
    state: LifecycleState,
    builder: ConfigBuilder,
    config: Option<Configuration>,
    device: Option<Arc<SnapshotDevice<C>>>,
}

impl<C: RestoreClient> Default for Lifecycle<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RestoreClient> Lifecycle<C> {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Unconfigured,
            builder: ConfigBuilder::new(),
            config: None,
            device: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the validated configuration once available
    pub fn config(&self) -> Option<&Configuration> {
        self.config.as_ref()
    }

    /// Records one `key=value` parameter
    pub fn configure(&mut self, key: &str, value: &str) -> Result<(), LifecycleError> {
        self.expect("config", LifecycleState::Unconfigured)?;
        self.builder.set(key, value)?;
        Ok(())
    }

    /// Validates the collected parameters
    pub fn complete(&mut self) -> Result<&Configuration, LifecycleError> {
        self.expect("config_complete", LifecycleState::Unconfigured)?;
        let config = self.builder.complete()?;
        self.builder = ConfigBuilder::new();
        self.state = LifecycleState::Configured;
        Ok(self.config.insert(config))
    }

    /// Connects the one session of this process
    pub fn establish<K>(
        &mut self,
        connector: &K,
    ) -> Result<Arc<SnapshotDevice<C>>, LifecycleError>
    where
        K: RestoreConnector<Client = C>,
    {
        self.expect("connect", LifecycleState::Configured)?;
        let config = self.config.clone().ok_or(LifecycleError::InvalidState {
            operation: "connect",
            state: self.state,
        })?;

        let device = Arc::new(SnapshotDevice::connect(config, connector)?);
        self.device = Some(Arc::clone(&device));
        self.state = LifecycleState::SessionEstablished;
        Ok(device)
    }

    /// Hands out the device to a connection, entering `Serving`
    pub fn serve(&mut self) -> Result<Arc<SnapshotDevice<C>>, LifecycleError> {
        match (&self.device, self.state) {
            (Some(device), LifecycleState::SessionEstablished | LifecycleState::Serving) => {
                let device = Arc::clone(device);
                self.state = LifecycleState::Serving;
                Ok(device)
            }
            _ => Err(LifecycleError::InvalidState {
                operation: "open",
                state: self.state,
            }),
        }
    }

    /// Gives up the process's reference to the device
    ///
    /// The session is torn down once the last connection holding the
    /// device has gone. The state does not change.
    pub fn release(&mut self) -> Option<Arc<SnapshotDevice<C>>> {
        self.device.take()
    }

    fn expect(
        &self,
        operation: &'static str,
        state: LifecycleState,
    ) -> Result<(), LifecycleError> {
        if self.state == state {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}
