//! Application layer
//!
//! Configuration, session establishment, handle bookkeeping and the block
//! device contract, in the order the process goes through them.

mod block_adapter;
mod config_validator;
mod device;
mod error;
mod image_registry;
mod lifecycle;
mod session;

pub use block_adapter::{BlockAdapter, Fetch, FetchPlan};
pub use config_validator::{CONFIG_HELP, ConfigBuilder, ConfigKey};
pub use device::SnapshotDevice;
pub use error::{ConfigError, ConnectError, LifecycleError, OpenError, ReadError};
pub use image_registry::{ImageEntry, ImageRegistry};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use session::Session;
