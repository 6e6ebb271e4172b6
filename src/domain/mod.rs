//! Domain layer
//!
//! Value objects of the snapshot/image model and the traits the remote
//! repository is reached through. No I/O happens here.

pub mod entities;
pub mod repositories;
