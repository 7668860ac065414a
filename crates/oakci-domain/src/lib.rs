//! Domain layer for the OAK Codebase Intelligence daemon.
//!
//! Holds the entities persisted by the activity store, the value objects
//! shared across layers (ids, configuration, index status), the error type,
//! and the ports implemented by the provider and application layers.
//! No I/O happens here.

pub mod constants;
pub mod entities;
pub mod error;
pub mod ports;
pub mod utils;
pub mod value_objects;

pub use error::{Error, Result};
