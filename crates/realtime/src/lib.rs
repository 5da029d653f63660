//! # Realtime Core
//!
//! Core modules shared by the matching and location services: the error
//! taxonomy, trip and connection identifiers, and the broker port.

mod error;
mod ids;
mod provider;

pub use crate::error::*;
pub use crate::ids::*;
pub use crate::provider::*;
