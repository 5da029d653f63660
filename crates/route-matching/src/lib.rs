//! # Route Matching
//!
//! Decides which trips can carry a rider from pickup to dropoff, based on how
//! close both points are to each trip's route and whether the trip travels
//! from the pickup towards the dropoff.

mod cache;
mod config;
mod matcher;
mod types;

pub use self::cache::RouteCache;
pub use self::config::*;
pub use self::matcher::*;
pub use self::types::*;
