//! # Geometry
//!
//! Route geometry for trip matching: decoding encoded polylines, haversine
//! distances and projecting a point onto a route.

mod coordinate;
mod distance;
mod polyline;
mod projection;

pub use self::coordinate::*;
pub use self::distance::*;
pub use self::polyline::*;
pub use self::projection::*;
