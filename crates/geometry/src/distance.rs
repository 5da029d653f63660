use geo::{Distance, Haversine, Point};

use crate::Coordinate;

/// Great-circle (haversine) distance between two coordinates in meters, on
/// geo's mean Earth radius.
#[must_use]
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    Haversine::distance(Point::from(a), Point::from(b))
}
