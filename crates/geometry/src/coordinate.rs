use geo::{Coord, Point};
use realtime::{Error, Result, invalid_request, malformed_polyline};
use serde::{Deserialize, Serialize};

use crate::distance_meters;

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the valid lat/lon ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when latitude is outside [-90, 90] or
    /// longitude is outside [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let coord = Self { latitude, longitude };
        if !coord.is_valid() {
            return Err(invalid_request!("coordinate ({latitude}, {longitude}) is out of range"));
        }
        Ok(coord)
    }

    /// Whether latitude and longitude are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self { latitude, longitude }
    }
}

// geo types are x = longitude, y = latitude
impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Self { x: c.longitude, y: c.latitude }
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        Self::new(c.longitude, c.latitude)
    }
}

impl From<Coord<f64>> for Coordinate {
    fn from(c: Coord<f64>) -> Self {
        Self { latitude: c.y, longitude: c.x }
    }
}

/// An ordered sequence of at least two coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    points: Vec<Coordinate>,
}

impl Route {
    /// Build a route from its vertices.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPolyline` when fewer than two points are supplied or
    /// any point is out of range.
    pub fn new(points: Vec<Coordinate>) -> Result<Self> {
        if points.len() < 2 {
            return Err(malformed_polyline!("route needs at least 2 points, got {}", points.len()));
        }
        if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
            return Err(Error::MalformedPolyline(format!(
                "route point ({}, {}) is out of range",
                bad.latitude, bad.longitude
            )));
        }
        Ok(Self { points })
    }

    #[must_use]
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a route has at least two points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn start(&self) -> Coordinate {
        self.points[0]
    }

    #[must_use]
    pub fn end(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    /// Consecutive vertex pairs, in route order.
    pub fn segments(&self) -> impl Iterator<Item = (Coordinate, Coordinate)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Total length along the route in meters.
    #[must_use]
    pub fn length_meters(&self) -> f64 {
        self.segments().map(|(a, b)| distance_meters(a, b)).sum()
    }
}

impl TryFrom<Vec<(f64, f64)>> for Route {
    type Error = Error;

    fn try_from(points: Vec<(f64, f64)>) -> Result<Self> {
        Self::new(points.into_iter().map(Coordinate::from).collect())
    }
}
