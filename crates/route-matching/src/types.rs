use std::sync::Arc;

use geometry::{Coordinate, Route};
use realtime::TripId;
use serde::{Deserialize, Serialize};

/// A rider's journey request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderRequest {
    pub pickup: Coordinate,
    pub dropoff: Coordinate,

    #[serde(default = "default_seats")]
    pub seats: u32,

    /// Search radius; the matcher's configured default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_meters: Option<f64>,
}

const fn default_seats() -> u32 {
    1
}

impl RiderRequest {
    /// A request for one seat using the default search radius.
    #[must_use]
    pub const fn new(pickup: Coordinate, dropoff: Coordinate) -> Self {
        Self { pickup, dropoff, seats: default_seats(), radius_meters: None }
    }

    #[must_use]
    pub const fn seats(mut self, seats: u32) -> Self {
        self.seats = seats;
        self
    }

    #[must_use]
    pub const fn radius(mut self, meters: f64) -> Self {
        self.radius_meters = Some(meters);
        self
    }
}

/// Route geometry as supplied by the trip store.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteGeometry {
    Decoded(Arc<Route>),
    Encoded(String),
}

impl From<Route> for RouteGeometry {
    fn from(route: Route) -> Self {
        Self::Decoded(Arc::new(route))
    }
}

impl From<String> for RouteGeometry {
    fn from(polyline: String) -> Self {
        Self::Encoded(polyline)
    }
}

impl From<&str> for RouteGeometry {
    fn from(polyline: &str) -> Self {
        Self::Encoded(polyline.to_string())
    }
}

/// A trip that may be able to carry the rider.
#[derive(Debug, Clone, PartialEq)]
pub struct TripCandidate {
    pub trip_id: TripId,
    pub route: RouteGeometry,
    pub available_seats: u32,
    pub accepting_requests: bool,
}

impl TripCandidate {
    /// A candidate that is accepting requests.
    pub fn new(
        trip_id: impl Into<TripId>, route: impl Into<RouteGeometry>, available_seats: u32,
    ) -> Self {
        Self {
            trip_id: trip_id.into(),
            route: route.into(),
            available_seats,
            accepting_requests: true,
        }
    }

    #[must_use]
    pub const fn accepting(mut self, accepting: bool) -> Self {
        self.accepting_requests = accepting;
        self
    }
}

/// A trip that serves the rider's journey.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub trip_id: TripId,
    pub pickup_point: Coordinate,
    pub dropoff_point: Coordinate,
    pub pickup_distance_meters: f64,
    pub dropoff_distance_meters: f64,

    /// Distance along the route between the pickup and dropoff points.
    pub along_route_meters: f64,
    pub available_seats: u32,
    pub estimated_arrival_minutes: f64,
}
