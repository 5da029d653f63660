use chrono::{DateTime, Utc};
use geometry::Coordinate;
use realtime::{Result, TripId, invalid_request};
use serde::{Deserialize, Serialize};

/// A vehicle position reported for a trip.
///
/// The timestamp is carried for consumers but never used to reorder reports:
/// the latest report to arrive replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub trip_id: TripId,

    #[serde(flatten)]
    pub position: Coordinate,

    pub timestamp: DateTime<Utc>,

    /// Identifies the publisher that produced the report.
    #[serde(default)]
    pub source: String,
}

impl LocationReport {
    /// Build a report, rejecting out-of-range coordinates.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the position is not a valid coordinate.
    pub fn new(
        trip_id: TripId, position: Coordinate, timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Result<Self> {
        if !position.is_valid() {
            return Err(invalid_request!(
                "trip {trip_id}: position ({}, {}) is out of range",
                position.latitude,
                position.longitude
            ));
        }
        Ok(Self { trip_id, position, timestamp, source: source.into() })
    }
}

/// Lifecycle of an open trip's location channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripState {
    /// No report received yet.
    Idle,

    /// A last known location is held.
    Active,
}
