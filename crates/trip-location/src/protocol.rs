//! JSON messages exchanged with connected clients.
//!
//! Every message is an object with a `type` tag and a `data` payload.

use chrono::{DateTime, Utc};
use realtime::TripId;
use serde::{Deserialize, Serialize};

use crate::LocationReport;

/// Status carried by acknowledgements.
pub const STATUS_SUCCESS: &str = "success";

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Start receiving a trip's location updates. With `catch_up`, the trip's
    /// last known location is pushed straight away.
    #[serde(alias = "SUBSCRIBE_TO_TRIP_LOCATION")]
    Subscribe {
        trip_id: TripId,
        #[serde(default)]
        catch_up: bool,
    },

    #[serde(alias = "UNSUBSCRIBE_FROM_TRIP_LOCATION")]
    Unsubscribe { trip_id: TripId },

    /// Report the vehicle position for a trip. A missing timestamp is stamped
    /// on receipt.
    PublishLocation {
        trip_id: TripId,
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

/// Messages pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    #[serde(alias = "TRIP_LOCATION_UPDATE")]
    LocationUpdate(LocationReport),
    Subscribed(Ack),
    Unsubscribed(Ack),
    LocationPublished(Ack),
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }
}

/// Acknowledges a client request for a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub trip_id: TripId,
    pub status: String,
}

impl Ack {
    #[must_use]
    pub fn success(trip_id: TripId) -> Self {
        Self { trip_id, status: STATUS_SUCCESS.to_string() }
    }
}
