use std::sync::Arc;

use anyhow::{Context, Result};
use realtime::Message;
use tracing::{info, warn};
use trip_location::LocationReport;

use crate::Engine;

/// Routes broker messages to their handler by topic.
#[derive(Debug, Clone)]
pub struct Messaging {
    engine: Arc<Engine>,
}

impl Messaging {
    #[must_use]
    pub const fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Process one delivered message. Unhandled topics are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload cannot be decoded.
    pub fn handle(&self, message: &Message) -> Result<()> {
        let topic = message.topic.as_str();

        match topic {
            t if t == self.engine.config().topic => self.location_update(message),
            _ => {
                warn!(monotonic_counter.unhandled_topics = 1, topic = %topic);
                Ok(())
            }
        }
    }

    fn location_update(&self, message: &Message) -> Result<()> {
        let report: LocationReport =
            serde_json::from_slice(&message.payload).context("deserializing location report")?;

        if let Some(key) = message.key()
            && key != report.trip_id.key()
        {
            warn!(key = %key, trip_id = %report.trip_id, "message key does not match trip");
        }

        let delivered = self.engine.on_delivered(&report);
        info!(monotonic_counter.locations_delivered = 1, trip_id = %report.trip_id, delivered);
        Ok(())
    }
}
