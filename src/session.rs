use std::sync::Arc;

use chrono::Utc;
use geometry::Coordinate;
use realtime::{ConnectionId, Error, TripId};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, warn};
use trip_location::{Ack, ClientMessage, LocationReport, ServerMessage};

use crate::Engine;

/// One client connection's view of the location engine.
///
/// Replies and pushed updates are queued on the connection's outbound stream.
/// Dropping the session removes its subscriptions.
#[derive(Debug)]
pub struct Session {
    connection_id: ConnectionId,
    engine: Arc<Engine>,
}

impl Session {
    /// Register a new connection, returning the session and the stream of
    /// messages to write to the client.
    #[must_use]
    pub fn open(engine: Arc<Engine>) -> (Self, Receiver<ServerMessage>) {
        let connection_id = ConnectionId::new();
        let outbound = engine.connect(connection_id);
        (Self { connection_id, engine }, outbound)
    }

    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Handle a raw text frame from the client.
    pub async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                debug!(connection_id = %self.connection_id, error = %e, "unreadable client message");
                self.reply(ServerMessage::error(format!("Invalid message: {e}")));
            }
        }
    }

    /// Handle a decoded client message.
    pub async fn handle(&self, message: ClientMessage) {
        match message {
            ClientMessage::Subscribe { trip_id, catch_up } => {
                self.subscribe(trip_id, catch_up).await;
            }
            ClientMessage::Unsubscribe { trip_id } => {
                self.engine.unsubscribe(trip_id, self.connection_id);
                self.reply(ServerMessage::Unsubscribed(Ack::success(trip_id)));
            }
            ClientMessage::PublishLocation { trip_id, latitude, longitude, timestamp } => {
                let reply =
                    self.publish(trip_id, Coordinate { latitude, longitude }, timestamp).await;
                self.reply(reply);
            }
        }
    }

    async fn subscribe(&self, trip_id: TripId, catch_up: bool) {
        if let Err(e) = self.engine.subscribe(trip_id, self.connection_id).await {
            self.reply(error_reply(&e));
            return;
        }
        // ack precedes the catch-up update
        self.reply(ServerMessage::Subscribed(Ack::success(trip_id)));
        if catch_up {
            self.engine.catch_up(trip_id, self.connection_id).await;
        }
    }

    async fn publish(
        &self, trip_id: TripId, position: Coordinate, timestamp: Option<chrono::DateTime<Utc>>,
    ) -> ServerMessage {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let report =
            match LocationReport::new(trip_id, position, timestamp, self.connection_id.to_string()) {
                Ok(report) => report,
                Err(e) => return error_reply(&e),
            };

        match self.engine.publish(report).await {
            Ok(()) => ServerMessage::LocationPublished(Ack::success(trip_id)),
            Err(e) => error_reply(&e),
        }
    }

    fn reply(&self, message: ServerMessage) {
        if !self.engine.reply(self.connection_id, message) {
            debug!(connection_id = %self.connection_id, "reply not queued");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.engine.disconnect(self.connection_id);
    }
}

fn error_reply(err: &Error) -> ServerMessage {
    warn!(code = err.code(), error = %err, "client request failed");
    match err {
        Error::UnknownTrip(message) | Error::InvalidRequest(message) => {
            ServerMessage::error(message.clone())
        }
        Error::BadGateway(_) => ServerMessage::error("Failed to publish location update"),
        _ => ServerMessage::error(err.description()),
    }
}
