use dashmap::DashMap;
use realtime::ConnectionId;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::ServerMessage;

/// Outbound messages buffered per connection before pushes are dropped.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Outbound channels of the live connections in this process.
///
/// Pushes never wait: a connection that is closed or not keeping up misses
/// the message.
#[derive(Debug, Default)]
pub struct ConnectionHub {
    outbound: DashMap<ConnectionId, Sender<ServerMessage>>,
}

impl ConnectionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the receiving end of its outbound
    /// channel. Registering an id again replaces the previous channel.
    pub fn register(&self, connection_id: ConnectionId) -> Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.outbound.insert(connection_id, tx);
        rx
    }

    pub fn deregister(&self, connection_id: ConnectionId) -> bool {
        self.outbound.remove(&connection_id).is_some()
    }

    /// Queue a message for a connection. Returns `false` when the message was
    /// not queued.
    pub fn push(&self, connection_id: ConnectionId, message: ServerMessage) -> bool {
        let Some(tx) = self.outbound.get(&connection_id).map(|entry| entry.value().clone()) else {
            debug!(connection_id = %connection_id, "push to unknown connection");
            return false;
        };

        match tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    monotonic_counter.dropped_pushes = 1,
                    connection_id = %connection_id,
                    "outbound buffer full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(connection_id = %connection_id, "connection closed");
                self.outbound.remove_if(&connection_id, |_, current| current.same_channel(&tx));
                false
            }
        }
    }

    #[must_use]
    pub fn is_connected(&self, connection_id: ConnectionId) -> bool {
        self.outbound.contains_key(&connection_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outbound.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }
}
