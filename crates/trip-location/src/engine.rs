use dashmap::{DashMap, DashSet};
use realtime::{Broker, ConnectionId, Message, Result, TripId, bad_gateway, unknown_trip};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

use crate::{
    ConnectionHub, KeyLocker, LocationReport, ServerMessage, SubscriptionRegistry, TripState,
};

/// Topic location reports are published to.
pub const DEFAULT_LOCATION_TOPIC: &str = "trip-location-updates";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Broker topic for location reports.
    pub topic: String,

    /// Deliver straight to local subscribers when the broker rejects a report.
    pub fallback_direct: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { topic: DEFAULT_LOCATION_TOPIC.to_string(), fallback_direct: true }
    }
}

/// Records and distributes live trip locations.
///
/// Reports enter through [`LocationEngine::publish`], which keeps the trip's
/// last known location and hands the report to the broker keyed by trip. The
/// broker's consumer calls [`LocationEngine::on_delivered`] to fan the report
/// out to the trip's subscribers.
#[derive(Debug)]
pub struct LocationEngine<B: Broker> {
    config: EngineConfig,
    broker: B,
    registry: SubscriptionRegistry,
    hub: ConnectionHub,
    open_trips: DashSet<TripId>,
    last_known: DashMap<TripId, LocationReport>,
    // reports handed to the broker and not yet delivered, per trip
    in_flight: DashMap<TripId, usize>,
    locker: KeyLocker<TripId>,
}

impl<B: Broker> LocationEngine<B> {
    pub fn new(config: EngineConfig, broker: B) -> Self {
        Self {
            config,
            broker,
            registry: SubscriptionRegistry::new(),
            hub: ConnectionHub::new(),
            open_trips: DashSet::new(),
            last_known: DashMap::new(),
            in_flight: DashMap::new(),
            locker: KeyLocker::new(),
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Open a trip for location traffic. Opening an open trip is a no-op.
    pub fn open_trip(&self, trip_id: TripId) {
        if self.open_trips.insert(trip_id) {
            info!(trip_id = %trip_id, "trip opened");
        }
    }

    /// Retire a trip: purge its last known location and drop its subscribers.
    ///
    /// Waits for any publish in flight for the trip to finish.
    pub async fn close_trip(&self, trip_id: TripId) -> bool {
        let _guard = self.locker.lock(trip_id).await;

        let was_open = self.open_trips.remove(&trip_id).is_some();
        self.last_known.remove(&trip_id);
        self.in_flight.remove(&trip_id);
        let dropped = self.registry.remove_trip(trip_id);

        if was_open {
            info!(trip_id = %trip_id, subscribers = dropped.len(), "trip closed");
        }
        was_open
    }

    #[must_use]
    pub fn is_open(&self, trip_id: TripId) -> bool {
        self.open_trips.contains(&trip_id)
    }

    /// The trip's channel state, or `None` when the trip is not open.
    #[must_use]
    pub fn state(&self, trip_id: TripId) -> Option<TripState> {
        if !self.is_open(trip_id) {
            return None;
        }
        if self.last_known.contains_key(&trip_id) {
            Some(TripState::Active)
        } else {
            Some(TripState::Idle)
        }
    }

    #[must_use]
    pub fn last_known(&self, trip_id: TripId) -> Option<LocationReport> {
        self.last_known.get(&trip_id).map(|entry| entry.value().clone())
    }

    /// Register a live connection, returning the stream of messages to write
    /// to it.
    pub fn connect(&self, connection_id: ConnectionId) -> Receiver<ServerMessage> {
        debug!(connection_id = %connection_id, "connection registered");
        self.hub.register(connection_id)
    }

    /// Remove every subscription held by a closed connection.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let trips = self.registry.remove_connection(connection_id);
        self.hub.deregister(connection_id);
        debug!(connection_id = %connection_id, trips = trips.len(), "connection removed");
    }

    /// Queue a reply on a connection's outbound stream.
    pub fn reply(&self, connection_id: ConnectionId, message: ServerMessage) -> bool {
        self.hub.push(connection_id, message)
    }

    /// Subscribe a connection to an open trip.
    ///
    /// Serialized with `close_trip`, so a subscription never outlives the
    /// trip it was made against.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTrip` when the trip is not open.
    pub async fn subscribe(&self, trip_id: TripId, connection_id: ConnectionId) -> Result<()> {
        let _guard = self.locker.lock(trip_id).await;

        if !self.is_open(trip_id) {
            return Err(unknown_trip!("Trip {trip_id} not found"));
        }

        if self.registry.subscribe(trip_id, connection_id) {
            info!(trip_id = %trip_id, connection_id = %connection_id, "subscribed");
        }
        Ok(())
    }

    /// Push the trip's last known location to a late-joining connection once.
    ///
    /// Skipped while reports for the trip are still in the broker: the
    /// connection is already subscribed and receives them in order, ending
    /// with the last known location.
    pub async fn catch_up(&self, trip_id: TripId, connection_id: ConnectionId) -> bool {
        let _guard = self.locker.lock(trip_id).await;

        if self.in_flight.contains_key(&trip_id) {
            debug!(trip_id = %trip_id, connection_id = %connection_id, "catch-up left to queued reports");
            return false;
        }
        self.last_known(trip_id)
            .is_some_and(|report| self.hub.push(connection_id, ServerMessage::LocationUpdate(report)))
    }

    pub fn unsubscribe(&self, trip_id: TripId, connection_id: ConnectionId) -> bool {
        let removed = self.registry.unsubscribe(trip_id, connection_id);
        if removed {
            info!(trip_id = %trip_id, connection_id = %connection_id, "unsubscribed");
        }
        removed
    }

    /// Record a report as its trip's last known location and hand it to the
    /// broker.
    ///
    /// Reports for one trip reach the broker in the order `publish` was
    /// called. The latest call wins regardless of the report timestamps.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTrip` when the trip is not open, or `BadGateway` when
    /// the broker rejects the report and direct fallback is disabled.
    pub async fn publish(&self, report: LocationReport) -> Result<()> {
        let trip_id = report.trip_id;
        let _guard = self.locker.lock(trip_id).await;

        if !self.is_open(trip_id) {
            warn!(monotonic_counter.unknown_trip_reports = 1, trip_id = %trip_id, "report for unknown trip");
            return Err(unknown_trip!("Trip {trip_id} not found"));
        }

        let payload = serde_json::to_vec(&report)?;
        let message = Message::new(&self.config.topic, &payload).with_key(trip_id.key());

        self.last_known.insert(trip_id, report.clone());
        *self.in_flight.entry(trip_id).or_insert(0) += 1;

        if let Err(e) = self.broker.send(&message).await {
            warn!(
                monotonic_counter.broker_failures = 1,
                trip_id = %trip_id,
                error = %e,
                "failed to publish location"
            );
            if !self.config.fallback_direct {
                self.settle(trip_id);
                return Err(bad_gateway!("publishing location for trip {trip_id}: {e}"));
            }
            let delivered = self.on_delivered(&report);
            debug!(trip_id = %trip_id, delivered, "delivered directly");
        }

        Ok(())
    }

    /// Push a delivered report to every connection subscribed to its trip at
    /// the time of the call. Returns the number of connections it was queued
    /// for.
    pub fn on_delivered(&self, report: &LocationReport) -> usize {
        // settle before the snapshot so a catch-up that saw this report in
        // flight is covered by the fan-out
        self.settle(report.trip_id);

        let subscribers = self.registry.subscribers_of(report.trip_id);
        if subscribers.is_empty() {
            return 0;
        }

        let update = ServerMessage::LocationUpdate(report.clone());
        let delivered =
            subscribers.into_iter().filter(|conn| self.hub.push(*conn, update.clone())).count();

        debug!(trip_id = %report.trip_id, delivered, "location fanned out");
        delivered
    }

    fn settle(&self, trip_id: TripId) {
        if let Some(mut pending) = self.in_flight.get_mut(&trip_id) {
            *pending = pending.saturating_sub(1);
        }
        self.in_flight.remove_if(&trip_id, |_, pending| *pending == 0);
    }
}
