use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use realtime::{ConnectionId, TripId};

/// Tracks which connections are subscribed to which trips.
///
/// Both directions of the mapping live behind a single lock so they are
/// always mutual inverses. Critical sections never await.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<Subscriptions>,
}

#[derive(Debug, Default)]
struct Subscriptions {
    by_trip: HashMap<TripId, HashSet<ConnectionId>>,
    by_connection: HashMap<ConnectionId, HashSet<TripId>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a trip. Returns `false` when it was already
    /// subscribed.
    pub fn subscribe(&self, trip_id: TripId, connection_id: ConnectionId) -> bool {
        let mut subs = self.inner.write();
        let added = subs.by_trip.entry(trip_id).or_default().insert(connection_id);
        subs.by_connection.entry(connection_id).or_default().insert(trip_id);
        added
    }

    /// Unsubscribe a connection from a trip. Returns `false` when it was not
    /// subscribed.
    pub fn unsubscribe(&self, trip_id: TripId, connection_id: ConnectionId) -> bool {
        let mut subs = self.inner.write();
        let removed = detach(&mut subs.by_trip, trip_id, &connection_id);
        detach(&mut subs.by_connection, connection_id, &trip_id);
        removed
    }

    /// Remove every subscription held by a connection, returning the trips it
    /// was subscribed to.
    pub fn remove_connection(&self, connection_id: ConnectionId) -> HashSet<TripId> {
        let mut subs = self.inner.write();
        let trips = subs.by_connection.remove(&connection_id).unwrap_or_default();
        for trip_id in &trips {
            detach(&mut subs.by_trip, *trip_id, &connection_id);
        }
        trips
    }

    /// Drop all routing for a trip, returning the connections that were
    /// subscribed to it.
    pub fn remove_trip(&self, trip_id: TripId) -> HashSet<ConnectionId> {
        let mut subs = self.inner.write();
        let connections = subs.by_trip.remove(&trip_id).unwrap_or_default();
        for connection_id in &connections {
            detach(&mut subs.by_connection, *connection_id, &trip_id);
        }
        connections
    }

    /// Snapshot of the connections subscribed to a trip at call time.
    #[must_use]
    pub fn subscribers_of(&self, trip_id: TripId) -> HashSet<ConnectionId> {
        self.inner.read().by_trip.get(&trip_id).cloned().unwrap_or_default()
    }

    /// Snapshot of the trips a connection is subscribed to.
    #[must_use]
    pub fn trips_of(&self, connection_id: ConnectionId) -> HashSet<TripId> {
        self.inner.read().by_connection.get(&connection_id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_subscribed(&self, trip_id: TripId, connection_id: ConnectionId) -> bool {
        self.inner.read().by_trip.get(&trip_id).is_some_and(|conns| conns.contains(&connection_id))
    }

    /// Number of trips with at least one subscriber.
    #[must_use]
    pub fn trip_count(&self) -> usize {
        self.inner.read().by_trip.len()
    }

    /// Number of connections holding at least one subscription.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.read().by_connection.len()
    }
}

// remove `value` from the set under `key`, dropping the set once empty
fn detach<K, V>(map: &mut HashMap<K, HashSet<V>>, key: K, value: &V) -> bool
where
    K: Eq + std::hash::Hash,
    V: Eq + std::hash::Hash,
{
    let Some(set) = map.get_mut(&key) else {
        return false;
    };
    let removed = set.remove(value);
    if set.is_empty() {
        map.remove(&key);
    }
    removed
}
