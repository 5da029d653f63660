use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use geometry::{Route, decode_polyline};
use realtime::{Result, TripId};

/// Decoded routes keyed by trip, so a trip's polyline is decoded once rather
/// than on every matching call.
///
/// Entries remember the hash of the polyline they were decoded from; a trip
/// whose stored polyline changes is decoded again and replaced.
#[derive(Debug, Clone, Default)]
pub struct RouteCache {
    routes: Arc<DashMap<TripId, Cached>>,
}

#[derive(Debug)]
struct Cached {
    polyline_hash: u64,
    route: Arc<Route>,
}

impl RouteCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached route for `trip_id`, decoding `polyline` on a miss or
    /// when it differs from the one cached.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPolyline` when the polyline cannot be decoded. Failed
    /// decodes are not cached.
    pub fn get_or_decode(&self, trip_id: TripId, polyline: &str) -> Result<Arc<Route>> {
        let polyline_hash = hash(polyline);

        if let Some(cached) = self.routes.get(&trip_id)
            && cached.polyline_hash == polyline_hash
        {
            return Ok(Arc::clone(&cached.route));
        }

        let route = Arc::new(decode_polyline(polyline)?);
        self.routes.insert(trip_id, Cached { polyline_hash, route: Arc::clone(&route) });
        tracing::debug!(trip_id = %trip_id, points = route.len(), "cached decoded route");

        Ok(route)
    }

    /// Drop the cached route for a trip that was updated or retired.
    pub fn invalidate(&self, trip_id: TripId) {
        self.routes.remove(&trip_id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn hash(polyline: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    polyline.hash(&mut hasher);
    hasher.finish()
}
