use std::sync::Arc;

use geometry::{Route, decode_polyline};
use realtime::{Result, invalid_request};
use tracing::{debug, warn};

use crate::{MatchResult, MatchingConfig, RiderRequest, RouteCache, RouteGeometry, TripCandidate};

/// Matches rider requests against candidate trips.
///
/// The matcher performs no I/O: candidates are supplied already loaded.
#[derive(Debug, Clone, Default)]
pub struct RouteMatcher {
    config: MatchingConfig,
    cache: Option<RouteCache>,
}

impl RouteMatcher {
    #[must_use]
    pub const fn new(config: MatchingConfig) -> Self {
        Self { config, cache: None }
    }

    /// Reuse decoded routes across calls.
    #[must_use]
    pub fn with_cache(mut self, cache: RouteCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &MatchingConfig {
        &self.config
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&RouteCache> {
        self.cache.as_ref()
    }

    /// Find every candidate trip that serves the rider's journey.
    ///
    /// A trip matches when it is accepting requests, has enough seats, passes
    /// within the search radius of both pickup and dropoff, and reaches the
    /// dropoff after the pickup. Results are ordered by pickup distance, then
    /// trip id.
    ///
    /// A candidate whose route cannot be decoded is skipped and logged; it
    /// does not fail the batch.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the search radius is not positive, no seats
    /// are requested, or a coordinate is out of range.
    pub fn match_trips(
        &self, request: &RiderRequest, candidates: &[TripCandidate],
    ) -> Result<Vec<MatchResult>> {
        let radius = self.validate(request)?;

        let mut matches: Vec<MatchResult> = candidates
            .iter()
            .filter_map(|candidate| self.evaluate(request, radius, candidate))
            .collect();

        matches.sort_by(|a, b| {
            a.pickup_distance_meters
                .total_cmp(&b.pickup_distance_meters)
                .then_with(|| a.trip_id.cmp(&b.trip_id))
        });

        debug!(candidates = candidates.len(), matches = matches.len(), "route matching complete");
        Ok(matches)
    }

    /// Minutes to cover `distance_meters` at the configured approach speed.
    #[must_use]
    pub fn estimated_arrival_minutes(&self, distance_meters: f64) -> f64 {
        let speed = self.config.meters_per_minute();
        if speed <= 0.0 {
            return 0.0;
        }
        distance_meters / speed
    }

    fn validate(&self, request: &RiderRequest) -> Result<f64> {
        let radius = request.radius_meters.unwrap_or(self.config.default_radius_meters);
        if !radius.is_finite() || radius <= 0.0 {
            return Err(invalid_request!("search radius must be positive, got {radius}"));
        }
        if request.seats == 0 {
            return Err(invalid_request!("at least one seat must be requested"));
        }
        if !request.pickup.is_valid() {
            return Err(invalid_request!("pickup {:?} is out of range", request.pickup));
        }
        if !request.dropoff.is_valid() {
            return Err(invalid_request!("dropoff {:?} is out of range", request.dropoff));
        }
        Ok(radius)
    }

    fn evaluate(
        &self, request: &RiderRequest, radius: f64, candidate: &TripCandidate,
    ) -> Option<MatchResult> {
        let trip_id = candidate.trip_id;

        if !candidate.accepting_requests || candidate.available_seats < request.seats {
            return None;
        }

        let route = match self.route(candidate) {
            Ok(route) => route,
            Err(e) => {
                warn!(
                    monotonic_counter.malformed_routes = 1,
                    trip_id = %trip_id,
                    error = %e,
                    "skipping trip with unusable route"
                );
                return None;
            }
        };

        let pickup = route.project(request.pickup);
        if pickup.distance_meters > radius {
            return None;
        }

        let dropoff = route.project(request.dropoff);
        if dropoff.distance_meters > radius {
            return None;
        }

        // the trip must reach the dropoff after the pickup
        if dropoff.cumulative_meters <= pickup.cumulative_meters {
            debug!(trip_id = %trip_id, "dropoff precedes pickup along route");
            return None;
        }

        Some(MatchResult {
            trip_id,
            pickup_point: pickup.point,
            dropoff_point: dropoff.point,
            pickup_distance_meters: pickup.distance_meters,
            dropoff_distance_meters: dropoff.distance_meters,
            along_route_meters: dropoff.cumulative_meters - pickup.cumulative_meters,
            available_seats: candidate.available_seats,
            estimated_arrival_minutes: self.estimated_arrival_minutes(pickup.distance_meters),
        })
    }

    fn route(&self, candidate: &TripCandidate) -> Result<Arc<Route>> {
        match (&candidate.route, &self.cache) {
            (RouteGeometry::Decoded(route), _) => Ok(Arc::clone(route)),
            (RouteGeometry::Encoded(polyline), Some(cache)) => {
                cache.get_or_decode(candidate.trip_id, polyline)
            }
            (RouteGeometry::Encoded(polyline), None) => decode_polyline(polyline).map(Arc::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_estimate_is_monotonic() {
        let matcher = RouteMatcher::default();
        assert!(matcher.estimated_arrival_minutes(0.0).abs() < f64::EPSILON);
        // 500m at 30km/h
        assert!((matcher.estimated_arrival_minutes(500.0) - 1.0).abs() < 1e-9);
        assert!(matcher.estimated_arrival_minutes(501.0) > matcher.estimated_arrival_minutes(500.0));
    }

    #[test]
    fn zero_speed_estimates_nothing() {
        let matcher =
            RouteMatcher::new(MatchingConfig { average_speed_kmh: 0.0, ..MatchingConfig::default() });
        assert!(matcher.estimated_arrival_minutes(1_000.0).abs() < f64::EPSILON);
    }
}
