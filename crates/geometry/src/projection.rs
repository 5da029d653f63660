//! Nearest point on a route.
//!
//! Each segment is treated as a straight `geo::Line` in a local
//! equirectangular frame anchored at the segment start, which is accurate to
//! well under a meter for road-scale segments. Distances reported back are
//! haversine distances.
//! Segments crossing the antimeridian are not handled.

use geo::{Closest, ClosestPoint, Coord, Line, Point};
use serde::Serialize;

use crate::{Coordinate, Route, distance_meters};

/// A point within this distance of a route is considered to lie on it.
pub const ON_ROUTE_TOLERANCE_METERS: f64 = 0.01;

/// A later segment must beat the current best by more than this to win, so
/// equal distances resolve to the earliest segment.
pub const TIE_TOLERANCE_METERS: f64 = 1e-6;

/// The result of projecting a point onto a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    /// Closest point on the route.
    pub point: Coordinate,

    /// Index of the segment (`points[i]..points[i + 1]`) holding `point`.
    pub segment_index: usize,

    /// Distance from the query point to `point`.
    pub distance_meters: f64,

    /// Distance along the route from its start to `point`.
    pub cumulative_meters: f64,
}

impl Projection {
    /// Whether the query point lies on the route within tolerance.
    #[must_use]
    pub fn is_on_route(&self) -> bool {
        self.distance_meters <= ON_ROUTE_TOLERANCE_METERS
    }
}

impl Route {
    /// Project `point` onto this route. See [`project_onto_route`].
    #[must_use]
    pub fn project(&self, point: Coordinate) -> Projection {
        project_onto_route(self, point)
    }
}

/// Project `point` onto the nearest segment of `route`.
///
/// Every segment is considered; the projection onto each is clamped to the
/// segment's endpoints and the closest wins. On equal distance the segment
/// earlier along the route is kept.
#[must_use]
pub fn project_onto_route(route: &Route, point: Coordinate) -> Projection {
    let mut best: Option<Projection> = None;
    let mut travelled = 0.0;

    for (index, (start, end)) in route.segments().enumerate() {
        let nearest = nearest_on_segment(start, end, point);
        let distance = distance_meters(point, nearest);

        if best.is_none_or(|b| distance + TIE_TOLERANCE_METERS < b.distance_meters) {
            best = Some(Projection {
                point: nearest,
                segment_index: index,
                distance_meters: distance,
                cumulative_meters: travelled + distance_meters(start, nearest),
            });
        }

        travelled += distance_meters(start, end);
    }

    // a route always has at least one segment
    best.unwrap_or_else(|| Projection {
        point: route.start(),
        segment_index: 0,
        distance_meters: distance_meters(point, route.start()),
        cumulative_meters: 0.0,
    })
}

// Perpendicular foot of `point` on `start..end`, clamped to the segment, found
// in a local frame with longitude scaled by the segment's mid-latitude.
fn nearest_on_segment(start: Coordinate, end: Coordinate, point: Coordinate) -> Coordinate {
    let scale = ((start.latitude + end.latitude) * 0.5).to_radians().cos();
    let local = |c: Coordinate| Coord {
        x: (c.longitude - start.longitude) * scale,
        y: c.latitude - start.latitude,
    };

    let segment = Line::new(local(start), local(end));
    let foot = match segment.closest_point(&Point::from(local(point))) {
        Closest::Intersection(foot) | Closest::SinglePoint(foot) => foot.0,
        // zero-length segment
        Closest::Indeterminate => return start,
    };

    // position along the segment, mapped back onto the original vertices
    let delta = segment.delta();
    let t = foot.x.mul_add(delta.x, foot.y * delta.y) / delta.x.mul_add(delta.x, delta.y * delta.y);
    if t <= 0.0 {
        start
    } else if t >= 1.0 {
        end
    } else {
        Coordinate {
            latitude: t.mul_add(end.latitude - start.latitude, start.latitude),
            longitude: t.mul_add(end.longitude - start.longitude, start.longitude),
        }
    }
}
