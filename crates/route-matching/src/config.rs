/// Search radius applied when a request does not carry its own.
pub const DEFAULT_RADIUS_METERS: f64 = 500.0;

/// Average approach speed used for arrival estimates.
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingConfig {
    pub default_radius_meters: f64,
    pub average_speed_kmh: f64,
}

impl MatchingConfig {
    /// Average approach speed in meters per minute.
    #[must_use]
    pub fn meters_per_minute(&self) -> f64 {
        self.average_speed_kmh * 1000.0 / 60.0
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_radius_meters: DEFAULT_RADIUS_METERS,
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
        }
    }
}
