use std::env;

use route_matching::{DEFAULT_AVERAGE_SPEED_KMH, DEFAULT_RADIUS_METERS, MatchingConfig};
use trip_location::{DEFAULT_LOCATION_TOPIC, EngineConfig};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Service configuration, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub listen_addr: String,
    pub matching: MatchingConfig,
    pub route_cache_enabled: bool,
    pub engine: EngineConfig,
}

impl Config {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Missing or
    /// unparsable values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let vars = Vars(lookup);

        let listen_addr = vars.string("LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
        let matching = MatchingConfig {
            default_radius_meters: vars
                .positive_f64("DEFAULT_MATCHING_RADIUS_METERS", DEFAULT_RADIUS_METERS),
            average_speed_kmh: vars
                .positive_f64("DEFAULT_AVERAGE_SPEED_KMH", DEFAULT_AVERAGE_SPEED_KMH),
        };
        let route_cache_enabled = vars.bool("ROUTE_CACHE_ENABLED", true);
        let engine = EngineConfig {
            topic: vars.string("LOCATION_TOPIC", DEFAULT_LOCATION_TOPIC),
            fallback_direct: vars.bool("BROKER_FALLBACK_DIRECT", true),
        };

        Self { listen_addr, matching, route_cache_enabled, engine }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| {
                tracing::trace!("{key} not set, using default: {default}");
                default.to_string()
            })
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        (self.0)(key)
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(default)
    }

    // zero, negative and non-finite values are rejected
    fn positive_f64(&self, key: &str, default: f64) -> f64 {
        (self.0)(key)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value > 0.0)
            .unwrap_or_else(|| {
                tracing::trace!("{key} not set or not positive, using default: {default}");
                default
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.matching, MatchingConfig::default());
        assert!(config.route_cache_enabled);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("DEFAULT_MATCHING_RADIUS_METERS", "750"),
            ("DEFAULT_AVERAGE_SPEED_KMH", "45.5"),
            ("ROUTE_CACHE_ENABLED", "false"),
            ("LOCATION_TOPIC", "dev-trip-location-updates"),
            ("BROKER_FALLBACK_DIRECT", "0"),
        ]));

        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert!((config.matching.default_radius_meters - 750.0).abs() < f64::EPSILON);
        assert!((config.matching.average_speed_kmh - 45.5).abs() < f64::EPSILON);
        assert!(!config.route_cache_enabled);
        assert_eq!(config.engine.topic, "dev-trip-location-updates");
        assert!(!config.engine.fallback_direct);
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("DEFAULT_MATCHING_RADIUS_METERS", "wide"),
            ("LISTEN_ADDR", "  "),
        ]));

        assert!((config.matching.default_radius_meters - DEFAULT_RADIUS_METERS).abs() < f64::EPSILON);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
    }

    #[test]
    fn non_positive_values_fall_back() {
        for (radius, speed) in [("0", "-30"), ("-500", "0"), ("inf", "NaN")] {
            let config = Config::from_lookup(lookup(&[
                ("DEFAULT_MATCHING_RADIUS_METERS", radius),
                ("DEFAULT_AVERAGE_SPEED_KMH", speed),
            ]));

            assert_eq!(config.matching, MatchingConfig::default(), "radius {radius}, speed {speed}");
        }
    }
}
