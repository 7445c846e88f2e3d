//! Monitor configuration.
//!
//! Options arrive from the bridge as a JSON object with camelCase keys. Every
//! field is optional; anything missing falls back to [`MonitorConfig::default`].
//!
//! ```
//! use geofence_monitor::MonitorConfig;
//!
//! let config = MonitorConfig::from_json(r#"{"loiteringDelayMs": 60000}"#).unwrap();
//! assert_eq!(config.loitering_delay_ms, 60_000);
//! assert!(config.report_unconfirmed_exits);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GeofenceError, Result};
use crate::geo_utils::DistanceMetric;

/// Default loitering delay before an enter is confirmed (5 minutes).
pub const DEFAULT_LOITERING_DELAY_MS: u64 = 5 * 60 * 1000;

/// Location request priority, carrying the Android `LocationRequest` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LocationPriority {
    HighAccuracy,
    #[default]
    BalancedPowerAccuracy,
    LowPower,
    NoPower,
}

impl LocationPriority {
    /// Platform priority code (`PRIORITY_*` constants on Android).
    pub fn code(self) -> u32 {
        match self {
            LocationPriority::HighAccuracy => 100,
            LocationPriority::BalancedPowerAccuracy => 102,
            LocationPriority::LowPower => 104,
            LocationPriority::NoPower => 105,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            100 => Some(LocationPriority::HighAccuracy),
            102 => Some(LocationPriority::BalancedPowerAccuracy),
            104 => Some(LocationPriority::LowPower),
            105 => Some(LocationPriority::NoPower),
            _ => None,
        }
    }
}

/// Location updates the monitor asks the location provider for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LocationRequest {
    /// Desired update interval.
    /// Default: 3000 ms
    pub interval_ms: u64,
    /// Fastest rate the monitor can handle updates at.
    /// Default: 1500 ms
    pub fastest_interval_ms: u64,
    /// Minimum displacement between updates.
    /// Default: 10.0 meters
    pub smallest_displacement_m: f32,
    /// Default: BalancedPowerAccuracy
    pub priority: LocationPriority,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            fastest_interval_ms: 1500,
            smallest_displacement_m: 10.0,
            priority: LocationPriority::default(),
        }
    }
}

/// Configuration for the geofence monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MonitorConfig {
    /// How long a point must stay inside before the enter is reported.
    /// Default: 300000 ms (5 minutes)
    pub loitering_delay_ms: u64,

    /// Distance function used for containment.
    /// Default: Geodesic
    pub distance_metric: DistanceMetric,

    /// Whether an exit that cancels a still-pending enter is reported.
    /// Default: true
    pub report_unconfirmed_exits: bool,

    /// Update cadence requested from the location provider.
    pub location_request: LocationRequest,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            loitering_delay_ms: DEFAULT_LOITERING_DELAY_MS,
            distance_metric: DistanceMetric::default(),
            report_unconfirmed_exits: true,
            location_request: LocationRequest::default(),
        }
    }
}

impl MonitorConfig {
    /// Parse options JSON and validate the result.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to the same JSON shape `from_json` accepts.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn validate(&self) -> Result<()> {
        let request = &self.location_request;
        if request.interval_ms == 0 {
            return Err(GeofenceError::invalid_config(
                "locationRequest.intervalMs must be greater than 0",
            ));
        }
        if request.fastest_interval_ms > request.interval_ms {
            return Err(GeofenceError::invalid_config(format!(
                "locationRequest.fastestIntervalMs ({}) exceeds intervalMs ({})",
                request.fastest_interval_ms, request.interval_ms
            )));
        }
        if !request.smallest_displacement_m.is_finite() || request.smallest_displacement_m < 0.0 {
            return Err(GeofenceError::invalid_config(
                "locationRequest.smallestDisplacementM must be a non-negative number",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.loitering_delay_ms, 300_000);
        assert_eq!(config.distance_metric, DistanceMetric::Geodesic);
        assert!(config.report_unconfirmed_exits);
        assert_eq!(config.location_request.interval_ms, 3000);
        assert_eq!(config.location_request.fastest_interval_ms, 1500);
        assert_eq!(config.location_request.priority.code(), 102);
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = MonitorConfig::from_json("{}").unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_partial_options() {
        let json = r#"{
            "distanceMetric": "haversine",
            "reportUnconfirmedExits": false,
            "locationRequest": { "priority": "highAccuracy" }
        }"#;
        let config = MonitorConfig::from_json(json).unwrap();
        assert_eq!(config.distance_metric, DistanceMetric::Haversine);
        assert!(!config.report_unconfirmed_exits);
        assert_eq!(config.location_request.priority, LocationPriority::HighAccuracy);
        // Untouched nested fields keep their defaults
        assert_eq!(config.location_request.interval_ms, 3000);
        assert_eq!(config.loitering_delay_ms, DEFAULT_LOITERING_DELAY_MS);
    }

    #[test]
    fn test_malformed_json() {
        let result = MonitorConfig::from_json(r#"{"loiteringDelayMs": "soon"}"#);
        assert!(matches!(result, Err(GeofenceError::Json(_))));
    }

    #[test]
    fn test_interval_ordering_rejected() {
        let json = r#"{"locationRequest": {"intervalMs": 1000, "fastestIntervalMs": 5000}}"#;
        let result = MonitorConfig::from_json(json);
        assert!(matches!(result, Err(GeofenceError::InvalidConfig { .. })));
    }

    #[test]
    fn test_json_roundtrip_keys() {
        let json = MonitorConfig::default().to_json();
        assert!(json.contains("\"loiteringDelayMs\":300000"));
        assert!(json.contains("\"distanceMetric\":\"geodesic\""));
    }

    #[test]
    fn test_priority_codes() {
        for priority in [
            LocationPriority::HighAccuracy,
            LocationPriority::BalancedPowerAccuracy,
            LocationPriority::LowPower,
            LocationPriority::NoPower,
        ] {
            assert_eq!(LocationPriority::from_code(priority.code()), Some(priority));
        }
        assert_eq!(LocationPriority::from_code(101), None);
    }
}
