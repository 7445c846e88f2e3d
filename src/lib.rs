//! # Geofence Monitor
//!
//! Client-side geofence transition detection for mobile location bridges.
//!
//! When an app cannot use the platform's background region monitoring, it can
//! still emulate geofencing by feeding every location fix into a
//! [`GeofenceMonitor`]. The monitor:
//! - checks each registered circular region for containment
//! - confirms enters only after the point has loitered inside (5 minutes by default)
//! - reports exits immediately
//! - batches ids per direction into one [`TransitionMessage`] per pass
//!
//! ## Features
//!
//! - **`ffi`** - Enable UniFFI bindings for mobile platforms (iOS/Android)
//! - **`service`** - Enable the tokio event loop in [`service`]
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use geofence_monitor::{
//!     ChannelSink, Geofence, GeofenceMonitor, LocationSample, ManualClock, MonitorConfig,
//!     Transition,
//! };
//!
//! let clock = Arc::new(ManualClock::new(0));
//! let (sink, transitions) = ChannelSink::channel();
//! let monitor = GeofenceMonitor::with_clock(MonitorConfig::default(), Box::new(sink), clock.clone());
//!
//! monitor.add_geofence(Geofence::new("office", 45.0, 9.0, 300.0)).unwrap();
//! monitor.on_location(LocationSample::new(45.0005, 9.0, 8.0));
//!
//! // Five minutes later the enter is confirmed
//! clock.advance(5 * 60 * 1000);
//! monitor.fire_due();
//!
//! let message = transitions.try_recv().unwrap();
//! assert_eq!(message.transition, Transition::Enter);
//! assert_eq!(message.ids, vec!["office"]);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{GeofenceError, Result};

// Geographic utilities (distance, coordinate validation)
pub mod geo_utils;
pub use geo_utils::DistanceMetric;

// Options object consumed from the bridge
pub mod config;
pub use config::{LocationPriority, LocationRequest, MonitorConfig, DEFAULT_LOITERING_DELAY_MS};

// Monotonic time sources
pub mod clock;
pub use clock::{Clock, ManualClock, MonotonicClock};

// Registered regions and their transition state
pub mod registry;
pub use registry::{GeofenceRegistry, Side, TransitionState};

// Inside/outside classification per fix
pub mod evaluator;
pub use evaluator::{Candidate, Candidates, ContainmentEvaluator};

// Loitering delay and exit cancellation
pub mod debouncer;
pub use debouncer::TransitionDebouncer;

// Batching transitions into bridge messages
pub mod dispatcher;
pub use dispatcher::{
    ChannelSink, NotificationDispatcher, Transition, TransitionMessage, TransitionSink,
};

// Owned monitor composing the pipeline
pub mod monitor;
pub use monitor::{GeofenceMonitor, LocationProvider};

// Background thread firing loitering deadlines
pub mod timer;
pub use timer::TimerDriver;

// Async event loop over a sample channel
#[cfg(feature = "service")]
pub mod service;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("GeofenceMonitorRust"),
    );
}

/// Initialize logging for iOS (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "ios"))]
pub(crate) fn init_logging() {
    use log::LevelFilter;
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        oslog::OsLogger::new("com.geofencemonitor")
            .level_filter(LevelFilter::Debug)
            .init()
            .ok();
    });
}

#[cfg(all(feature = "ffi", not(any(target_os = "android", target_os = "ios"))))]
pub(crate) fn init_logging() {
    // No-op on non-mobile platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A circular region monitored for entry and exit.
///
/// # Example
/// ```
/// use geofence_monitor::Geofence;
/// let office = Geofence::new("office", 45.4642, 9.1900, 150.0);
/// assert!(office.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Geofence {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters
    pub radius: f32,
}

impl Geofence {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64, radius: f32) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            radius,
        }
    }

    /// Check that the center is a valid coordinate and the radius is positive.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(GeofenceError::invalid_geofence(&self.id, "id must not be empty"));
        }
        if !geo_utils::is_valid_coordinate(self.latitude, self.longitude) {
            return Err(GeofenceError::invalid_geofence(
                &self.id,
                format!(
                    "center ({}, {}) is not a valid coordinate",
                    self.latitude, self.longitude
                ),
            ));
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(GeofenceError::invalid_geofence(
                &self.id,
                format!("radius {} must be a positive number of meters", self.radius),
            ));
        }
        Ok(())
    }

    /// Parse a JSON array of `{id, latitude, longitude, radius}` objects.
    pub fn list_from_json(json: &str) -> Result<Vec<Geofence>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A location fix from the location provider.
///
/// Only `latitude`, `longitude` and `accuracy` take part in evaluation. The
/// remaining fields mirror the bridge's `Location` object so the monitor can
/// hand the last fix back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in meters; fixes without one are never evaluated
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub altitude: Option<f64>,
    pub bearing: Option<f64>,
    /// Fix time in milliseconds since the Unix epoch
    pub time: Option<i64>,
    pub is_from_mock_provider: Option<bool>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: Some(accuracy),
            ..Self::default()
        }
    }

    /// A fix is usable when it has a finite, non-negative accuracy and a valid
    /// coordinate.
    pub fn is_usable(&self) -> bool {
        let accuracy_ok = matches!(self.accuracy, Some(a) if a.is_finite() && a >= 0.0);
        accuracy_ok && geo_utils::is_valid_coordinate(self.latitude, self.longitude)
    }
}

// ============================================================================
// Tests
// ============================================================================
