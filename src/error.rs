//! Unified error handling for the geofence-monitor library.
//!
//! Only registration and configuration can fail. The evaluation pipeline
//! (`on_location`, `fire_due`, `remove`, `clear`) degrades to "nothing fires
//! this pass" instead of returning errors.

use thiserror::Error;

/// Unified error type for geofence-monitor operations.
#[derive(Debug, Error)]
pub enum GeofenceError {
    /// Geofence has out-of-range coordinates or a non-positive radius
    #[error("Geofence '{id}' is invalid: {message}")]
    InvalidGeofence { id: String, message: String },

    /// Configuration values are inconsistent or out of range
    #[error("Configuration error: {message}")]
    InvalidConfig { message: String },

    /// Options or geofence JSON could not be parsed
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Background timer thread could not be started
    #[error("Timer driver error: {message}")]
    TimerDriver { message: String },
}

/// Result type alias for geofence-monitor operations.
pub type Result<T> = std::result::Result<T, GeofenceError>;

impl GeofenceError {
    pub(crate) fn invalid_geofence(id: &str, message: impl Into<String>) -> Self {
        GeofenceError::InvalidGeofence {
            id: id.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        GeofenceError::InvalidConfig {
            message: message.into(),
        }
    }
}
