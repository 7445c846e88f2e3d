//! FFI bindings for mobile platforms (iOS/Android).
//!
//! Exposes a [`GeofenceMonitorHandle`] object to Kotlin and Swift. The bridge
//! creates one per service start, forwards every location fix to
//! `on_location`, and receives transitions through [`TransitionCallback`].
//! A [`TimerDriver`] is owned by the handle, so loitering deadlines fire
//! without the bridge scheduling anything.

use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use crate::config::{LocationRequest, MonitorConfig};
use crate::dispatcher::{TransitionMessage, TransitionSink};
use crate::error::GeofenceError;
use crate::monitor::{GeofenceMonitor, LocationProvider};
use crate::timer::TimerDriver;
use crate::{init_logging, Geofence, LocationSample};

// ============================================================================
// Callback Interfaces (implemented in Kotlin/Swift)
// ============================================================================

/// Receives transition batches. Implementations typically start a headless
/// task or emit a native event with `message.ids` and `message.transition`.
///
/// Called from the monitor's lock; must not call back into the handle.
#[uniffi::export(callback_interface)]
pub trait TransitionCallback: Send + Sync {
    fn on_transition(&self, message: TransitionMessage);
}

/// Platform location client started and stopped with the handle.
#[uniffi::export(callback_interface)]
pub trait LocationUpdatesCallback: Send + Sync {
    fn start_updates(&self, request: LocationRequest);
    fn stop_updates(&self);
}

struct CallbackSink(Box<dyn TransitionCallback>);

impl TransitionSink for CallbackSink {
    fn deliver(&self, message: TransitionMessage) {
        self.0.on_transition(message);
    }
}

struct CallbackProvider(Box<dyn LocationUpdatesCallback>);

impl LocationProvider for CallbackProvider {
    fn start_updates(&mut self, request: &LocationRequest) {
        self.0.start_updates(request.clone());
    }

    fn stop_updates(&mut self) {
        self.0.stop_updates();
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error surfaced to Kotlin/Swift as an exception.
#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum FfiGeofenceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Internal(String),
}

impl From<GeofenceError> for FfiGeofenceError {
    fn from(err: GeofenceError) -> Self {
        match err {
            GeofenceError::TimerDriver { .. } => FfiGeofenceError::Internal(err.to_string()),
            _ => FfiGeofenceError::InvalidInput(err.to_string()),
        }
    }
}

// ============================================================================
// Monitor Handle
// ============================================================================

#[derive(uniffi::Object)]
pub struct GeofenceMonitorHandle {
    monitor: Arc<GeofenceMonitor>,
    driver: Mutex<Option<TimerDriver>>,
}

#[uniffi::export]
impl GeofenceMonitorHandle {
    /// Create a monitor. `options_json` may be `None` for defaults.
    #[uniffi::constructor]
    pub fn new(
        options_json: Option<String>,
        callback: Box<dyn TransitionCallback>,
    ) -> Result<Arc<Self>, FfiGeofenceError> {
        init_logging();
        let config = match options_json {
            Some(json) => MonitorConfig::from_json(&json)?,
            None => MonitorConfig::default(),
        };
        info!(
            "[GeofenceMonitorRust] Creating monitor (loitering {}ms, {:?})",
            config.loitering_delay_ms, config.distance_metric
        );

        let monitor = Arc::new(GeofenceMonitor::new(config, Box::new(CallbackSink(callback))));
        let handle = Self {
            monitor,
            driver: Mutex::new(None),
        };
        handle.ensure_driver()?;
        Ok(Arc::new(handle))
    }

    /// Replace options from JSON; registered geofences are kept.
    pub fn set_options_json(&self, options_json: String) -> Result<(), FfiGeofenceError> {
        let config = MonitorConfig::from_json(&options_json)?;
        self.monitor.set_config(config)?;
        Ok(())
    }

    pub fn options_json(&self) -> String {
        self.monitor.config().to_json()
    }

    /// Start platform location updates, respawning the timer thread if a
    /// previous `stop` shut it down. Returns `false` if already started.
    pub fn start(
        &self,
        provider: Box<dyn LocationUpdatesCallback>,
    ) -> Result<bool, FfiGeofenceError> {
        self.ensure_driver()?;
        Ok(self.monitor.start(Box::new(CallbackProvider(provider))))
    }

    /// Stop location updates, clear every geofence and stop the timer thread.
    pub fn stop(&self) {
        self.monitor.stop();
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut driver) = driver.take() {
            driver.stop();
        }
    }

    pub fn is_started(&self) -> bool {
        self.monitor.is_started()
    }

    pub fn add_geofences(&self, geofences: Vec<Geofence>) -> Result<(), FfiGeofenceError> {
        self.monitor.add_geofences(geofences)?;
        Ok(())
    }

    /// Add geofences from a JSON array of `{id, latitude, longitude, radius}`.
    pub fn add_geofences_json(&self, geofences_json: String) -> Result<(), FfiGeofenceError> {
        let geofences = Geofence::list_from_json(&geofences_json)?;
        self.monitor.add_geofences(geofences)?;
        Ok(())
    }

    /// Remove geofences by id. Returns how many existed.
    pub fn remove_geofences(&self, ids: Vec<String>) -> u32 {
        self.monitor.remove_geofences(&ids) as u32
    }

    pub fn clear_geofences(&self) -> u32 {
        self.monitor.clear() as u32
    }

    pub fn list_geofences(&self) -> Vec<Geofence> {
        self.monitor.geofences()
    }

    pub fn list_geofences_json(&self) -> String {
        serde_json::to_string(&self.monitor.geofences()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Feed one location fix. Returns `false` if it was degraded and skipped.
    pub fn on_location(&self, sample: LocationSample) -> bool {
        self.monitor.on_location(sample)
    }

    /// Feed one location fix as the bridge's `Location` JSON object.
    pub fn on_location_json(&self, sample_json: String) -> Result<bool, FfiGeofenceError> {
        let sample: LocationSample = serde_json::from_str(&sample_json)
            .map_err(GeofenceError::from)?;
        Ok(self.monitor.on_location(sample))
    }

    /// Fire due enters now. Normally the timer thread does this.
    pub fn fire_due(&self) -> u32 {
        self.monitor.fire_due() as u32
    }

    /// Milliseconds until the next loitering deadline, if any.
    pub fn next_deadline_in_ms(&self) -> Option<u64> {
        self.monitor
            .next_deadline_ms()
            .map(|deadline| deadline.saturating_sub(self.monitor.now_ms()))
    }

    pub fn last_location(&self) -> Option<LocationSample> {
        self.monitor.last_location()
    }
}

impl GeofenceMonitorHandle {
    fn ensure_driver(&self) -> Result<(), GeofenceError> {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if driver.is_none() {
            *driver = Some(TimerDriver::spawn(self.monitor.clone())?);
        }
        Ok(())
    }
}

/// Default options as JSON, for the bridge to merge user options into.
#[uniffi::export]
pub fn default_options_json() -> String {
    init_logging();
    MonitorConfig::default().to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Transition;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Duration;

    struct ChannelCallback(Mutex<Sender<TransitionMessage>>);

    impl TransitionCallback for ChannelCallback {
        fn on_transition(&self, message: TransitionMessage) {
            self.0.lock().unwrap().send(message).ok();
        }
    }

    #[derive(Default)]
    struct UpdatesLog {
        started: Vec<u64>,
        stopped: usize,
    }

    struct RecordingUpdates(Arc<Mutex<UpdatesLog>>);

    impl LocationUpdatesCallback for RecordingUpdates {
        fn start_updates(&self, request: LocationRequest) {
            self.0.lock().unwrap().started.push(request.interval_ms);
        }

        fn stop_updates(&self) {
            self.0.lock().unwrap().stopped += 1;
        }
    }

    fn handle(options_json: Option<&str>) -> (Arc<GeofenceMonitorHandle>, Receiver<TransitionMessage>) {
        let (tx, rx) = mpsc::channel();
        let callback = Box::new(ChannelCallback(Mutex::new(tx)));
        let handle = GeofenceMonitorHandle::new(options_json.map(str::to_string), callback)
            .unwrap_or_else(|e| panic!("handle construction failed: {}", e));
        (handle, rx)
    }

    fn r1() -> Geofence {
        Geofence::new("r1", 45.0, 9.0, 300.0)
    }

    #[test]
    fn test_invalid_options_rejected() {
        let (tx, _rx) = mpsc::channel();
        let result = GeofenceMonitorHandle::new(
            Some("{not json".to_string()),
            Box::new(ChannelCallback(Mutex::new(tx))),
        );
        assert!(matches!(result, Err(FfiGeofenceError::InvalidInput(_))));
    }

    #[test]
    fn test_timer_survives_stop_start_cycle() {
        let (handle, rx) = handle(Some(r#"{"loiteringDelayMs": 50}"#));
        let log = Arc::new(Mutex::new(UpdatesLog::default()));

        assert!(handle.start(Box::new(RecordingUpdates(log.clone()))).unwrap());
        handle.stop();
        assert!(!handle.is_started());
        assert!(handle.start(Box::new(RecordingUpdates(log.clone()))).unwrap());

        handle.add_geofences(vec![r1()]).unwrap();
        assert!(handle.on_location(LocationSample::new(45.0, 9.0, 5.0)));

        let message = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(message.transition, Transition::Enter);
        assert_eq!(message.ids, vec!["r1"]);

        let log = log.lock().unwrap();
        assert_eq!(log.started, vec![3000, 3000]);
        assert_eq!(log.stopped, 1);
    }

    #[test]
    fn test_start_twice_reports_already_started() {
        let (handle, _rx) = handle(None);
        let log = Arc::new(Mutex::new(UpdatesLog::default()));
        assert!(handle.start(Box::new(RecordingUpdates(log.clone()))).unwrap());
        assert!(!handle.start(Box::new(RecordingUpdates(log.clone()))).unwrap());
        assert_eq!(log.lock().unwrap().started.len(), 1);
    }

    #[test]
    fn test_options_json_roundtrip() {
        let (handle, _rx) = handle(None);
        assert_eq!(handle.options_json(), default_options_json());

        handle
            .set_options_json(r#"{"loiteringDelayMs": 1000}"#.to_string())
            .unwrap();
        assert!(handle.options_json().contains("\"loiteringDelayMs\":1000"));

        let invalid = r#"{"locationRequest": {"intervalMs": 0}}"#.to_string();
        assert!(matches!(
            handle.set_options_json(invalid),
            Err(FfiGeofenceError::InvalidInput(_))
        ));
        assert!(handle.options_json().contains("\"loiteringDelayMs\":1000"));
    }

    #[test]
    fn test_geofences_json_entry_points() {
        let (handle, _rx) = handle(None);
        handle
            .add_geofences_json(
                r#"[{"id": "r1", "latitude": 45.0, "longitude": 9.0, "radius": 300}]"#.to_string(),
            )
            .unwrap();
        assert!(handle.list_geofences_json().contains("\"id\":\"r1\""));
        assert_eq!(handle.list_geofences(), vec![r1()]);

        assert!(handle.add_geofences_json("[{\"id\": 1}]".to_string()).is_err());
        let invalid = r#"[{"id": "r2", "latitude": 95.0, "longitude": 9.0, "radius": 10}]"#;
        assert!(handle.add_geofences_json(invalid.to_string()).is_err());
        assert_eq!(handle.list_geofences().len(), 1);
    }

    #[test]
    fn test_location_json_and_deadlines() {
        let (handle, _rx) = handle(None);
        handle.add_geofences(vec![r1()]).unwrap();
        assert_eq!(handle.next_deadline_in_ms(), None);

        let degraded = r#"{"latitude": 45.0, "longitude": 9.0}"#.to_string();
        assert!(!handle.on_location_json(degraded).unwrap());
        assert!(handle.on_location_json("{bad".to_string()).is_err());

        let inside = r#"{"latitude": 45.0, "longitude": 9.0, "accuracy": 5.0, "speed": 1.0}"#;
        assert!(handle.on_location_json(inside.to_string()).unwrap());
        let remaining = handle.next_deadline_in_ms().unwrap();
        assert!(remaining <= 5 * 60 * 1000);
        assert_eq!(handle.last_location().unwrap().speed, Some(1.0));

        assert_eq!(handle.remove_geofences(vec!["r1".to_string(), "zzz".to_string()]), 1);
        assert_eq!(handle.next_deadline_in_ms(), None);
        assert_eq!(handle.fire_due(), 0);
        assert_eq!(handle.clear_geofences(), 0);
    }
}
