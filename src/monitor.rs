//! # Geofence Monitor
//!
//! Owned, explicitly constructed monitor that composes the registry,
//! evaluator, debouncer and dispatcher behind a single lock.
//!
//! ## Architecture
//!
//! Every operation takes the same mutex: registry mutation, location passes
//! and timer firing. The sink is invoked while the lock is held, which gives
//! two guarantees:
//! - a removed or cleared region can never be dispatched afterwards
//! - messages for a region are delivered in the order they were confirmed
//!
//! A location pass runs in this order:
//! 1. fire enters whose loitering deadline passed before this fix
//! 2. evaluate containment (degraded fixes stop here)
//! 3. deliver exits
//! 4. deliver enters confirmed immediately (zero loitering delay only)
//!
//! The condition variable is notified whenever the pending set may have
//! changed, so a [`crate::TimerDriver`] sleeping on the next deadline can
//! recompute it. With the `service` feature a tokio `Notify` is signalled at
//! the same points for the async loop.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{LocationRequest, MonitorConfig};
use crate::debouncer::TransitionDebouncer;
use crate::dispatcher::{NotificationDispatcher, TransitionSink};
use crate::error::Result;
use crate::evaluator::ContainmentEvaluator;
use crate::registry::{GeofenceRegistry, TransitionState};
use crate::{Geofence, LocationSample};

/// Source of location fixes, started and stopped with the monitor.
pub trait LocationProvider: Send {
    fn start_updates(&mut self, request: &LocationRequest);
    fn stop_updates(&mut self);
}

pub(crate) struct MonitorState {
    config: MonitorConfig,
    registry: GeofenceRegistry,
    evaluator: ContainmentEvaluator,
    debouncer: TransitionDebouncer,
    dispatcher: NotificationDispatcher,
    last_location: Option<LocationSample>,
    provider: Option<Box<dyn LocationProvider>>,
    started: bool,
}

impl MonitorState {
    /// Confirm due enters and deliver them as one batch.
    pub(crate) fn fire_due(&mut self, now_ms: u64) -> usize {
        let entered = self.debouncer.fire_due(&mut self.registry, now_ms);
        let count = entered.len();
        self.dispatcher.dispatch_enter(entered);
        count
    }

    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.debouncer.next_deadline(&self.registry)
    }
}

/// Geofence transition monitor.
///
/// Share it across threads with `Arc<GeofenceMonitor>`; all methods take
/// `&self`.
pub struct GeofenceMonitor {
    state: Mutex<MonitorState>,
    pending_changed: Condvar,
    /// Async counterpart of `pending_changed` for the service loop
    #[cfg(feature = "service")]
    deadline_changed: tokio::sync::Notify,
    clock: Arc<dyn Clock>,
}

impl GeofenceMonitor {
    /// Create a monitor on the wall clock.
    pub fn new(config: MonitorConfig, sink: Box<dyn TransitionSink>) -> Self {
        Self::with_clock(config, sink, Arc::new(MonotonicClock::new()))
    }

    /// Create a monitor on a custom clock (e.g. [`crate::ManualClock`]).
    pub fn with_clock(
        config: MonitorConfig,
        sink: Box<dyn TransitionSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = MonitorState {
            evaluator: ContainmentEvaluator::new(config.distance_metric),
            debouncer: TransitionDebouncer::new(
                config.loitering_delay_ms,
                config.report_unconfirmed_exits,
            ),
            config,
            registry: GeofenceRegistry::new(),
            dispatcher: NotificationDispatcher::new(sink),
            last_location: None,
            provider: None,
            started: false,
        };
        Self {
            state: Mutex::new(state),
            pending_changed: Condvar::new(),
            #[cfg(feature = "service")]
            deadline_changed: tokio::sync::Notify::new(),
            clock,
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn pending_changed(&self) -> &Condvar {
        &self.pending_changed
    }

    #[cfg(feature = "service")]
    pub(crate) fn deadline_changed(&self) -> &tokio::sync::Notify {
        &self.deadline_changed
    }

    pub(crate) fn notify_pending_changed(&self) {
        self.pending_changed.notify_all();
        // Stores a permit if the loop is not waiting yet
        #[cfg(feature = "service")]
        self.deadline_changed.notify_one();
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn config(&self) -> MonitorConfig {
        self.lock_state().config.clone()
    }

    /// Replace the configuration. Registered geofences and their state are
    /// kept; pending deadlines are recomputed from the new loitering delay.
    pub fn set_config(&self, config: MonitorConfig) -> Result<()> {
        config.validate()?;
        {
            let mut state = self.lock_state();
            state.evaluator = ContainmentEvaluator::new(config.distance_metric);
            state.debouncer =
                TransitionDebouncer::new(config.loitering_delay_ms, config.report_unconfirmed_exits);
            state.config = config;
        }
        self.notify_pending_changed();
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start location updates through `provider`.
    ///
    /// Returns `false` (and drops `provider`) if the monitor is already
    /// started.
    pub fn start(&self, mut provider: Box<dyn LocationProvider>) -> bool {
        let mut state = self.lock_state();
        if state.started {
            debug!("[GeofenceMonitor] start ignored, already started");
            return false;
        }
        provider.start_updates(&state.config.location_request);
        state.provider = Some(provider);
        state.started = true;
        info!(
            "[GeofenceMonitor] Started ({} geofences, interval {}ms)",
            state.registry.len(),
            state.config.location_request.interval_ms
        );
        true
    }

    /// Stop location updates and drop every geofence and pending enter.
    pub fn stop(&self) {
        {
            let mut state = self.lock_state();
            if let Some(mut provider) = state.provider.take() {
                provider.stop_updates();
            }
            let removed = state.registry.clear();
            state.started = false;
            info!("[GeofenceMonitor] Stopped, {} geofences cleared", removed);
        }
        self.notify_pending_changed();
    }

    pub fn is_started(&self) -> bool {
        self.lock_state().started
    }

    // ========================================================================
    // Geofence Management
    // ========================================================================

    /// Register a geofence, replacing any existing one with the same id.
    pub fn add_geofence(&self, geofence: Geofence) -> Result<()> {
        self.add_geofences(vec![geofence])
    }

    /// Register several geofences. Either all are registered or, if any is
    /// invalid, none are.
    pub fn add_geofences(&self, geofences: Vec<Geofence>) -> Result<()> {
        for geofence in &geofences {
            if let Err(e) = geofence.validate() {
                warn!("[GeofenceMonitor] Rejected geofence batch: {}", e);
                return Err(e);
            }
        }

        {
            let mut state = self.lock_state();
            let count = geofences.len();
            for geofence in geofences {
                if let Some(previous) = state.registry.insert(geofence) {
                    debug!("[GeofenceMonitor] Replaced geofence '{}'", previous.id);
                }
            }
            info!(
                "[GeofenceMonitor] Added {} geofences ({} total)",
                count,
                state.registry.len()
            );
        }
        // Replacing a region drops its pending enter
        self.notify_pending_changed();
        Ok(())
    }

    /// Remove a geofence and its pending enter. Returns whether it existed.
    pub fn remove_geofence(&self, id: &str) -> bool {
        let removed = self.lock_state().registry.remove(id).is_some();
        if removed {
            self.notify_pending_changed();
        }
        removed
    }

    /// Remove several geofences. Unknown ids are ignored. Returns how many
    /// were removed.
    pub fn remove_geofences(&self, ids: &[String]) -> usize {
        let removed = {
            let mut state = self.lock_state();
            let removed = ids
                .iter()
                .filter(|id| state.registry.remove(id).is_some())
                .count();
            info!(
                "[GeofenceMonitor] Removed {} of {} requested geofences",
                removed,
                ids.len()
            );
            removed
        };
        if removed > 0 {
            self.notify_pending_changed();
        }
        removed
    }

    /// Remove every geofence and pending enter. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = self.lock_state().registry.clear();
        self.notify_pending_changed();
        removed
    }

    pub fn geofences(&self) -> Vec<Geofence> {
        self.lock_state().registry.list()
    }

    pub fn geofence_state(&self, id: &str) -> Option<TransitionState> {
        self.lock_state().registry.state(id)
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Run one location pass. Returns `false` if the fix was degraded and
    /// skipped.
    pub fn on_location(&self, sample: LocationSample) -> bool {
        let now = self.clock.now_ms();
        let scheduled = {
            let mut state = self.lock_state();
            state.fire_due(now);

            let state = &mut *state;
            let Some(candidates) = state.evaluator.evaluate(&sample, &mut state.registry) else {
                return false;
            };
            state.last_location = Some(sample);

            let exits = state
                .debouncer
                .on_candidates(&mut state.registry, &candidates, now);
            state.dispatcher.dispatch_exit(exits);

            // Zero loitering delay confirms within the same pass
            state.fire_due(now);

            !candidates.is_empty()
        };
        if scheduled {
            self.notify_pending_changed();
        }
        true
    }

    /// Confirm every enter whose loitering deadline has passed. Returns how
    /// many regions were confirmed.
    pub fn fire_due(&self) -> usize {
        let now = self.clock.now_ms();
        self.lock_state().fire_due(now)
    }

    /// Earliest pending loitering deadline on this monitor's clock.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.lock_state().next_deadline()
    }

    pub fn last_location(&self) -> Option<LocationSample> {
        self.lock_state().last_location.clone()
    }
}

impl std::fmt::Debug for GeofenceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("GeofenceMonitor")
            .field("geofences", &state.registry.len())
            .field("pending", &state.registry.pending_count())
            .field("started", &state.started)
            .finish()
    }
}
