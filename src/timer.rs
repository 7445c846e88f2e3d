//! Background thread that fires loitering deadlines.
//!
//! The driver sleeps on the monitor's condition variable until the earliest
//! pending deadline, then confirms due enters while holding the monitor lock.
//! Cancellation needs no bookkeeping here: a removed or exited region has no
//! pending timestamp, so it is never found due.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{GeofenceError, Result};
use crate::monitor::GeofenceMonitor;

/// Upper bound on a single wait, so clock sources that are not wall time
/// (e.g. a manual clock) are still re-checked.
const MAX_WAIT: Duration = Duration::from_secs(1);

/// Handle to the timer thread. Dropping it stops and joins the thread.
pub struct TimerDriver {
    monitor: Arc<GeofenceMonitor>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimerDriver {
    /// Spawn a timer thread for `monitor`.
    pub fn spawn(monitor: Arc<GeofenceMonitor>) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_monitor = monitor.clone();
        let thread_shutdown = shutdown.clone();

        let handle = thread::Builder::new()
            .name("geofence-timer".to_string())
            .spawn(move || run(&thread_monitor, &thread_shutdown))
            .map_err(|e| GeofenceError::TimerDriver {
                message: e.to_string(),
            })?;

        info!("[TimerDriver] Started");
        Ok(Self {
            monitor,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::SeqCst);
        // Taking the lock orders the flag store before the driver's next wait
        drop(self.monitor.lock_state());
        self.monitor.notify_pending_changed();
        if handle.join().is_err() {
            warn!("[TimerDriver] Timer thread panicked");
        }
        info!("[TimerDriver] Stopped");
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(monitor: &GeofenceMonitor, shutdown: &AtomicBool) {
    let mut state = monitor.lock_state();
    while !shutdown.load(Ordering::SeqCst) {
        let now = monitor.now_ms();
        let wait = match state.next_deadline() {
            Some(deadline) if deadline <= now => {
                let fired = state.fire_due(now);
                debug!("[TimerDriver] Confirmed {} enters at {}ms", fired, now);
                continue;
            }
            Some(deadline) => Duration::from_millis(deadline - now).min(MAX_WAIT),
            None => MAX_WAIT,
        };
        state = monitor
            .pending_changed()
            .wait_timeout(state, wait)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}
