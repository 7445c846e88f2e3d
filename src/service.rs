//! Async monitor service.
//!
//! Funnels location samples and loitering deadlines through one tokio task:
//! each loop iteration either evaluates the next sample or fires due enters,
//! never both at once. Changes made through the monitor from outside the loop
//! (`set_config`, `on_location`, removals) wake it so the sleep is
//! recomputed. Run one loop per monitor.
//!
//! ```no_run
//! use std::sync::Arc;
//! use geofence_monitor::service::{spawn, TokioClock};
//! use geofence_monitor::{ChannelSink, GeofenceMonitor, LocationSample, MonitorConfig};
//!
//! # async fn demo() {
//! let (sink, _transitions) = ChannelSink::channel();
//! let monitor = Arc::new(GeofenceMonitor::with_clock(
//!     MonitorConfig::default(),
//!     Box::new(sink),
//!     Arc::new(TokioClock::new()),
//! ));
//! let (samples, receiver) = tokio::sync::mpsc::channel(64);
//! let task = spawn(monitor, receiver);
//!
//! samples.send(LocationSample::new(45.0, 9.0, 5.0)).await.ok();
//! drop(samples);
//! task.await.ok();
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::monitor::GeofenceMonitor;
use crate::LocationSample;

/// Sleep used when nothing is pending; the branch is disabled anyway.
const IDLE_SLEEP: Duration = Duration::from_secs(24 * 60 * 60);

/// Clock backed by tokio's time source, so paused test time drives deadlines.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Run the monitor loop until the sample channel closes.
pub async fn run(monitor: Arc<GeofenceMonitor>, mut samples: mpsc::Receiver<LocationSample>) {
    info!("[MonitorService] Running");
    loop {
        let next_deadline = monitor.next_deadline_ms();
        let sleep_for = next_deadline
            .map(|deadline| Duration::from_millis(deadline.saturating_sub(monitor.now_ms())))
            .unwrap_or(IDLE_SLEEP);

        tokio::select! {
            sample = samples.recv() => match sample {
                Some(sample) => {
                    monitor.on_location(sample);
                }
                None => break,
            },
            _ = tokio::time::sleep(sleep_for), if next_deadline.is_some() => {
                let fired = monitor.fire_due();
                debug!("[MonitorService] Confirmed {} enters", fired);
            }
            // Registry or config changed elsewhere; recompute the deadline
            _ = monitor.deadline_changed().notified() => {}
        }
    }
    info!("[MonitorService] Sample channel closed, stopping");
}

/// Spawn [`run`] on the current tokio runtime.
pub fn spawn(
    monitor: Arc<GeofenceMonitor>,
    samples: mpsc::Receiver<LocationSample>,
) -> JoinHandle<()> {
    tokio::spawn(run(monitor, samples))
}
