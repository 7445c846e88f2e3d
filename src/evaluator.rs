//! Containment evaluation: which registered regions a location fix is inside.
//!
//! Each pass compares the freshly computed side against the side recorded on
//! the registry entry and updates it unconditionally, so feeding the same fix
//! twice produces candidates only the first time.

use log::debug;

use crate::geo_utils::DistanceMetric;
use crate::registry::{GeofenceRegistry, Side};
use crate::{Geofence, LocationSample};

/// A region whose side changed during an evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub geofence: Geofence,
    /// Side recorded before this pass
    pub previous: Side,
    /// Distance from the fix to the region center in meters
    pub distance: f64,
}

/// Enter/exit candidates produced by one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    pub entered: Vec<Candidate>,
    pub exited: Vec<Candidate>,
}

impl Candidates {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// Computes inside/outside for every registered region.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainmentEvaluator {
    metric: DistanceMetric,
}

impl ContainmentEvaluator {
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Evaluate one fix against the registry.
    ///
    /// Returns `None` without touching any recorded side when the fix is not
    /// usable (see [`LocationSample::is_usable`]).
    pub fn evaluate(
        &self,
        sample: &LocationSample,
        registry: &mut GeofenceRegistry,
    ) -> Option<Candidates> {
        if !sample.is_usable() {
            debug!(
                "[Evaluator] Dropping degraded fix ({}, {}) accuracy={:?}",
                sample.latitude, sample.longitude, sample.accuracy
            );
            return None;
        }

        let mut candidates = Candidates::default();

        for entry in registry.entries_mut() {
            let geofence = &entry.geofence;
            let distance = self.metric.distance(
                geofence.latitude,
                geofence.longitude,
                sample.latitude,
                sample.longitude,
            );
            let side = if distance <= geofence.radius as f64 {
                Side::Inside
            } else {
                Side::Outside
            };

            let previous = entry.state.current_side;
            entry.state.current_side = side;
            if previous == side {
                continue;
            }

            let candidate = Candidate {
                geofence: geofence.clone(),
                previous,
                distance,
            };
            match side {
                Side::Inside => candidates.entered.push(candidate),
                Side::Outside => candidates.exited.push(candidate),
                Side::Unknown => {}
            }
        }

        Some(candidates)
    }
}
