//! # Transition Debouncer
//!
//! Turns evaluator candidates into confirmed transitions.
//!
//! - Exits are confirmed immediately and cancel any pending enter.
//! - Enters wait out the loitering delay; a repeat enter candidate restarts
//!   the wait instead of stacking a second timer.
//! - A first fix that lands outside (previous side `Unknown`) only
//!   establishes the side.
//!
//! The "timer" for a region is its `pending_enter_since` timestamp on the
//! registry entry. Deadlines are checked by [`TransitionDebouncer::fire_due`],
//! which the monitor calls under the same lock as every other mutation.

use log::debug;

use crate::evaluator::Candidates;
use crate::registry::{GeofenceRegistry, Side};

/// Loitering policy applied to evaluator output.
#[derive(Debug, Clone, Copy)]
pub struct TransitionDebouncer {
    loitering_delay_ms: u64,
    report_unconfirmed_exits: bool,
}

impl TransitionDebouncer {
    pub fn new(loitering_delay_ms: u64, report_unconfirmed_exits: bool) -> Self {
        Self {
            loitering_delay_ms,
            report_unconfirmed_exits,
        }
    }

    pub fn loitering_delay_ms(&self) -> u64 {
        self.loitering_delay_ms
    }

    /// Apply one pass of candidates at time `now_ms`.
    ///
    /// Returns the ids whose exit is confirmed by this pass. Enters are only
    /// scheduled here and surface later through [`Self::fire_due`].
    pub fn on_candidates(
        &self,
        registry: &mut GeofenceRegistry,
        candidates: &Candidates,
        now_ms: u64,
    ) -> Vec<String> {
        let mut exits = Vec::new();

        for candidate in &candidates.exited {
            let id = &candidate.geofence.id;
            let Some(entry) = registry.entry_mut(id) else {
                continue;
            };
            let was_pending = entry.state.pending_enter_since.take().is_some();
            if was_pending {
                debug!("[Debouncer] '{}' left before loitering elapsed, enter canceled", id);
            }

            let report = match candidate.previous {
                Side::Inside => !was_pending || self.report_unconfirmed_exits,
                Side::Unknown | Side::Outside => false,
            };
            if report {
                exits.push(id.clone());
            }
        }

        for candidate in &candidates.entered {
            let id = &candidate.geofence.id;
            if let Some(entry) = registry.entry_mut(id) {
                entry.state.pending_enter_since = Some(now_ms);
                debug!(
                    "[Debouncer] '{}' entered, confirming at {}ms",
                    id,
                    now_ms.saturating_add(self.loitering_delay_ms)
                );
            }
        }

        exits
    }

    /// Confirm every pending enter whose deadline is at or before `now_ms`.
    ///
    /// All regions confirmed by the same call come back as one batch, ordered
    /// by deadline and then id.
    pub fn fire_due(&self, registry: &mut GeofenceRegistry, now_ms: u64) -> Vec<String> {
        let mut due: Vec<(u64, String)> = Vec::new();

        for entry in registry.entries_mut() {
            let Some(since) = entry.state.pending_enter_since else {
                continue;
            };
            let deadline = since.saturating_add(self.loitering_delay_ms);
            if deadline > now_ms {
                continue;
            }
            entry.state.pending_enter_since = None;
            // An exit always clears the pending enter, so a due timer implies
            // the region is still inside.
            debug_assert_eq!(entry.state.current_side, Side::Inside);
            if entry.state.current_side == Side::Inside {
                due.push((deadline, entry.geofence.id.clone()));
            }
        }

        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }

    /// Earliest pending deadline, if any enter is waiting.
    pub fn next_deadline(&self, registry: &GeofenceRegistry) -> Option<u64> {
        registry
            .entries()
            .filter_map(|entry| entry.state.pending_enter_since)
            .map(|since| since.saturating_add(self.loitering_delay_ms))
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ContainmentEvaluator;
    use crate::{Geofence, LocationSample};

    const LOITER: u64 = 5 * 60 * 1000;

    fn setup() -> (GeofenceRegistry, ContainmentEvaluator) {
        let mut registry = GeofenceRegistry::new();
        registry.add(Geofence::new("r1", 45.0, 9.0, 300.0)).unwrap();
        registry.add(Geofence::new("r2", 45.0, 9.01, 300.0)).unwrap();
        (registry, ContainmentEvaluator::default())
    }

    fn pass(
        debouncer: &TransitionDebouncer,
        evaluator: &ContainmentEvaluator,
        registry: &mut GeofenceRegistry,
        lat: f64,
        lng: f64,
        now: u64,
    ) -> Vec<String> {
        let candidates = evaluator
            .evaluate(&LocationSample::new(lat, lng, 5.0), registry)
            .unwrap();
        debouncer.on_candidates(registry, &candidates, now)
    }

    #[test]
    fn test_enter_waits_for_loitering() {
        let (mut registry, evaluator) = setup();
        let debouncer = TransitionDebouncer::new(LOITER, true);

        pass(&debouncer, &evaluator, &mut registry, 45.1, 9.0, 0);
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.0, 1_000);
        assert_eq!(debouncer.next_deadline(&registry), Some(1_000 + LOITER));
        assert!(debouncer.fire_due(&mut registry, LOITER).is_empty());
        assert_eq!(debouncer.fire_due(&mut registry, 1_000 + LOITER), vec!["r1"]);
        // Fired once only
        assert!(debouncer.fire_due(&mut registry, 10 * LOITER).is_empty());
        assert_eq!(debouncer.next_deadline(&registry), None);
    }

    #[test]
    fn test_exit_from_unknown_is_silent() {
        let (mut registry, evaluator) = setup();
        let debouncer = TransitionDebouncer::new(LOITER, true);
        let exits = pass(&debouncer, &evaluator, &mut registry, 46.0, 9.0, 0);
        assert!(exits.is_empty());
        assert_eq!(registry.state("r1").unwrap().current_side, Side::Outside);
    }

    #[test]
    fn test_exit_cancels_pending_enter() {
        let (mut registry, evaluator) = setup();
        let debouncer = TransitionDebouncer::new(LOITER, true);

        pass(&debouncer, &evaluator, &mut registry, 45.1, 9.0, 0);
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.0, 0);
        let exits = pass(&debouncer, &evaluator, &mut registry, 45.1, 9.0, 60_000);
        assert_eq!(exits, vec!["r1"]);
        assert!(debouncer.fire_due(&mut registry, 10 * LOITER).is_empty());
    }

    #[test]
    fn test_unconfirmed_exit_suppressed_when_configured() {
        let (mut registry, evaluator) = setup();
        let debouncer = TransitionDebouncer::new(LOITER, false);

        pass(&debouncer, &evaluator, &mut registry, 45.1, 9.0, 0);
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.0, 0);
        let exits = pass(&debouncer, &evaluator, &mut registry, 45.1, 9.0, 60_000);
        assert!(exits.is_empty());

        // A confirmed enter still produces its exit
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.0, 100_000);
        assert_eq!(debouncer.fire_due(&mut registry, 100_000 + LOITER), vec!["r1"]);
        let exits = pass(&debouncer, &evaluator, &mut registry, 45.1, 9.0, 200_000 + LOITER);
        assert_eq!(exits, vec!["r1"]);
    }

    #[test]
    fn test_reentry_restarts_single_timer() {
        let (mut registry, evaluator) = setup();
        let debouncer = TransitionDebouncer::new(LOITER, true);

        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.0, 0);
        // Exit and re-enter: the wait restarts from the re-entry
        pass(&debouncer, &evaluator, &mut registry, 45.1, 9.0, 1_000);
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.0, 2_000);
        assert_eq!(registry.pending_count(), 1);
        assert!(debouncer.fire_due(&mut registry, LOITER + 1_000).is_empty());
        assert_eq!(debouncer.fire_due(&mut registry, LOITER + 2_000), vec!["r1"]);
    }

    #[test]
    fn test_batch_ordered_by_deadline_then_id() {
        let (mut registry, evaluator) = setup();
        registry.add(Geofence::new("r0", 45.0, 9.0, 300.0)).unwrap();
        let debouncer = TransitionDebouncer::new(LOITER, true);

        // r0 and r1 share a center, r2 is ~790m east
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.005, 0);
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.01, 10);
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.005, 20);
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.0, 30);
        // r2 was canceled by its exit at 20
        assert_eq!(debouncer.fire_due(&mut registry, 30 + LOITER), vec!["r0", "r1"]);
    }

    #[test]
    fn test_removed_region_never_fires() {
        let (mut registry, evaluator) = setup();
        let debouncer = TransitionDebouncer::new(LOITER, true);
        pass(&debouncer, &evaluator, &mut registry, 45.0, 9.0, 0);
        registry.remove("r1");
        assert!(debouncer.fire_due(&mut registry, LOITER).is_empty());
        assert_eq!(debouncer.next_deadline(&registry), None);
    }
}
