//! # Geofence Registry
//!
//! Holds the monitored regions together with their transition state. The
//! pending-enter timestamp lives on the registry entry itself, so a region can
//! never have more than one pending timer, and removing the region removes its
//! timer in the same step.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::Geofence;

/// Which side of a region boundary the last usable fix was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    Inside,
    Outside,
    /// No fix has been evaluated against this region yet
    #[default]
    Unknown,
}

/// Transition bookkeeping attached to one registered geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionState {
    pub current_side: Side,
    /// Set while an enter is waiting out the loitering delay (monotonic ms)
    pub pending_enter_since: Option<u64>,
}

impl TransitionState {
    pub fn is_pending_enter(&self) -> bool {
        self.pending_enter_since.is_some()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RegistryEntry {
    pub(crate) geofence: Geofence,
    pub(crate) state: TransitionState,
}

/// The set of monitored geofences, keyed by id.
#[derive(Debug, Default)]
pub struct GeofenceRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl GeofenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a geofence by id.
    ///
    /// Replacing resets the region's transition state (and so drops its
    /// pending enter), since the region may have moved or changed size.
    /// Returns the geofence previously registered under the same id.
    pub fn add(&mut self, geofence: Geofence) -> Result<Option<Geofence>> {
        geofence.validate()?;
        Ok(self.insert(geofence))
    }

    /// Insert without validating; callers validate the whole batch first.
    pub(crate) fn insert(&mut self, geofence: Geofence) -> Option<Geofence> {
        let previous = self.entries.insert(
            geofence.id.clone(),
            RegistryEntry {
                geofence,
                state: TransitionState::default(),
            },
        );
        previous.map(|entry| entry.geofence)
    }

    /// Remove a geofence if present. Absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Geofence> {
        self.entries.remove(id).map(|entry| entry.geofence)
    }

    /// Remove every geofence (and with them every pending enter).
    /// Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Snapshot of registered geofences, sorted by id.
    pub fn list(&self) -> Vec<Geofence> {
        self.entries
            .values()
            .map(|entry| entry.geofence.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Geofence> {
        self.entries.get(id).map(|entry| &entry.geofence)
    }

    pub fn state(&self, id: &str) -> Option<TransitionState> {
        self.entries.get(id).map(|entry| entry.state)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of regions currently waiting out the loitering delay.
    pub fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state.is_pending_enter())
            .count()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut RegistryEntry> {
        self.entries.values_mut()
    }

    pub(crate) fn entry_mut(&mut self, id: &str) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(id)
    }
}
