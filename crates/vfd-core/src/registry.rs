//! VFD Registry & State Mirror (C4).
//!
//! Populated once at startup and structurally immutable thereafter (§4.4):
//! no drive is ever added or removed after [`Registry::new`]. Each entry's
//! mutable [`DriveState`] is guarded by its own lock so a snapshot read of
//! one drive never blocks on, or observes, a write to another.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;
use vfd_common::types::{DriveDescriptor, DriveState, VfdModel};

struct Entry {
    descriptor: DriveDescriptor,
    state: RwLock<DriveState>,
    poll_fail_count: AtomicU32,
}

/// The drive id plus descriptor fields exposed by `GET /vfds/` (§6), without
/// the mirror.
#[derive(Debug, Clone, Serialize)]
pub struct DriveSummary {
    /// Drive id.
    pub id: String,
    /// Human-readable label.
    pub display_name: String,
    /// Modbus unit address.
    pub slave_id: u8,
    /// Drive family, as a display string.
    pub model: String,
    /// Current consecutive poll failure count.
    pub poll_fail_count: u32,
}

/// The process-scoped keyed store of drive descriptors and mirrors.
pub struct Registry {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
}

impl Registry {
    /// Build a registry from the descriptors loaded at startup. Registration
    /// order is preserved for the Poller's per-cycle iteration order.
    #[must_use]
    pub fn new(descriptors: Vec<DriveDescriptor>) -> Self {
        let mut entries = HashMap::with_capacity(descriptors.len());
        let mut order = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            order.push(descriptor.id.clone());
            entries.insert(
                descriptor.id.clone(),
                Entry {
                    descriptor,
                    state: RwLock::new(DriveState::default()),
                    poll_fail_count: AtomicU32::new(0),
                },
            );
        }
        Self { entries, order }
    }

    /// Whether `id` is a registered drive.
    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Drive ids in registration order, the order the Poller visits them in.
    #[must_use]
    pub fn ids_in_order(&self) -> &[String] {
        &self.order
    }

    /// The static descriptor for `id`.
    #[must_use]
    pub fn get_descriptor(&self, id: &str) -> Option<&DriveDescriptor> {
        self.entries.get(id).map(|e| &e.descriptor)
    }

    /// An atomic snapshot of `id`'s current mirrored state.
    #[must_use]
    pub fn get_state(&self, id: &str) -> Option<DriveState> {
        self.entries
            .get(id)
            .map(|e| e.state.read().expect("state lock poisoned").clone())
    }

    /// Replace `id`'s mirrored state atomically via `f`. Used exclusively by
    /// the Poller and by successful commands (§4.4).
    pub fn update_state(&self, id: &str, f: impl FnOnce(&mut DriveState)) {
        if let Some(entry) = self.entries.get(id) {
            let mut guard = entry.state.write().expect("state lock poisoned");
            f(&mut guard);
        }
    }

    /// Current consecutive poll-failure count for `id`.
    #[must_use]
    pub fn poll_fail_count(&self, id: &str) -> Option<u32> {
        self.entries.get(id).map(|e| e.poll_fail_count.load(Ordering::SeqCst))
    }

    /// Reset `id`'s poll-failure count to zero (on a successful poll, P6).
    pub fn reset_fail_count(&self, id: &str) {
        if let Some(entry) = self.entries.get(id) {
            entry.poll_fail_count.store(0, Ordering::SeqCst);
        }
    }

    /// Increment `id`'s poll-failure count and return the new value.
    pub fn increment_fail_count(&self, id: &str) -> Option<u32> {
        self.entries
            .get(id)
            .map(|e| e.poll_fail_count.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `id`'s drive family has an operative implementation.
    #[must_use]
    pub fn is_supported(&self, id: &str) -> bool {
        matches!(
            self.entries.get(id).map(|e| &e.descriptor.model),
            Some(VfdModel::Frenic)
        )
    }

    /// List every registered drive without its mirror, for `GET /vfds/`.
    #[must_use]
    pub fn summaries(&self) -> Vec<DriveSummary> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| DriveSummary {
                id: entry.descriptor.id.clone(),
                display_name: entry.descriptor.display_name.clone(),
                slave_id: entry.descriptor.slave_id,
                model: entry.descriptor.model.to_string(),
                poll_fail_count: entry.poll_fail_count.load(Ordering::SeqCst),
            })
            .collect()
    }

    /// Snapshot every registered drive's current mirror, keyed by id, for
    /// the WebSocket broadcast (§4.7).
    #[must_use]
    pub fn snapshot_all(&self) -> HashMap<String, DriveState> {
        self.order
            .iter()
            .filter_map(|id| self.get_state(id).map(|state| (id.clone(), state)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfd_common::types::DriveMode;

    fn sample_descriptor(id: &str) -> DriveDescriptor {
        DriveDescriptor {
            id: id.to_string(),
            display_name: format!("{id} label"),
            slave_id: 1,
            model: VfdModel::Frenic,
        }
    }

    #[test]
    fn new_registry_has_offline_zero_state() {
        let registry = Registry::new(vec![sample_descriptor("VFD1")]);
        let state = registry.get_state("VFD1").unwrap();
        assert_eq!(state.cur_drive_mode, DriveMode::Offline);
        assert_eq!(state.cur_frequency, 0.0);
    }

    #[test]
    fn unknown_id_returns_none() {
        let registry = Registry::new(vec![sample_descriptor("VFD1")]);
        assert!(!registry.has("VFD2"));
        assert!(registry.get_state("VFD2").is_none());
    }

    #[test]
    fn update_state_is_visible_to_subsequent_reads() {
        let registry = Registry::new(vec![sample_descriptor("VFD1")]);
        registry.update_state("VFD1", |s| s.tgt_frequency = 42.5);
        assert_eq!(registry.get_state("VFD1").unwrap().tgt_frequency, 42.5);
    }

    #[test]
    fn fail_count_resets_and_increments_per_p6() {
        let registry = Registry::new(vec![sample_descriptor("VFD1")]);
        assert_eq!(registry.poll_fail_count("VFD1"), Some(0));
        assert_eq!(registry.increment_fail_count("VFD1"), Some(1));
        assert_eq!(registry.increment_fail_count("VFD1"), Some(2));
        registry.reset_fail_count("VFD1");
        assert_eq!(registry.poll_fail_count("VFD1"), Some(0));
    }

    #[test]
    fn ids_in_order_preserves_registration_order() {
        let registry = Registry::new(vec![sample_descriptor("A"), sample_descriptor("B")]);
        assert_eq!(registry.ids_in_order(), ["A", "B"]);
    }

    #[test]
    fn summaries_include_poll_fail_count() {
        let registry = Registry::new(vec![sample_descriptor("VFD1")]);
        registry.increment_fail_count("VFD1");
        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].poll_fail_count, 1);
    }
}
