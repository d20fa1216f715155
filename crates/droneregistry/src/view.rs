//! The published registry view.
//!
//! A [`RegistryView`] is an immutable, sorted snapshot. The [`ViewCache`]
//! holds the current one behind an `ArcSwap`: readers always get a complete
//! snapshot, and a sync run replaces it in a single store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::record::{DroneRecord, DroneStatus, RecordId};

/// A decoded snapshot of the registry, newest record first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryView {
    records: Vec<DroneRecord>,
}

impl RegistryView {
    /// Build a view, sorting `records` by timestamp, newest first.
    ///
    /// Records sharing a timestamp have no defined relative order.
    #[must_use]
    pub fn new(mut records: Vec<DroneRecord>) -> Self {
        records.sort_unstable_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self { records }
    }

    /// The records in view order.
    #[must_use]
    pub fn records(&self) -> &[DroneRecord] {
        &self.records
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<&DroneRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Check whether the view holds `id`.
    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Summary counters over the view.
    #[must_use]
    pub fn stats(&self, low_battery_threshold: u8) -> ViewStats {
        let mut stats = ViewStats {
            total: self.records.len(),
            ..ViewStats::default()
        };
        for record in &self.records {
            match record.status {
                DroneStatus::Active => stats.active += 1,
                DroneStatus::Idle => stats.idle += 1,
                DroneStatus::Maintenance => stats.maintenance += 1,
                DroneStatus::Other(_) => stats.other += 1,
            }
            if record.is_low_battery(low_battery_threshold) {
                stats.low_battery += 1;
            }
        }
        stats
    }
}

/// Dashboard counters for a [`RegistryView`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewStats {
    /// All records.
    pub total: usize,
    /// Records with status `active`.
    pub active: usize,
    /// Records with status `idle`.
    pub idle: usize,
    /// Records with status `maintenance`.
    pub maintenance: usize,
    /// Records with any other status.
    pub other: usize,
    /// Records below the low-battery threshold.
    pub low_battery: usize,
}

/// Outcome of offering a view to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The view is now current.
    Accepted,
    /// A run that started later has already published; the view was dropped.
    Superseded,
}

/// Holder of the current [`RegistryView`].
///
/// Each sync run takes a generation from [`ViewCache::begin`] when it starts.
/// [`ViewCache::publish`] drops views from runs older than the one already
/// published, so a slow stale run cannot replace a newer result.
#[derive(Debug)]
pub struct ViewCache {
    current: ArcSwap<RegistryView>,
    next_generation: AtomicU64,
    published_generation: Mutex<u64>,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewCache {
    /// Create a cache holding an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RegistryView::default()),
            next_generation: AtomicU64::new(1),
            published_generation: Mutex::new(0),
        }
    }

    /// The current view.
    #[must_use]
    pub fn load(&self) -> Arc<RegistryView> {
        self.current.load_full()
    }

    /// Reserve a generation for a new sync run.
    pub fn begin(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst)
    }

    /// Generation of the currently published view (0 before the first publish).
    #[must_use]
    pub fn published_generation(&self) -> u64 {
        *self
            .published_generation
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Offer the view produced by run `generation`.
    pub fn publish(&self, generation: u64, view: Arc<RegistryView>) -> Publish {
        let mut published = self
            .published_generation
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if generation < *published {
            return Publish::Superseded;
        }
        self.current.store(view);
        *published = generation;
        Publish::Accepted
    }
}
