//! Registry synchronization.
//!
//! A sync run reads the index, fetches and decodes every indexed record
//! concurrently, and publishes the sorted result into the [`ViewCache`].
//! Failures are isolated per record: a record that cannot be fetched or
//! decoded is left out and counted, and the rest of the run continues. Only
//! an unreachable ledger stops a run, and then the previous view stays
//! published.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::Error;
use crate::index::RegistryIndex;
use crate::ledger::{with_timeout, LedgerAccessor};
use crate::record::{DroneRecord, RecordId};
use crate::view::{Publish, RegistryView, ViewCache};

/// How a sync run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The run's view is now current.
    Published,
    /// The ledger could not be reached; the previous view is unchanged.
    LedgerUnavailable,
    /// A newer run published first; this run's view was discarded.
    Superseded,
}

impl SyncStatus {
    /// Short human-readable form, matching the serialized name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::LedgerUnavailable => "ledger_unavailable",
            Self::Superseded => "superseded",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run counters. Individual record failures are only reported here and
/// in the logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Distinct identifiers read from the index.
    pub indexed: usize,
    /// Records decoded into the view.
    pub loaded: usize,
    /// Indexed identifiers with no stored record.
    pub missing: usize,
    /// Records whose fetch failed or timed out.
    pub fetch_failed: usize,
    /// Records whose payload could not be decoded.
    pub decode_failed: usize,
    /// Loaded records whose obfuscated payload does not reverse.
    pub payload_defects: usize,
    /// Loaded records whose battery is above 100.
    pub battery_out_of_range: usize,
    /// The index blob was corrupt and treated as empty.
    pub index_corrupt: bool,
}

/// Result of [`Synchronizer::sync`].
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Generation assigned to the run.
    pub generation: u64,
    /// How the run ended.
    pub status: SyncStatus,
    /// The view current after the run.
    pub view: Arc<RegistryView>,
    /// Counters collected during the run.
    pub stats: SyncStats,
}

impl SyncReport {
    /// Check if this run published its view.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == SyncStatus::Published
    }

    /// Check if the ledger was unreachable.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.status == SyncStatus::LedgerUnavailable
    }

    /// Number of indexed records left out of the view.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.stats.missing + self.stats.fetch_failed + self.stats.decode_failed
    }
}

enum Fetched {
    Loaded(DroneRecord),
    Missing,
    FetchFailed,
    DecodeFailed,
}

/// Options controlling a sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Prefix joined with a record id to form its ledger key.
    pub record_prefix: String,
    /// Deadline for each ledger call.
    pub request_timeout: Duration,
    /// Maximum record fetches in flight.
    pub max_concurrent_fetches: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            record_prefix: "drone_".to_string(),
            request_timeout: Duration::from_secs(10),
            max_concurrent_fetches: 8,
        }
    }
}

/// Produces and publishes registry views.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    ledger: Arc<dyn LedgerAccessor>,
    index: RegistryIndex,
    cache: Arc<ViewCache>,
    options: SyncOptions,
}

impl Synchronizer {
    /// Create a synchronizer publishing into `cache`.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerAccessor>,
        index: RegistryIndex,
        cache: Arc<ViewCache>,
        options: SyncOptions,
    ) -> Self {
        Self {
            ledger,
            index,
            cache,
            options,
        }
    }

    /// The cache this synchronizer publishes into.
    #[must_use]
    pub fn cache(&self) -> &Arc<ViewCache> {
        &self.cache
    }

    /// Ledger key for the record `id`.
    #[must_use]
    pub fn record_key(&self, id: &RecordId) -> String {
        format!("{}{id}", self.options.record_prefix)
    }

    /// Run one synchronization.
    ///
    /// Never fails: an unreachable ledger is reported through
    /// [`SyncStatus::LedgerUnavailable`] with the previous view retained.
    pub async fn sync(&self) -> SyncReport {
        let generation = self.cache.begin();
        let mut stats = SyncStats::default();

        if !self.ledger_available().await {
            warn!(generation, "Ledger unavailable, keeping last published view");
            return report(generation, SyncStatus::LedgerUnavailable, self.cache.load(), stats);
        }

        let ids = match self.index.load().await {
            Ok(ids) => ids,
            Err(err @ Error::IndexCorrupt { .. }) => {
                warn!(generation, error = %err, "Registry index corrupt, treating as empty");
                stats.index_corrupt = true;
                Vec::new()
            }
            Err(err) => {
                warn!(generation, key = self.index.key(), error = %err, "Failed to read registry index");
                return report(generation, SyncStatus::LedgerUnavailable, self.cache.load(), stats);
            }
        };

        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<RecordId> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        stats.indexed = ids.len();

        let fetched: Vec<Fetched> = stream::iter(ids)
            .map(|id| self.fetch_record(id))
            .buffer_unordered(self.options.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut records = Vec::with_capacity(fetched.len());
        for outcome in fetched {
            match outcome {
                Fetched::Loaded(record) => {
                    if codec::deobfuscate(&record.obfuscated_payload).is_err() {
                        stats.payload_defects += 1;
                    }
                    if !record.has_valid_battery() {
                        debug!(
                            id = %record.id,
                            battery = record.battery,
                            "Keeping record with battery above 100"
                        );
                        stats.battery_out_of_range += 1;
                    }
                    records.push(record);
                }
                Fetched::Missing => stats.missing += 1,
                Fetched::FetchFailed => stats.fetch_failed += 1,
                Fetched::DecodeFailed => stats.decode_failed += 1,
            }
        }
        stats.loaded = records.len();

        let view = Arc::new(RegistryView::new(records));
        match self.cache.publish(generation, view.clone()) {
            Publish::Accepted => {
                info!(
                    generation,
                    loaded = stats.loaded,
                    indexed = stats.indexed,
                    skipped = stats.missing + stats.fetch_failed + stats.decode_failed,
                    "Registry view published"
                );
                report(generation, SyncStatus::Published, view, stats)
            }
            Publish::Superseded => {
                debug!(generation, "Newer sync already published, discarding result");
                report(generation, SyncStatus::Superseded, self.cache.load(), stats)
            }
        }
    }

    async fn ledger_available(&self) -> bool {
        match with_timeout(self.options.request_timeout, self.ledger.is_available()).await {
            Ok(available) => available,
            Err(err) => {
                debug!(error = %err, "Availability check failed");
                false
            }
        }
    }

    async fn fetch_record(&self, id: RecordId) -> Fetched {
        let key = self.record_key(&id);
        let bytes = match with_timeout(self.options.request_timeout, self.ledger.get(&key)).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(%id, error = %err, "Skipping record, fetch failed");
                return Fetched::FetchFailed;
            }
        };
        if bytes.is_empty() {
            debug!(%id, "Skipping record, nothing stored");
            return Fetched::Missing;
        }
        match codec::decode(&id, &bytes) {
            Ok(record) => Fetched::Loaded(record),
            Err(err) => {
                debug!(%id, error = %err, "Skipping record, decode failed");
                Fetched::DecodeFailed
            }
        }
    }
}

fn report(
    generation: u64,
    status: SyncStatus,
    view: Arc<RegistryView>,
    stats: SyncStats,
) -> SyncReport {
    SyncReport {
        generation,
        status,
        view,
        stats,
    }
}
