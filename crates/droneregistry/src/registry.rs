//! The registry facade.
//!
//! [`Registry`] wires a ledger, the index, the synchronizer and the append
//! coordinator together from a [`Config`]. Presentation code talks only to
//! this type.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::append::{AppendCoordinator, AppendReport};
use crate::config::Config;
use crate::error::Result;
use crate::index::RegistryIndex;
use crate::ledger::{with_timeout, LedgerAccessor};
use crate::record::{NewDrone, RecordId};
use crate::session::Session;
use crate::sync::{SyncOptions, SyncReport, Synchronizer};
use crate::view::{RegistryView, ViewCache, ViewStats};

/// Client-side handle on a ledger-backed drone registry.
#[derive(Debug, Clone)]
pub struct Registry {
    ledger: Arc<dyn LedgerAccessor>,
    synchronizer: Synchronizer,
    appender: AppendCoordinator,
    session: Session,
    timeout: Duration,
    low_battery_threshold: u8,
}

impl Registry {
    /// Build a registry over `ledger` using the key layout and limits in
    /// `config`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerAccessor>, config: &Config, session: Session) -> Self {
        let timeout = config.request_timeout();
        let index = RegistryIndex::new(ledger.clone(), config.registry.index_key.clone(), timeout)
            .overwrite_corrupt(config.registry.overwrite_corrupt_index);
        let options = SyncOptions {
            record_prefix: config.registry.record_prefix.clone(),
            request_timeout: timeout,
            max_concurrent_fetches: config.sync.max_concurrent_fetches,
        };
        let synchronizer = Synchronizer::new(
            ledger.clone(),
            index.clone(),
            Arc::new(ViewCache::new()),
            options,
        );
        let appender = AppendCoordinator::new(
            ledger.clone(),
            index,
            synchronizer.clone(),
            session.clone(),
            timeout,
        );

        Self {
            ledger,
            synchronizer,
            appender,
            session,
            timeout,
            low_battery_threshold: config.sync.low_battery_threshold,
        }
    }

    /// Rebuild the view from the ledger.
    pub async fn sync(&self) -> SyncReport {
        self.synchronizer.sync().await
    }

    /// Register a new drone and resynchronize.
    ///
    /// # Errors
    ///
    /// See [`AppendCoordinator::append_with_id`].
    pub async fn append(&self, fields: NewDrone) -> Result<AppendReport> {
        self.appender.append(fields).await
    }

    /// Index a record left behind by a partial append.
    ///
    /// # Errors
    ///
    /// See [`AppendCoordinator::retry_index`].
    pub async fn retry_index(&self, id: &RecordId) -> Result<SyncReport> {
        self.appender.retry_index(id).await
    }

    /// Ask the ledger whether it is reachable. Errors and timeouts count as
    /// unreachable.
    pub async fn is_available(&self) -> bool {
        match with_timeout(self.timeout, self.ledger.is_available()).await {
            Ok(available) => available,
            Err(err) => {
                debug!(error = %err, "Availability check failed");
                false
            }
        }
    }

    /// The last published view.
    #[must_use]
    pub fn view(&self) -> Arc<RegistryView> {
        self.synchronizer.cache().load()
    }

    /// Dashboard counters over the last published view.
    #[must_use]
    pub fn stats(&self) -> ViewStats {
        self.view().stats(self.low_battery_threshold)
    }

    /// The wallet session gating writes.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}
