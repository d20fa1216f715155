//! Appending new records.
//!
//! An append writes the record first and the index second. A failed record
//! write leaves the index untouched, so the index never points at a missing
//! record. A failed index write leaves a stored but invisible record, which is
//! reported as [`Error::PartialAppend`] and can be repaired with
//! [`AppendCoordinator::retry_index`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::codec::{self, PayloadFields};
use crate::error::{Error, Result};
use crate::index::RegistryIndex;
use crate::ledger::{with_timeout, LedgerAccessor};
use crate::record::{DroneRecord, NewDrone, RecordId};
use crate::session::Session;
use crate::sync::{SyncReport, Synchronizer};

/// Result of a successful append.
#[derive(Debug, Clone)]
pub struct AppendReport {
    /// The record as written.
    pub record: DroneRecord,
    /// The resynchronization that followed the write.
    ///
    /// A refresh that did not publish does not undo the append.
    pub refresh: SyncReport,
}

impl AppendReport {
    /// Identifier of the new record.
    #[must_use]
    pub fn id(&self) -> &RecordId {
        &self.record.id
    }
}

/// Writes records and keeps the index consistent with them.
#[derive(Debug, Clone)]
pub struct AppendCoordinator {
    ledger: Arc<dyn LedgerAccessor>,
    index: RegistryIndex,
    synchronizer: Synchronizer,
    session: Session,
    timeout: Duration,
}

impl AppendCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn LedgerAccessor>,
        index: RegistryIndex,
        synchronizer: Synchronizer,
        session: Session,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            index,
            synchronizer,
            session,
            timeout,
        }
    }

    /// Register a new drone under a freshly generated id.
    ///
    /// # Errors
    ///
    /// See [`AppendCoordinator::append_with_id`].
    pub async fn append(&self, fields: NewDrone) -> Result<AppendReport> {
        self.append_with_id(RecordId::generate(), fields).await
    }

    /// Register a new drone under `id`.
    ///
    /// The caller is responsible for `id` not colliding with an indexed
    /// record; a collision replaces that record's payload.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAuthenticated`] when no account is connected.
    /// - [`Error::InvalidInput`] when the battery is above 100.
    /// - [`Error::WriteFailed`] when the record could not be stored.
    /// - [`Error::PartialAppend`] when the record was stored but the index
    ///   update failed.
    pub async fn append_with_id(&self, id: RecordId, fields: NewDrone) -> Result<AppendReport> {
        if !self.session.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }
        if fields.battery > 100 {
            return Err(Error::invalid_input(format!(
                "battery must be between 0 and 100, got {}",
                fields.battery
            )));
        }

        let payload = PayloadFields {
            position: fields.position.clone(),
            status: fields.status.clone(),
            battery: fields.battery,
        };
        let record = DroneRecord {
            id: id.clone(),
            position: fields.position,
            status: fields.status,
            battery: u64::from(fields.battery),
            obfuscated_payload: codec::obfuscate(&payload)?,
            timestamp: Utc::now().timestamp(),
        };
        let bytes = codec::encode(&record)?;

        let key = self.synchronizer.record_key(&id);
        with_timeout(self.timeout, self.ledger.set(&key, &bytes))
            .await
            .map_err(|source| Error::WriteFailed {
                key: key.clone(),
                source,
            })?;
        info!(%id, "Record stored");

        if let Err(err) = self.index.append(&id).await {
            warn!(%id, error = %err, "Record stored but index update failed");
            return Err(Error::partial_append(id, err));
        }

        let refresh = self.refresh(&id).await;
        Ok(AppendReport { record, refresh })
    }

    /// Index a record left unindexed by an earlier [`Error::PartialAppend`],
    /// then resynchronize.
    ///
    /// The record payload is not rewritten.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] when nothing is stored under `id`.
    /// - [`Error::LedgerUnavailable`] or [`Error::Ledger`] when the record
    ///   cannot be read.
    /// - [`Error::PartialAppend`] when the index update fails again.
    pub async fn retry_index(&self, id: &RecordId) -> Result<SyncReport> {
        if !self.session.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }

        let key = self.synchronizer.record_key(id);
        let stored = with_timeout(self.timeout, self.ledger.get(&key)).await?;
        if stored.is_empty() {
            return Err(Error::invalid_input(format!("no record stored for {id}")));
        }

        if let Err(err) = self.index.append(id).await {
            warn!(%id, error = %err, "Index retry failed");
            return Err(Error::partial_append(id.clone(), err));
        }
        info!(%id, "Record indexed");

        Ok(self.refresh(id).await)
    }

    async fn refresh(&self, id: &RecordId) -> SyncReport {
        let report = self.synchronizer.sync().await;
        if !report.is_published() {
            warn!(%id, status = ?report.status, "Refresh after append did not publish");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerError, MemoryLedger};
    use crate::record::DroneStatus;
    use crate::sync::{SyncOptions, SyncStatus};
    use crate::view::ViewCache;

    const INDEX_KEY: &str = "drone_keys";

    fn setup(session: Session) -> (Arc<MemoryLedger>, AppendCoordinator) {
        let ledger = Arc::new(MemoryLedger::new());
        let timeout = Duration::from_secs(1);
        let index = RegistryIndex::new(ledger.clone(), INDEX_KEY, timeout);
        let synchronizer = Synchronizer::new(
            ledger.clone(),
            index.clone(),
            Arc::new(ViewCache::new()),
            SyncOptions::default(),
        );
        let coordinator =
            AppendCoordinator::new(ledger.clone(), index, synchronizer, session, timeout);
        (ledger, coordinator)
    }

    fn fields() -> NewDrone {
        NewDrone::new("47.6 N, 122.3 W", DroneStatus::Active, 80)
    }

    #[tokio::test]
    async fn test_append_then_visible() {
        let (ledger, coordinator) = setup(Session::connected("0xabc"));

        let report = coordinator.append(fields()).await.unwrap();
        assert!(report.refresh.is_published());
        assert!(report.refresh.view.contains(report.id()));

        let stored = ledger.peek(&format!("drone_{}", report.id())).unwrap();
        let decoded = codec::decode(report.id(), &stored).unwrap();
        assert_eq!(decoded, report.record);

        let payload = codec::deobfuscate(&decoded.obfuscated_payload).unwrap();
        assert_eq!(payload.position, "47.6 N, 122.3 W");
        assert_eq!(payload.battery, 80);
    }

    #[tokio::test]
    async fn test_append_requires_session() {
        let (ledger, coordinator) = setup(Session::new());

        let err = coordinator.append(fields()).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
        assert_eq!(ledger.write_count(), 0);
    }

    #[tokio::test]
    async fn test_append_rejects_battery_out_of_range() {
        let (ledger, coordinator) = setup(Session::connected("0xabc"));
        let mut bad = fields();
        bad.battery = 101;

        let err = coordinator.append(bad).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert_eq!(ledger.write_count(), 0);
    }

    #[tokio::test]
    async fn test_record_write_failure_leaves_index_alone() {
        let (ledger, coordinator) = setup(Session::connected("0xabc"));
        let id = RecordId::from("drone-1-fixed");
        ledger.fail_writes("drone_drone-1-fixed");

        let err = coordinator.append_with_id(id, fields()).await.unwrap_err();
        assert!(matches!(err, Error::WriteFailed { .. }));
        assert!(!err.is_partial_append());
        assert!(ledger.peek(INDEX_KEY).is_none());
    }

    #[tokio::test]
    async fn test_index_failure_is_partial_append_and_retry_heals() {
        let (ledger, coordinator) = setup(Session::connected("0xabc"));
        let id = RecordId::from("drone-2-fixed");
        ledger.fail_writes(INDEX_KEY);

        let err = coordinator
            .append_with_id(id.clone(), fields())
            .await
            .unwrap_err();
        assert!(err.is_partial_append());
        assert_eq!(err.unindexed_record(), Some(&id));
        assert!(ledger.peek("drone_drone-2-fixed").is_some());
        assert!(ledger.peek(INDEX_KEY).is_none());

        ledger.clear_faults();
        let writes_before = ledger.write_count();
        let report = coordinator.retry_index(&id).await.unwrap();

        assert!(report.view.contains(&id));
        assert_eq!(ledger.write_count(), writes_before + 1);
    }

    #[tokio::test]
    async fn test_retry_index_refuses_unstored_record() {
        let (ledger, coordinator) = setup(Session::connected("0xabc"));

        let err = coordinator
            .retry_index(&RecordId::from("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert!(ledger.peek(INDEX_KEY).is_none());
    }

    #[tokio::test]
    async fn test_unreadable_new_record_does_not_fail_append() {
        let (ledger, coordinator) = setup(Session::connected("0xabc"));
        let id = RecordId::from("drone-3-fixed");
        ledger.fail_reads("drone_drone-3-fixed");

        let report = coordinator.append_with_id(id.clone(), fields()).await.unwrap();
        assert_eq!(report.refresh.status, SyncStatus::Published);
        assert!(!report.refresh.view.contains(&id));
        assert_eq!(report.refresh.stats.fetch_failed, 1);
    }

    #[tokio::test]
    async fn test_append_when_ledger_down() {
        let (ledger, coordinator) = setup(Session::connected("0xabc"));
        ledger.set_available(false);

        let err = coordinator.append(fields()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::WriteFailed {
                source: LedgerError::Unavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_retry_index_when_ledger_down() {
        let (ledger, coordinator) = setup(Session::connected("0xabc"));
        ledger.set_available(false);

        let err = coordinator
            .retry_index(&RecordId::from("drone-4-fixed"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LedgerUnavailable));
        assert!(err.is_unavailable());
    }
}
