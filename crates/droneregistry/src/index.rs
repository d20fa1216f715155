//! Registry index.
//!
//! The index is the ordered list of every registered record identifier,
//! stored as a single JSON array of strings under one well-known key.
//!
//! `append` is a read-then-write sequence. The ledger offers no
//! compare-and-swap, so two clients appending concurrently can overwrite each
//! other and one identifier is lost. Fixing that needs an atomic append
//! primitive on the ledger side.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ledger::{with_timeout, LedgerAccessor};
use crate::record::RecordId;

/// Reads and extends the identifier index.
#[derive(Debug, Clone)]
pub struct RegistryIndex {
    ledger: Arc<dyn LedgerAccessor>,
    key: String,
    timeout: Duration,
    overwrite_corrupt: bool,
}

impl RegistryIndex {
    /// Create an index stored under `key`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerAccessor>, key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ledger,
            key: key.into(),
            timeout,
            overwrite_corrupt: false,
        }
    }

    /// Let `append` replace a corrupt index instead of failing.
    ///
    /// Every identifier in the corrupt blob becomes unreachable.
    #[must_use]
    pub fn overwrite_corrupt(mut self, enabled: bool) -> Self {
        self.overwrite_corrupt = enabled;
        self
    }

    /// The ledger key holding the index.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the current index.
    ///
    /// An absent or empty blob is an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexCorrupt`] when the blob is not a JSON array of
    /// strings, or [`Error::LedgerUnavailable`] / [`Error::Ledger`] when the
    /// read fails.
    pub async fn load(&self) -> Result<Vec<RecordId>> {
        let bytes = with_timeout(self.timeout, self.ledger.get(&self.key)).await?;
        parse(&bytes)
    }

    /// Append `id` unless it is already indexed.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be read, is corrupt (and
    /// overwriting is disabled), or cannot be written back.
    pub async fn append(&self, id: &RecordId) -> Result<()> {
        let mut ids = match self.load().await {
            Ok(ids) => ids,
            Err(err @ Error::IndexCorrupt { .. }) if self.overwrite_corrupt => {
                warn!(key = %self.key, error = %err, "Replacing corrupt registry index");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        if ids.contains(id) {
            debug!(%id, "Record already indexed");
            return Ok(());
        }

        ids.push(id.clone());
        let bytes = serde_json::to_vec(&ids)?;
        with_timeout(self.timeout, self.ledger.set(&self.key, &bytes)).await?;

        debug!(%id, len = ids.len(), "Registry index extended");
        Ok(())
    }
}

fn parse(bytes: &[u8]) -> Result<Vec<RecordId>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let text = std::str::from_utf8(bytes).map_err(|e| Error::index_corrupt(e.to_string()))?;
    serde_json::from_str(text).map_err(|e| Error::index_corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerError, MemoryLedger};

    const KEY: &str = "drone_keys";

    fn setup() -> (Arc<MemoryLedger>, RegistryIndex) {
        let ledger = Arc::new(MemoryLedger::new());
        let index = RegistryIndex::new(ledger.clone(), KEY, Duration::from_secs(1));
        (ledger, index)
    }

    #[tokio::test]
    async fn test_load_absent_is_empty() {
        let (_, index) = setup();
        assert!(index.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_preserves_order() {
        let (ledger, index) = setup();
        ledger.insert(KEY, br#"["c","a","b"]"#.to_vec());

        let ids = index.load().await.unwrap();
        assert_eq!(
            ids,
            vec![RecordId::from("c"), RecordId::from("a"), RecordId::from("b")]
        );
    }

    #[tokio::test]
    async fn test_load_corrupt() {
        let (ledger, index) = setup();

        let blobs: [&[u8]; 4] = [b"{not json", b"{\"a\":1}", b"[1,2]", &[0xff, 0xfe]];
        for blob in blobs {
            ledger.insert(KEY, blob.to_vec());
            let err = index.load().await.unwrap_err();
            assert!(err.is_index_corrupt(), "expected corrupt for {blob:?}");
        }
    }

    #[tokio::test]
    async fn test_load_read_failure_is_not_corruption() {
        let (ledger, index) = setup();
        ledger.fail_reads(KEY);

        let err = index.load().await.unwrap_err();
        assert!(matches!(err, Error::Ledger(LedgerError::Backend(_))));
    }

    #[tokio::test]
    async fn test_append_creates_and_extends() {
        let (_, index) = setup();
        index.append(&RecordId::from("a")).await.unwrap();
        index.append(&RecordId::from("b")).await.unwrap();

        assert_eq!(
            index.load().await.unwrap(),
            vec![RecordId::from("a"), RecordId::from("b")]
        );
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let (ledger, index) = setup();
        index.append(&RecordId::from("a")).await.unwrap();
        index.append(&RecordId::from("a")).await.unwrap();

        assert_eq!(index.load().await.unwrap().len(), 1);
        assert_eq!(ledger.write_count(), 1);
    }

    #[tokio::test]
    async fn test_append_refuses_corrupt_index() {
        let (ledger, index) = setup();
        ledger.insert(KEY, b"garbage".to_vec());

        let err = index.append(&RecordId::from("a")).await.unwrap_err();
        assert!(err.is_index_corrupt());
        assert_eq!(ledger.peek(KEY), Some(b"garbage".to_vec()));
    }

    #[tokio::test]
    async fn test_append_overwrites_corrupt_index_when_enabled() {
        let (ledger, index) = setup();
        let index = index.overwrite_corrupt(true);
        ledger.insert(KEY, b"garbage".to_vec());

        index.append(&RecordId::from("a")).await.unwrap();
        assert_eq!(index.load().await.unwrap(), vec![RecordId::from("a")]);
    }

    #[tokio::test]
    async fn test_append_write_failure() {
        let (ledger, index) = setup();
        ledger.fail_writes(KEY);

        let err = index.append(&RecordId::from("a")).await.unwrap_err();
        assert!(matches!(err, Error::Ledger(LedgerError::Backend(_))));
    }

    #[tokio::test]
    async fn test_load_times_out() {
        let (ledger, _) = setup();
        let index = RegistryIndex::new(ledger.clone(), KEY, Duration::from_millis(10));
        ledger.delay_reads(KEY, Duration::from_millis(300));

        let err = index.load().await.unwrap_err();
        assert!(matches!(err, Error::Ledger(LedgerError::Timeout)));
    }
}
