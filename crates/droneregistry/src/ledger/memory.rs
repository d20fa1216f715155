//! In-process ledger backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::trace;

use super::{LedgerAccessor, LedgerError, Result};

#[derive(Debug, Default)]
struct Faults {
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    read_delays: HashMap<String, Duration>,
}

/// A ledger held in memory.
///
/// Besides plain storage it can simulate an unreachable ledger, per-key read
/// and write failures, and slow reads, which makes it the backend of choice
/// for exercising degraded sync paths.
#[derive(Debug)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    faults: Mutex<Faults>,
    available: AtomicBool,
    writes: AtomicU64,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Create an empty, available ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
        }
    }

    /// Store a value directly, bypassing fault injection and write counting.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        lock(&self.entries).insert(key.into(), value.into());
    }

    /// Read a value directly, bypassing fault injection.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.entries).get(key).cloned()
    }

    /// Mark the ledger available or unavailable.
    ///
    /// While unavailable, every call fails with [`LedgerError::Unavailable`]
    /// and `is_available` returns `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make reads of `key` fail.
    pub fn fail_reads(&self, key: impl Into<String>) {
        lock(&self.faults).failing_reads.insert(key.into());
    }

    /// Make writes of `key` fail.
    pub fn fail_writes(&self, key: impl Into<String>) {
        lock(&self.faults).failing_writes.insert(key.into());
    }

    /// Delay reads of `key` by `delay`.
    pub fn delay_reads(&self, key: impl Into<String>, delay: Duration) {
        lock(&self.faults).read_delays.insert(key.into(), delay);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        *lock(&self.faults) = Faults::default();
    }

    /// Number of successful `set` calls.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unavailable)
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait::async_trait]
impl LedgerAccessor for MemoryLedger {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.ensure_available()?;

        let (failing, delay) = {
            let faults = lock(&self.faults);
            (
                faults.failing_reads.contains(key),
                faults.read_delays.get(key).copied(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(LedgerError::backend(format!("injected read failure for {key}")));
        }

        trace!(key, "memory ledger read");
        Ok(lock(&self.entries).get(key).cloned().unwrap_or_default())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_available()?;

        if lock(&self.faults).failing_writes.contains(key) {
            return Err(LedgerError::backend(format!("injected write failure for {key}")));
        }

        lock(&self.entries).insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        trace!(key, len = value.len(), "memory ledger write");
        Ok(())
    }

    async fn is_available(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key_is_empty() {
        let ledger = MemoryLedger::new();
        assert!(ledger.get("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let ledger = MemoryLedger::new();
        ledger.set("k", b"v").await.unwrap();

        assert_eq!(ledger.get("k").await.unwrap(), b"v");
        assert_eq!(ledger.write_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let ledger = MemoryLedger::new();
        ledger.set_available(false);

        assert!(!ledger.is_available().await.unwrap());
        assert_eq!(ledger.get("k").await, Err(LedgerError::Unavailable));
        assert_eq!(ledger.set("k", b"v").await, Err(LedgerError::Unavailable));
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let ledger = MemoryLedger::new();
        ledger.insert("a", b"1".to_vec());
        ledger.fail_reads("a");
        ledger.fail_writes("b");

        assert!(matches!(ledger.get("a").await, Err(LedgerError::Backend(_))));
        assert!(matches!(
            ledger.set("b", b"2").await,
            Err(LedgerError::Backend(_))
        ));
        assert_eq!(ledger.write_count(), 0);

        ledger.clear_faults();
        assert_eq!(ledger.get("a").await.unwrap(), b"1");
        ledger.set("b", b"2").await.unwrap();
        assert_eq!(ledger.peek("b"), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_delayed_read() {
        let ledger = MemoryLedger::new();
        ledger.insert("slow", b"x".to_vec());
        ledger.delay_reads("slow", Duration::from_millis(20));

        let started = std::time::Instant::now();
        assert_eq!(ledger.get("slow").await.unwrap(), b"x");
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
