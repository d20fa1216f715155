//! Ledger access abstraction.
//!
//! The registry treats the ledger as an opaque key/value store. Reads need no
//! credentials; writes are expected to go through an authenticated session.
//! Two backends ship with the crate:
//!
//! - [`MemoryLedger`]: in-process map with fault injection, for tests and
//!   embedding.
//! - [`SqliteLedger`]: a local `SQLite` key/value table used by the CLI.

mod memory;
mod sqlite;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

/// Errors reported by a ledger backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger cannot serve requests.
    #[error("ledger unavailable")]
    Unavailable,

    /// The call did not finish within its deadline.
    #[error("ledger call timed out")]
    Timeout,

    /// The backend rejected or failed the call.
    #[error("ledger backend error: {0}")]
    Backend(String),
}

impl LedgerError {
    /// Create a new backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Result type for ledger calls.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// A key/value ledger the registry is synchronized against.
///
/// `get` returns an empty vector for keys that were never set.
#[async_trait::async_trait]
pub trait LedgerAccessor: Send + Sync + std::fmt::Debug {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Check whether the ledger is currently serving requests.
    async fn is_available(&self) -> Result<bool>;
}

/// Bound a ledger call by `deadline`, mapping expiry to [`LedgerError::Timeout`].
pub(crate) async fn with_timeout<F, T>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout),
    }
}
