//! Error types for droneregistry.
//!
//! This module defines the crate-wide error type. Per-record failures
//! ([`DecodeError`](crate::codec::DecodeError),
//! [`ObfuscationError`](crate::codec::ObfuscationError)) live next to the codec
//! and never escape a sync run; everything here is surfaced to callers.

use std::path::PathBuf;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::record::RecordId;

/// The main error type for droneregistry operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Registry Errors ===
    /// The ledger reported itself unavailable.
    #[error("ledger is not available")]
    LedgerUnavailable,

    /// The index blob exists but is not a list of record identifiers.
    #[error("registry index is corrupt: {reason}")]
    IndexCorrupt {
        /// Why the blob was rejected.
        reason: String,
    },

    /// Writing a record failed; the index was not touched.
    #[error("failed to write record under '{key}': {source}")]
    WriteFailed {
        /// Ledger key that was being written.
        key: String,
        /// The underlying ledger error.
        #[source]
        source: LedgerError,
    },

    /// The record was stored but the index update failed.
    ///
    /// Retry with [`Registry::retry_index`](crate::Registry::retry_index).
    #[error("record {id} stored but index update failed: {source}")]
    PartialAppend {
        /// Identifier of the stored, unindexed record.
        id: RecordId,
        /// Why the index update failed.
        #[source]
        source: Box<Error>,
    },

    /// A write was attempted without a connected account.
    #[error("no account connected; connect a wallet before writing")]
    NotAuthenticated,

    /// Caller supplied out-of-range record fields.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the defect.
        message: String,
    },

    /// A ledger call failed for a reason other than unavailability.
    #[error("ledger error: {0}")]
    Ledger(LedgerError),

    // === Storage Errors ===
    /// Failed to open or create the local ledger database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for droneregistry operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<LedgerError> for Error {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable => Self::LedgerUnavailable,
            other => Self::Ledger(other),
        }
    }
}

impl Error {
    /// Create an index corruption error.
    #[must_use]
    pub fn index_corrupt(reason: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wrap an index failure that happened after the record was stored.
    #[must_use]
    pub fn partial_append(id: RecordId, source: Error) -> Self {
        Self::PartialAppend {
            id,
            source: Box::new(source),
        }
    }

    /// Check if this error means the record was stored but left unindexed.
    #[must_use]
    pub fn is_partial_append(&self) -> bool {
        matches!(self, Self::PartialAppend { .. })
    }

    /// The identifier of a stored-but-unindexed record, if any.
    #[must_use]
    pub fn unindexed_record(&self) -> Option<&RecordId> {
        match self {
            Self::PartialAppend { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Check if this error is an index corruption.
    #[must_use]
    pub fn is_index_corrupt(&self) -> bool {
        matches!(self, Self::IndexCorrupt { .. })
    }

    /// Check if the ledger could not be reached at all.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::LedgerUnavailable
                | Self::WriteFailed {
                    source: LedgerError::Unavailable,
                    ..
                }
        )
    }
}
