//! `droneregistry` - client-side synchronization for a ledger-backed drone registry
//!
//! The registry is stored on a key/value ledger as one index blob listing
//! record identifiers plus one blob per drone. This library keeps a local,
//! sorted view of those records in step with the ledger and appends new
//! records without leaving the index pointing at missing data.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod append;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod ledger;
pub mod logging;
pub mod record;
pub mod registry;
pub mod session;
pub mod sync;
pub mod view;

pub use append::{AppendCoordinator, AppendReport};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{LedgerAccessor, LedgerError, MemoryLedger, SqliteLedger};
pub use logging::init_logging;
pub use record::{DroneRecord, DroneStatus, NewDrone, RecordId};
pub use registry::Registry;
pub use session::Session;
pub use sync::{SyncReport, SyncStats, SyncStatus};
pub use view::{RegistryView, ViewStats};
