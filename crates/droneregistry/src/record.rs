//! Core record types for droneregistry.
//!
//! This module defines the drone record as presented to callers, its
//! identifier, and the fields a caller supplies when registering a new drone.

use std::fmt;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of random base36 characters appended to generated identifiers.
const ID_SUFFIX_LEN: usize = 5;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque identifier of a registry record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a fresh identifier of the form `drone-<millis>-<suffix>`.
    ///
    /// Uniqueness is probabilistic: the millisecond clock plus five random
    /// base36 characters.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
            .collect();
        Self(format!("drone-{}-{suffix}", Utc::now().timestamp_millis()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Operational status of a drone.
///
/// Values written by other clients that we don't recognize are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DroneStatus {
    /// On the ground, ready.
    #[default]
    Idle,
    /// Flying a mission.
    Active,
    /// Out of service.
    Maintenance,
    /// Any other status string.
    Other(String),
}

impl DroneStatus {
    /// The wire representation of this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Maintenance => "maintenance",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for DroneStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "idle" => Self::Idle,
            "active" => Self::Active,
            "maintenance" => Self::Maintenance,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for DroneStatus {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<DroneStatus> for String {
    fn from(status: DroneStatus) -> Self {
        match status {
            DroneStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DroneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded registry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneRecord {
    /// Identifier the record is stored under.
    pub id: RecordId,

    /// Free-form position; empty when unknown.
    pub position: String,

    /// Operational status.
    pub status: DroneStatus,

    /// Battery level in percent as stored.
    ///
    /// Other clients may have written values above 100; they are kept
    /// verbatim and flagged by [`DroneRecord::has_valid_battery`].
    pub battery: u64,

    /// Obfuscated copy of position, status and battery.
    pub obfuscated_payload: String,

    /// Creation time, unix seconds.
    pub timestamp: i64,
}

impl DroneRecord {
    /// Check if the battery is below the given percentage.
    #[must_use]
    pub fn is_low_battery(&self, threshold: u8) -> bool {
        self.battery < u64::from(threshold)
    }

    /// Check whether the battery is a percentage in 0..=100.
    #[must_use]
    pub fn has_valid_battery(&self) -> bool {
        self.battery <= 100
    }

    /// Position for display, `"Unknown"` when empty.
    #[must_use]
    pub fn display_position(&self) -> &str {
        if self.position.is_empty() {
            "Unknown"
        } else {
            &self.position
        }
    }
}

/// Fields supplied by the caller when registering a drone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDrone {
    /// Free-form position.
    pub position: String,
    /// Initial status.
    pub status: DroneStatus,
    /// Battery level in percent.
    pub battery: u8,
}

impl Default for NewDrone {
    fn default() -> Self {
        Self {
            position: String::new(),
            status: DroneStatus::Idle,
            battery: 100,
        }
    }
}

impl NewDrone {
    /// Create new drone fields.
    #[must_use]
    pub fn new(position: impl Into<String>, status: DroneStatus, battery: u8) -> Self {
        Self {
            position: position.into(),
            status,
            battery,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_format() {
        let id = RecordId::generate();
        let parts: Vec<&str> = id.as_str().splitn(3, '-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "drone");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), ID_SUFFIX_LEN);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_generate_distinct() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_status_round_trip_known() {
        for s in ["idle", "active", "maintenance"] {
            let status = DroneStatus::from(s);
            assert!(!matches!(status, DroneStatus::Other(_)));
            assert_eq!(String::from(status), s);
        }
    }

    #[test]
    fn test_status_unknown_is_preserved() {
        let status = DroneStatus::from("returning");
        assert_eq!(status, DroneStatus::Other("returning".to_string()));
        assert_eq!(status.to_string(), "returning");
    }

    #[test]
    fn test_status_serde_is_plain_string() {
        let json = serde_json::to_string(&DroneStatus::Maintenance).unwrap();
        assert_eq!(json, "\"maintenance\"");

        let status: DroneStatus = serde_json::from_str("\"charging\"").unwrap();
        assert_eq!(status, DroneStatus::Other("charging".to_string()));
    }

    #[test]
    fn test_new_drone_default() {
        let fields = NewDrone::default();
        assert!(fields.position.is_empty());
        assert_eq!(fields.status, DroneStatus::Idle);
        assert_eq!(fields.battery, 100);
    }

    #[test]
    fn test_display_position() {
        let mut record = DroneRecord {
            id: RecordId::from("a"),
            position: String::new(),
            status: DroneStatus::Idle,
            battery: 20,
            obfuscated_payload: String::new(),
            timestamp: 0,
        };
        assert_eq!(record.display_position(), "Unknown");
        assert!(record.is_low_battery(30));

        record.position = "47.6062 N, 122.3321 W".to_string();
        assert_eq!(record.display_position(), "47.6062 N, 122.3321 W");
        assert!(!record.is_low_battery(20));
    }

    #[test]
    fn test_battery_above_100_is_flagged_not_low() {
        let record = DroneRecord {
            id: RecordId::from("a"),
            position: String::new(),
            status: DroneStatus::Active,
            battery: 150,
            obfuscated_payload: String::new(),
            timestamp: 0,
        };
        assert!(!record.has_valid_battery());
        assert!(!record.is_low_battery(30));
    }

    #[test]
    fn test_record_id_display() {
        let id = RecordId::from("drone-42-xyz12");
        assert_eq!(id.to_string(), "drone-42-xyz12");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"drone-42-xyz12\"");
    }
}
