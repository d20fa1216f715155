//! Record codec.
//!
//! Records are stored as UTF-8 JSON objects:
//!
//! ```json
//! {"position":"...","status":"idle","battery":100,"encryptedData":"FHE-...","timestamp":1700000000}
//! ```
//!
//! The `encryptedData` field carries an obfuscated copy of the plain fields.
//! The transform is base64 behind a fixed prefix. It is reversible by anyone
//! and provides no confidentiality.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{DroneRecord, DroneStatus, RecordId};

/// Prefix marking an obfuscated payload.
pub const PAYLOAD_PREFIX: &str = "FHE-";

/// Errors produced when a record blob cannot be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The blob is not valid UTF-8.
    #[error("record is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The blob does not match the record schema.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors produced when an obfuscated payload cannot be reversed.
#[derive(Debug, Error)]
pub enum ObfuscationError {
    /// The payload does not start with [`PAYLOAD_PREFIX`].
    #[error("payload is missing the 'FHE-' prefix")]
    MissingPrefix,

    /// The payload body is not base64.
    #[error("payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The decoded payload is not the expected field set.
    #[error("payload fields are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The plain fields hidden inside an obfuscated payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadFields {
    /// Free-form position.
    pub position: String,
    /// Operational status.
    pub status: DroneStatus,
    /// Battery level in percent.
    pub battery: u8,
}

/// On-ledger shape of a record.
#[derive(Debug, Serialize, Deserialize)]
struct RecordWire {
    #[serde(default)]
    position: String,
    status: String,
    battery: u64,
    #[serde(rename = "encryptedData", default)]
    encrypted_data: String,
    timestamp: i64,
}

/// Serialize a record into its ledger payload.
///
/// The record id is not part of the payload; it is the ledger key.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode(record: &DroneRecord) -> Result<Vec<u8>, serde_json::Error> {
    let wire = RecordWire {
        position: record.position.clone(),
        status: record.status.as_str().to_string(),
        battery: record.battery,
        encrypted_data: record.obfuscated_payload.clone(),
        timestamp: record.timestamp,
    };
    serde_json::to_vec(&wire)
}

/// Decode a ledger payload into the record stored under `id`.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the payload is not a well-formed record.
/// A battery above 100 is not a decode failure; the value is kept as stored.
pub fn decode(id: &RecordId, bytes: &[u8]) -> Result<DroneRecord, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    let wire: RecordWire = serde_json::from_str(text)?;

    Ok(DroneRecord {
        id: id.clone(),
        position: wire.position,
        status: DroneStatus::from(wire.status),
        battery: wire.battery,
        obfuscated_payload: wire.encrypted_data,
        timestamp: wire.timestamp,
    })
}

/// Obfuscate the plain fields of a record.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn obfuscate(fields: &PayloadFields) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(fields)?;
    Ok(format!("{PAYLOAD_PREFIX}{}", STANDARD.encode(json)))
}

/// Reverse [`obfuscate`].
///
/// # Errors
///
/// Returns an [`ObfuscationError`] when the payload was not produced by
/// [`obfuscate`] or has been damaged.
pub fn deobfuscate(payload: &str) -> Result<PayloadFields, ObfuscationError> {
    let body = payload
        .strip_prefix(PAYLOAD_PREFIX)
        .ok_or(ObfuscationError::MissingPrefix)?;
    let json = STANDARD.decode(body)?;
    Ok(serde_json::from_slice(&json)?)
}
