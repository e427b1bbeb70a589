//! Serialization helpers for bincode 2.x API compatibility.
//!
//! Log entries, responses, snapshots and RPC payloads all go through these
//! two functions so every node uses the same wire configuration.

use crate::error::RaftError;
use serde::{de::DeserializeOwned, Serialize};

/// Encode a value to bytes using bincode.
///
/// Uses the standard bincode 2.x configuration with variable int encoding.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RaftError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| RaftError::Serialization(e.to_string()))
}

/// Decode a value from bytes using bincode.
///
/// Uses the standard bincode 2.x configuration with variable int encoding.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RaftError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| RaftError::Serialization(e.to_string()))?;
    Ok(value)
}
