//! MessagePack encoding for wire messages and persisted records.
//!
//! Structs are encoded with field names so that optional fields and repeated
//! fields stay distinguishable across versions.

use crate::core::{MetaError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value)
        .map_err(|e| MetaError::Internal(format!("Failed to encode message: {}", e)))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| MetaError::InvalidArgument(format!("Failed to decode message: {}", e)))
}
