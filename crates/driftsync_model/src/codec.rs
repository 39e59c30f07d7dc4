//! CBOR codec helpers for durable persistence.
//!
//! The conflict store and the event history are persisted as CBOR through
//! these helpers. CBOR keeps the opaque JSON record payloads intact while
//! staying compact on disk.

use crate::error::{ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
///
/// # Errors
///
/// Returns [`ModelError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> ModelResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes)
        .map_err(|e| ModelError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a value from CBOR bytes.
///
/// # Errors
///
/// Returns [`ModelError::Decode`] if the bytes are not valid CBOR for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ModelResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ModelError::Decode(e.to_string()))
}
