//! Error types for the data model and codecs.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur constructing or encoding model types.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The record payload is not a JSON object.
    #[error("record payload must be a JSON object, got {0}")]
    NotAnObject(String),

    /// The record has no usable `id` field.
    #[error("record is missing a non-empty string `id` field")]
    MissingId,

    /// CBOR encoding failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// A typed record could not be converted.
    #[error("record conversion error: {0}")]
    Conversion(String),
}
