//! Codec error types

/// Failure to encode or decode a snapshot
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Blob is not standard base64
    #[error("snapshot is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded bytes are not UTF-8
    #[error("snapshot is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Structured document could not be (de)serialized
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
