//! Error types shared across the crate.

use thiserror::Error;

/// A failed delivery to a single recipient.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("send timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("messaging API rejected the message (status {status}): {description}")]
    Api { status: u16, description: String },
}

/// Errors raised by the subscriber store and its storage backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("subscriber id must not be empty")]
    EmptyId,

    #[error("failed to write subscriber file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize subscriber list: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A malformed inbound request. Reported to the caller as `status: "error"`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("Missing user_id")]
    MissingUserId,
}
