//! Error types for xtail.

use crate::message_id::MessageId;
use thiserror::Error;

/// xtail error type.
///
/// Every variant is fatal. An empty poll is not an error and never shows up
/// here.
#[derive(Error, Debug)]
pub enum TailError {
    /// A message ID bound does not parse
    #[error("Malformed message ID {input:?}: {reason}")]
    MalformedId { input: String, reason: String },

    /// A calendar-time bound does not parse
    #[error("Malformed timestamp {input:?}: {reason}")]
    MalformedTimestamp { input: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not connect to or authenticate with Redis
    #[error("Redis connection error: {0}")]
    StoreConnection(#[source] redis::RedisError),

    /// XREAD failed
    #[error("Redis read error: {0}")]
    StoreRead(#[source] redis::RedisError),

    /// Unexpected XREAD reply shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Redis returned an entry ID we cannot parse
    #[error("Invalid message ID {input:?} returned by Redis")]
    InvalidStoreId {
        input: String,
        #[source]
        source: Box<TailError>,
    },

    /// The ID's millisecond timestamp has no calendar representation
    #[error("Timestamp of message {0} is out of range")]
    TimestampOutOfRange(MessageId),

    /// A field value is not a byte string and the policy rejects it
    #[error("Message {id} field {field:?} holds an unsupported {kind} value")]
    UnsupportedField {
        id: MessageId,
        field: String,
        kind: &'static str,
    },

    /// IO error writing records
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for xtail operations.
pub type TailResult<T> = Result<T, TailError>;
