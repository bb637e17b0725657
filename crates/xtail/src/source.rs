//! The blocking-read seam between the tail loop and the stream store.

use crate::bounds::Cursor;
use crate::error::TailResult;
use crate::message_id::MessageId;
use async_trait::async_trait;
use std::time::Duration;

/// A field value as delivered by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A byte string payload.
    Bytes(Vec<u8>),
    /// Any other value kind (integer, array, ...). Carries the kind name for
    /// diagnostics.
    Unsupported(&'static str),
}

/// One stream entry as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: MessageId,
    /// Field/value pairs in the order the store returned them.
    pub fields: Vec<(String, FieldValue)>,
}

impl RawMessage {
    /// Build a message whose fields are all byte strings.
    pub fn new<K, V>(id: MessageId, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            id,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), FieldValue::Bytes(v.into())))
                .collect(),
        }
    }
}

/// A stream that can be read after a position, blocking for new entries.
#[async_trait]
pub trait StreamSource: Send {
    /// Read up to `count` entries with an ID strictly greater than `cursor`.
    ///
    /// Blocks up to `block` waiting for entries. Returns an empty batch when
    /// the wait expires; errors are reserved for genuine store failures.
    /// Entries come back in increasing ID order.
    async fn read_after(
        &mut self,
        cursor: &Cursor,
        block: Duration,
        count: usize,
    ) -> TailResult<Vec<RawMessage>>;
}
