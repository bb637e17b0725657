//! Conversion of stream entries into portable JSON records.

use crate::error::{TailError, TailResult};
use crate::message_id::MessageId;
use crate::source::{FieldValue, RawMessage};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat};
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// What to do with field values that are not byte strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FieldPolicy {
    /// Drop the field from the record body
    #[default]
    Omit,
    /// Fail the run
    Reject,
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    /// Canonical `<ms>-<seq>` ID.
    pub id: String,
    /// RFC 3339 UTC instant of the ID's timestamp.
    pub ts: String,
    /// Field values, base64-encoded, keyed by field name.
    pub body: BTreeMap<String, String>,
}

/// Convert a raw entry into its output record.
pub fn transcode(message: &RawMessage, policy: FieldPolicy) -> TailResult<OutputRecord> {
    let mut body = BTreeMap::new();
    for (name, value) in &message.fields {
        match value {
            FieldValue::Bytes(bytes) => {
                body.insert(name.clone(), BASE64.encode(bytes));
            }
            FieldValue::Unsupported(kind) => match policy {
                FieldPolicy::Omit => {
                    debug!(
                        message_id = %message.id,
                        field = %name,
                        kind = *kind,
                        "Omitting non-string field"
                    );
                }
                FieldPolicy::Reject => {
                    return Err(TailError::UnsupportedField {
                        id: message.id,
                        field: name.clone(),
                        kind: *kind,
                    })
                }
            },
        }
    }

    Ok(OutputRecord {
        id: message.id.to_string(),
        ts: format_timestamp(message.id)?,
        body,
    })
}

/// Render the millisecond component of an ID as RFC 3339 UTC.
///
/// Trailing zeros of the fraction are trimmed, so 120 ms renders as `.12Z`
/// and a whole second has no fraction at all.
pub fn format_timestamp(id: MessageId) -> TailResult<String> {
    let millis = i64::try_from(id.timestamp).map_err(|_| TailError::TimestampOutOfRange(id))?;
    let instant = DateTime::from_timestamp_millis(millis).ok_or(TailError::TimestampOutOfRange(id))?;

    // "<date>T<time>.<3 digits>Z"
    let text = instant.to_rfc3339_opts(SecondsFormat::Millis, true);
    let seconds = text
        .trim_end_matches('Z')
        .trim_end_matches('0')
        .trim_end_matches('.');
    Ok(format!("{seconds}Z"))
}
