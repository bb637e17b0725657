//! Redis Streams source for xtail.
//!
//! Issues plain `XREAD` (no consumer group, nothing to acknowledge) against a
//! single stream key.

use crate::bounds::Cursor;
use crate::config::TailConfig;
use crate::error::{TailError, TailResult};
use crate::message_id::MessageId;
use crate::source::{FieldValue, RawMessage, StreamSource};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisResult, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Reads one Redis stream with blocking `XREAD`.
pub struct RedisSource {
    conn: MultiplexedConnection,
    stream_key: String,
}

impl RedisSource {
    /// Open a connection to Redis, authenticating if credentials are set.
    pub async fn connect(config: &TailConfig) -> TailResult<Self> {
        let client = Client::open(config.redis_url.as_str()).map_err(TailError::StoreConnection)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(TailError::StoreConnection)?;

        info!(
            redis_url = %config.redacted_url(),
            stream = %config.stream_key,
            "Connected to Redis"
        );

        Ok(Self {
            conn,
            stream_key: config.stream_key.clone(),
        })
    }
}

#[async_trait]
impl StreamSource for RedisSource {
    async fn read_after(
        &mut self,
        cursor: &Cursor,
        block: Duration,
        count: usize,
    ) -> TailResult<Vec<RawMessage>> {
        let block_ms = u64::try_from(block.as_millis()).unwrap_or(u64::MAX);

        // XREAD [COUNT count] [BLOCK milliseconds] STREAMS key id
        let result: RedisResult<Value> = redis::cmd("XREAD")
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.stream_key)
            .arg(cursor.to_string())
            .query_async(&mut self.conn)
            .await;

        match result {
            // Block timeout expired, no messages
            Ok(Value::Nil) => Ok(Vec::new()),
            Ok(value) => {
                let messages = parse_xread_response(value)?;
                debug!(
                    stream = %self.stream_key,
                    cursor = %cursor,
                    batch_len = messages.len(),
                    "Read batch from stream"
                );
                Ok(messages)
            }
            Err(e) => Err(TailError::StoreRead(e)),
        }
    }
}

/// Parse an `XREAD` reply for a single stream.
///
/// RESP2 shape: `[[key, [[id, [f1, v1, f2, v2, ...]], ...]]]`.
/// RESP3 replaces the outer array with a map `{key: [[id, [...]], ...]}`.
fn parse_xread_response(value: Value) -> TailResult<Vec<RawMessage>> {
    let entries = match value {
        Value::Nil => return Ok(Vec::new()),
        Value::Array(streams) => match streams.into_iter().next() {
            None => return Ok(Vec::new()),
            Some(Value::Array(stream)) => {
                let mut parts = stream.into_iter();
                parts.next();
                parts
                    .next()
                    .ok_or_else(|| TailError::Protocol("Stream entry too short".to_string()))?
            }
            Some(other) => {
                return Err(TailError::Protocol(format!(
                    "Expected array for stream entry, got {}",
                    value_kind(&other)
                )))
            }
        },
        Value::Map(streams) => match streams.into_iter().next() {
            None => return Ok(Vec::new()),
            Some((_key, entries)) => entries,
        },
        other => {
            return Err(TailError::Protocol(format!(
                "Unexpected XREAD response type: {}",
                value_kind(&other)
            )))
        }
    };

    let entries = match entries {
        Value::Array(entries) => entries,
        Value::Nil => return Ok(Vec::new()),
        other => {
            return Err(TailError::Protocol(format!(
                "Expected array for messages, got {}",
                value_kind(&other)
            )))
        }
    };

    entries.into_iter().map(parse_entry).collect()
}

fn parse_entry(entry: Value) -> TailResult<RawMessage> {
    let mut parts = match entry {
        Value::Array(parts) => parts.into_iter(),
        other => {
            return Err(TailError::Protocol(format!(
                "Expected array for message, got {}",
                value_kind(&other)
            )))
        }
    };

    let raw_id = match parts.next() {
        Some(Value::BulkString(s)) => String::from_utf8_lossy(&s).into_owned(),
        Some(Value::SimpleString(s)) => s,
        Some(other) => {
            return Err(TailError::Protocol(format!(
                "Expected string for message ID, got {}",
                value_kind(&other)
            )))
        }
        None => return Err(TailError::Protocol("Message entry too short".to_string())),
    };
    let id = MessageId::parse(&raw_id).map_err(|e| TailError::InvalidStoreId {
        input: raw_id.clone(),
        source: Box::new(e),
    })?;

    let fields = match parts.next() {
        Some(Value::Array(f)) => pair_fields(f),
        Some(Value::Map(f)) => f
            .into_iter()
            .filter_map(|(k, v)| Some((field_name(k)?, field_value(v))))
            .collect(),
        // Entries deleted with XDEL can surface with a nil field list
        Some(Value::Nil) | None => Vec::new(),
        Some(other) => {
            return Err(TailError::Protocol(format!(
                "Expected array for fields, got {}",
                value_kind(&other)
            )))
        }
    };

    Ok(RawMessage { id, fields })
}

fn pair_fields(flat: Vec<Value>) -> Vec<(String, FieldValue)> {
    let mut fields = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(name), Some(value)) = (iter.next(), iter.next()) {
        if let Some(name) = field_name(name) {
            fields.push((name, field_value(value)));
        }
    }
    fields
}

fn field_name(value: Value) -> Option<String> {
    match value {
        Value::BulkString(s) => Some(String::from_utf8_lossy(&s).into_owned()),
        Value::SimpleString(s) => Some(s),
        _ => None,
    }
}

fn field_value(value: Value) -> FieldValue {
    match value {
        Value::BulkString(s) => FieldValue::Bytes(s),
        Value::SimpleString(s) => FieldValue::Bytes(s.into_bytes()),
        Value::VerbatimString { text, .. } => FieldValue::Bytes(text.into_bytes()),
        other => FieldValue::Unsupported(value_kind(&other)),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Int(_) => "integer",
        Value::BulkString(_) => "bulk string",
        Value::Array(_) => "array",
        Value::SimpleString(_) => "simple string",
        Value::Okay => "status",
        Value::Map(_) => "map",
        Value::Set(_) => "set",
        Value::Double(_) => "double",
        Value::Boolean(_) => "boolean",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    fn entry(id: &str, fields: &[(&str, Value)]) -> Value {
        let flat = fields
            .iter()
            .flat_map(|(k, v)| [bulk(k), v.clone()])
            .collect();
        Value::Array(vec![bulk(id), Value::Array(flat)])
    }

    #[tokio::test]
    async fn test_connect_failure_is_store_connection_error() {
        // Nothing listens on port 1.
        let mut config = TailConfig::new("s");
        config.redis_url = "redis://127.0.0.1:1".to_string();

        let result = RedisSource::connect(&config).await;
        assert!(matches!(result, Err(TailError::StoreConnection(_))));
    }

    #[tokio::test]
    async fn test_malformed_url_is_store_connection_error() {
        let mut config = TailConfig::new("s");
        config.redis_url = "not a url".to_string();

        let result = RedisSource::connect(&config).await;
        assert!(matches!(result, Err(TailError::StoreConnection(_))));
    }

    #[test]
    fn test_parse_nil_is_empty_batch() {
        assert!(parse_xread_response(Value::Nil).unwrap().is_empty());
    }

    #[test]
    fn test_parse_resp2_reply() {
        let reply = Value::Array(vec![Value::Array(vec![
            bulk("mystream"),
            Value::Array(vec![
                entry("100-0", &[("name", bulk("alice"))]),
                entry("100-1", &[("a", bulk("1")), ("b", bulk("2"))]),
            ]),
        ])]);

        let messages = parse_xread_response(reply).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, MessageId::new(100, 0));
        assert_eq!(
            messages[0].fields,
            vec![("name".to_string(), FieldValue::Bytes(b"alice".to_vec()))]
        );
        assert_eq!(messages[1].id, MessageId::new(100, 1));
        assert_eq!(messages[1].fields.len(), 2);
        assert_eq!(messages[1].fields[0].0, "a");
        assert_eq!(messages[1].fields[1].0, "b");
    }

    #[test]
    fn test_parse_resp3_map_reply() {
        let reply = Value::Map(vec![(
            bulk("mystream"),
            Value::Array(vec![entry("7-3", &[("k", bulk("v"))])]),
        )]);

        let messages = parse_xread_response(reply).unwrap();
        assert_eq!(messages, vec![RawMessage::new(MessageId::new(7, 3), [("k", "v")])]);
    }

    #[test]
    fn test_non_string_values_are_marked_unsupported() {
        let reply = Value::Array(vec![Value::Array(vec![
            bulk("s"),
            Value::Array(vec![entry(
                "1-0",
                &[("n", Value::Int(42)), ("s", bulk("ok"))],
            )]),
        ])]);

        let messages = parse_xread_response(reply).unwrap();
        assert_eq!(
            messages[0].fields,
            vec![
                ("n".to_string(), FieldValue::Unsupported("integer")),
                ("s".to_string(), FieldValue::Bytes(b"ok".to_vec())),
            ]
        );
    }

    #[test]
    fn test_binary_values_are_preserved() {
        let reply = Value::Array(vec![Value::Array(vec![
            bulk("s"),
            Value::Array(vec![entry(
                "1-0",
                &[("blob", Value::BulkString(vec![0xff, 0x00, 0xfe]))],
            )]),
        ])]);

        let messages = parse_xread_response(reply).unwrap();
        assert_eq!(
            messages[0].fields[0].1,
            FieldValue::Bytes(vec![0xff, 0x00, 0xfe])
        );
    }

    #[test]
    fn test_invalid_store_id_is_an_error() {
        let reply = Value::Array(vec![Value::Array(vec![
            bulk("s"),
            Value::Array(vec![entry("not-an-id", &[])]),
        ])]);

        let err = parse_xread_response(reply).unwrap_err();
        assert!(matches!(err, TailError::InvalidStoreId { ref input, .. } if input == "not-an-id"));
    }

    #[test]
    fn test_unexpected_shape_is_protocol_error() {
        let err = parse_xread_response(Value::Int(1)).unwrap_err();
        assert!(matches!(err, TailError::Protocol(_)));

        let err = parse_xread_response(Value::Array(vec![Value::Array(vec![bulk("s")])]))
            .unwrap_err();
        assert!(matches!(err, TailError::Protocol(_)));
    }

    #[test]
    fn test_deleted_entry_has_no_fields() {
        let reply = Value::Array(vec![Value::Array(vec![
            bulk("s"),
            Value::Array(vec![Value::Array(vec![bulk("5-0"), Value::Nil])]),
        ])]);

        let messages = parse_xread_response(reply).unwrap();
        assert_eq!(messages[0].id, MessageId::new(5, 0));
        assert!(messages[0].fields.is_empty());
    }
}
