//! xtail: bounded tail of a Redis stream as JSON lines.
//!
//! xtail reads a stream from an optional start ID to an optional end ID and
//! writes every entry to stdout as
//!
//! ```text
//! {"id":"<ms>-<seq>","ts":"<RFC 3339 UTC>","body":{"<field>":"<base64>"}}
//! ```
//!
//! # Core Invariants
//!
//! 1. **Ordered**: records are written in stream order, one per entry
//! 2. **Exactly Once**: the cursor advances past every entry it reads, so no
//!    entry is emitted twice
//! 3. **Inclusive Bounds**: `start` and `end` are both emitted when present;
//!    the first read starts after `prev(start)`
//! 4. **Read-Only**: no acknowledgements, no consumer groups, no saved state
//!
//! # Architecture
//!
//! ```text
//! Redis Stream --XREAD--> TailReader --transcode--> stdout
//!                            |
//!                          cursor
//! ```

pub mod bounds;
pub mod config;
pub mod error;
pub mod message_id;
pub mod reader;
pub mod redis_source;
pub mod source;
pub mod transcode;

#[cfg(test)]
mod tests;

pub use bounds::{BoundEncoding, Boundaries, Cursor};
pub use config::{redis_url_from_parts, TailConfig};
pub use error::{TailError, TailResult};
pub use message_id::MessageId;
pub use reader::{ReaderState, StopReason, TailReader};
pub use redis_source::RedisSource;
pub use source::{FieldValue, RawMessage, StreamSource};
pub use transcode::{transcode, FieldPolicy, OutputRecord};
