//! Start/end bounds and the read cursor.
//!
//! Bounds are given on the command line either as raw message IDs or as
//! calendar timestamps. Both are resolved to [`MessageId`]s once, when the
//! configuration is built, so the read loop only ever compares IDs.

use crate::error::{TailError, TailResult};
use crate::message_id::MessageId;
use chrono::DateTime;
use clap::ValueEnum;
use std::fmt;

/// How `--start` / `--end` text is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum BoundEncoding {
    /// Raw stream IDs: `<ms>[-<seq>]`
    #[default]
    Id,
    /// RFC 3339 timestamps, e.g. `2024-05-01T12:00:00Z`
    Time,
}

impl BoundEncoding {
    /// Resolve an inclusive start bound.
    ///
    /// A timestamp maps to the first possible ID in that millisecond.
    pub fn resolve_start(self, text: &str) -> TailResult<MessageId> {
        match self {
            BoundEncoding::Id => MessageId::parse(text),
            BoundEncoding::Time => Ok(MessageId::new(parse_millis(text)?, 0)),
        }
    }

    /// Resolve an inclusive end bound.
    ///
    /// A timestamp maps to the last possible ID in that millisecond, so
    /// every entry written during it is included.
    pub fn resolve_end(self, text: &str) -> TailResult<MessageId> {
        match self {
            BoundEncoding::Id => MessageId::parse(text),
            BoundEncoding::Time => Ok(MessageId::new(parse_millis(text)?, u64::MAX)),
        }
    }
}

fn parse_millis(text: &str) -> TailResult<u64> {
    let instant = DateTime::parse_from_rfc3339(text).map_err(|e| TailError::MalformedTimestamp {
        input: text.to_string(),
        reason: e.to_string(),
    })?;
    u64::try_from(instant.timestamp_millis()).map_err(|_| TailError::MalformedTimestamp {
        input: text.to_string(),
        reason: "before the Unix epoch".to_string(),
    })
}

/// Inclusive bounds and the emitted-message limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boundaries {
    /// First ID to emit (inclusive).
    pub start: Option<MessageId>,
    /// Last ID to emit (inclusive).
    pub end: Option<MessageId>,
    /// Maximum number of records to emit.
    pub limit: Option<u64>,
}

impl Boundaries {
    /// Resolve user-supplied bound text with the given encoding.
    pub fn resolve(
        encoding: BoundEncoding,
        start: Option<&str>,
        end: Option<&str>,
        limit: Option<u64>,
    ) -> TailResult<Self> {
        Ok(Self {
            start: start.map(|s| encoding.resolve_start(s)).transpose()?,
            end: end.map(|e| encoding.resolve_end(e)).transpose()?,
            limit,
        })
    }

    /// The cursor the first read starts after.
    pub fn initial_cursor(&self) -> Cursor {
        match self.start {
            Some(start) => Cursor::before(start),
            None => Cursor::NewOnly,
        }
    }
}

/// The position the next read requests entries after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Only entries added after the read is issued (`$`).
    ///
    /// The sentinel is re-sent on every read until an entry arrives, and each
    /// read resolves it afresh. An entry appended between two such reads,
    /// while no read is blocked, is not seen.
    NewOnly,
    /// Entries with an ID strictly greater than this one.
    After(MessageId),
}

impl Cursor {
    /// A cursor whose next read includes `id` itself.
    ///
    /// `0-0` has no predecessor, but reading after `0-0` already returns
    /// every entry since no stored entry can have that ID.
    pub fn before(id: MessageId) -> Self {
        Cursor::After(id.prev().unwrap_or(MessageId::MIN))
    }

    /// Move the cursor to an entry just read.
    pub fn advance(&mut self, id: MessageId) {
        *self = Cursor::After(id);
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::NewOnly => f.write_str("$"),
            Cursor::After(id) => write!(f, "{id}"),
        }
    }
}
