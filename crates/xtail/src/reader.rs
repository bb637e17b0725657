//! The bounded tail loop.
//!
//! The reader owns the stream source and the cursor. Each iteration it reads
//! the next batch after the cursor and walks it in order:
//!
//! 1. stop if the record limit has been reached
//! 2. advance the cursor to the entry
//! 3. stop, without emitting, if the entry lies past the end bound
//! 4. transcode and write the entry
//!
//! The cursor moves before the end check and before emission, so an entry is
//! never requested twice, whatever happens to it afterwards.

use crate::bounds::{Boundaries, Cursor};
use crate::config::TailConfig;
use crate::error::TailResult;
use crate::source::{RawMessage, StreamSource};
use crate::transcode::{transcode, FieldPolicy, OutputRecord};
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why the reader stopped. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The record limit was reached.
    CountLimitReached,
    /// The end bound was emitted or an entry past it was read.
    EndBoundaryPassed,
    /// Standard output was closed by the consumer.
    OutputClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::CountLimitReached => "count-limit-reached",
            StopReason::EndBoundaryPassed => "end-boundary-passed",
            StopReason::OutputClosed => "output-closed",
        })
    }
}

/// Reader lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Running,
    Stopped(StopReason),
}

/// Tails one stream between optional bounds.
pub struct TailReader<S> {
    source: S,
    bounds: Boundaries,
    cursor: Cursor,
    block_timeout: Duration,
    batch_size: usize,
    field_policy: FieldPolicy,
    emitted: u64,
    state: ReaderState,
}

impl<S: StreamSource> TailReader<S> {
    /// Create a reader positioned just before the configured start bound.
    pub fn new(source: S, config: &TailConfig) -> Self {
        Self {
            source,
            bounds: config.bounds,
            cursor: config.bounds.initial_cursor(),
            block_timeout: config.block_timeout,
            batch_size: config.batch_size,
            field_policy: config.field_policy,
            emitted: 0,
            state: ReaderState::Running,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Records written so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Consume the reader, returning its source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Run until a stop condition is met, writing one JSON line per record.
    ///
    /// Empty polls are retried forever. Any error returned by the source,
    /// the transcoder or the writer ends the run.
    pub async fn run<W: Write>(&mut self, out: &mut W) -> TailResult<StopReason> {
        info!(
            cursor = %self.cursor,
            start = ?self.bounds.start.map(|id| id.to_string()),
            end = ?self.bounds.end.map(|id| id.to_string()),
            limit = ?self.bounds.limit,
            "Starting tail loop"
        );

        loop {
            if let ReaderState::Stopped(reason) = self.state {
                info!(
                    reason = %reason,
                    emitted = self.emitted,
                    cursor = %self.cursor,
                    "Tail loop stopped"
                );
                return Ok(reason);
            }

            // A satisfied limit never waits on another read.
            if self.limit_reached() {
                self.state = ReaderState::Stopped(StopReason::CountLimitReached);
                continue;
            }

            let batch = self
                .source
                .read_after(&self.cursor, self.block_timeout, self.batch_size)
                .await?;

            if batch.is_empty() {
                debug!(cursor = %self.cursor, "No messages available, continuing to poll...");
                continue;
            }

            self.process_batch(batch, out)?;
        }
    }

    fn process_batch<W: Write>(&mut self, batch: Vec<RawMessage>, out: &mut W) -> TailResult<()> {
        for message in batch {
            if self.limit_reached() {
                self.state = ReaderState::Stopped(StopReason::CountLimitReached);
                return Ok(());
            }

            // A redelivered entry at or behind the cursor was already handled.
            if let Cursor::After(cursor) = self.cursor {
                if message.id <= cursor {
                    warn!(
                        message_id = %message.id,
                        cursor = %cursor,
                        "Skipping entry at or before cursor"
                    );
                    continue;
                }
            }

            self.cursor.advance(message.id);

            if let Some(end) = self.bounds.end {
                if message.id > end {
                    debug!(message_id = %message.id, end = %end, "Passed end bound");
                    self.state = ReaderState::Stopped(StopReason::EndBoundaryPassed);
                    return Ok(());
                }
            }

            let record = transcode(&message, self.field_policy)?;
            match write_record(out, &record) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("Output closed by reader");
                    self.state = ReaderState::Stopped(StopReason::OutputClosed);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
            self.emitted += 1;

            // IDs are strictly increasing: nothing after the end bound can
            // qualify, so don't wait for an entry that crosses it.
            if self.bounds.end == Some(message.id) {
                self.state = ReaderState::Stopped(StopReason::EndBoundaryPassed);
                return Ok(());
            }
        }
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        self.bounds.limit.is_some_and(|limit| self.emitted >= limit)
    }
}

/// Write a record as one JSON line and flush it.
fn write_record<W: Write>(out: &mut W, record: &OutputRecord) -> io::Result<()> {
    let line = serde_json::to_string(record)?;
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}
