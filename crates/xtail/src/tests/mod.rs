//! Behaviour tests for the tail loop.
//!
//! - `harness.rs`    - MockStream (XREAD semantics in memory) and helpers
//! - `boundaries.rs` - inclusive start/end bounds and the initial cursor
//! - `limits.rs`     - record limits and their interaction with bounds
//! - `ordering.rs`   - stream order, exactly-once emission, cursor advance
//! - `polling.rs`    - empty polls, live tail from `$`, read parameters
//! - `errors.rs`     - fatal store, transcoding and output errors
//! - `output.rs`     - record format on the wire
