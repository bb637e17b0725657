//! Configuration for xtail.

use crate::bounds::Boundaries;
use crate::error::{TailError, TailResult};
use crate::transcode::FieldPolicy;
use std::time::Duration;
use url::Url;

/// Default XREAD block timeout.
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default XREAD COUNT.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// xtail configuration.
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// Redis connection URL, credentials included
    pub redis_url: String,

    /// Key of the stream to tail
    pub stream_key: String,

    /// How long each XREAD may block waiting for entries
    pub block_timeout: Duration,

    /// Maximum entries per XREAD
    pub batch_size: usize,

    /// Resolved start/end bounds and record limit
    pub bounds: Boundaries,

    /// Handling of non-string field values
    pub field_policy: FieldPolicy,
}

impl TailConfig {
    /// Create a config for `stream_key` with default settings.
    pub fn new(stream_key: impl Into<String>) -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_key: stream_key.into(),
            block_timeout: DEFAULT_BLOCK_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            bounds: Boundaries::default(),
            field_policy: FieldPolicy::default(),
        }
    }

    /// Check values that Redis would misinterpret.
    ///
    /// `BLOCK 0` blocks forever and `COUNT 0` means unlimited, so both are
    /// refused rather than passed through.
    pub fn validate(&self) -> TailResult<()> {
        if self.stream_key.is_empty() {
            return Err(TailError::Config("stream key must not be empty".to_string()));
        }
        if self.block_timeout.as_millis() == 0 {
            return Err(TailError::Config(
                "block timeout must be at least 1 ms".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(TailError::Config("batch size must be at least 1".to_string()));
        }
        Url::parse(&self.redis_url)
            .map_err(|e| TailError::Config(format!("invalid Redis URL: {e}")))?;
        Ok(())
    }

    /// The Redis URL with any password masked, for logging.
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.redis_url) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<invalid url>".to_string(),
        }
    }
}

/// Build a `redis://` URL from separate connection settings.
///
/// Credentials are percent-encoded so passwords containing `@` or `:`
/// survive the round trip.
pub fn redis_url_from_parts(
    host: &str,
    port: u16,
    user: Option<&str>,
    pass: Option<&str>,
) -> TailResult<String> {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };

    let mut url = Url::parse(&format!("redis://{host}:{port}"))
        .map_err(|e| TailError::Config(format!("invalid Redis host {host:?}: {e}")))?;

    if let Some(user) = user.filter(|u| !u.is_empty()) {
        url.set_username(user)
            .map_err(|_| TailError::Config("cannot set Redis username".to_string()))?;
    }
    if let Some(pass) = pass.filter(|p| !p.is_empty()) {
        url.set_password(Some(pass))
            .map_err(|_| TailError::Config("cannot set Redis password".to_string()))?;
    }

    Ok(url.to_string())
}
