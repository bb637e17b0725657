//! xtail binary entry point.
//!
//! Usage: xtail [OPTIONS] <KEY>
//!
//! Writes the entries of stream KEY to stdout as JSON lines, from `--start`
//! (or from now) until `--end` or `--count` is reached.

use anyhow::Context;
use clap::Parser;
use observability::{LogConfig, LogFormat};
use std::time::Duration;
use tracing::{error, info};
use xtail::{
    redis_url_from_parts, BoundEncoding, Boundaries, FieldPolicy, RedisSource, TailConfig,
    TailReader,
};

/// xtail: export a Redis stream as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "xtail")]
#[command(about = "Tail a Redis stream between optional bounds as JSON lines")]
#[command(version)]
#[command(disable_help_flag = true)]
struct Args {
    /// Stream key to read.
    key: String,

    /// Redis host.
    #[arg(short = 'h', long, env = "REDIS_HOST", default_value = "localhost")]
    host: String,

    /// Redis port.
    #[arg(short, long, env = "REDIS_PORT", default_value = "6379")]
    port: u16,

    /// Redis ACL username.
    #[arg(long, env = "REDIS_USER")]
    user: Option<String>,

    /// Redis password.
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    pass: Option<String>,

    /// Full Redis URL; overrides host, port, user and pass.
    #[arg(long, env = "REDIS_URL", hide_env_values = true)]
    url: Option<String>,

    /// First entry to emit (inclusive). Without it, only new entries are read.
    #[arg(long)]
    start: Option<String>,

    /// Last entry to emit (inclusive).
    #[arg(long)]
    end: Option<String>,

    /// Stop after emitting this many entries.
    #[arg(long)]
    count: Option<u64>,

    /// How --start and --end are written.
    #[arg(long, value_enum, default_value_t = BoundEncoding::Id)]
    bounds: BoundEncoding,

    /// XREAD block timeout in milliseconds.
    #[arg(long, env = "XTAIL_BLOCK_MS", default_value = "1000")]
    block_ms: u64,

    /// Maximum entries per XREAD.
    #[arg(long, env = "XTAIL_BATCH_SIZE", default_value = "1000")]
    batch_size: usize,

    /// What to do with field values that are not strings.
    #[arg(long, value_enum, default_value_t = FieldPolicy::Omit)]
    unsupported_fields: FieldPolicy,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Write logs to stderr as JSON lines instead of text.
    #[arg(long)]
    log_json: bool,

    /// Print help.
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

fn build_config(args: &Args) -> anyhow::Result<TailConfig> {
    let mut config = TailConfig::new(args.key.clone());

    config.redis_url = match &args.url {
        Some(url) => url.clone(),
        None => redis_url_from_parts(
            &args.host,
            args.port,
            args.user.as_deref(),
            args.pass.as_deref(),
        )?,
    };
    config.block_timeout = Duration::from_millis(args.block_ms);
    config.batch_size = args.batch_size;
    config.field_policy = args.unsupported_fields;

    config.bounds = Boundaries::resolve(
        args.bounds,
        args.start.as_deref(),
        args.end.as_deref(),
        args.count,
    )
    .context("invalid stream bound")?;

    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries records; logs go to stderr only
    observability::init_with_config(LogConfig {
        service_name: "xtail".into(),
        default_level: args.log_level.clone(),
        format: if args.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
    });

    // Bounds are checked before any connection is made.
    let config = build_config(&args)?;

    info!(
        redis_url = %config.redacted_url(),
        stream = %config.stream_key,
        block_ms = config.block_timeout.as_millis() as u64,
        batch_size = config.batch_size,
        "Configuration loaded"
    );

    let source = RedisSource::connect(&config)
        .await
        .with_context(|| format!("failed to connect to {}", config.redacted_url()))?;
    let mut reader = TailReader::new(source, &config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let outcome = tokio::select! {
        result = reader.run(&mut out) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(Ok(reason)) => {
            info!(reason = %reason, emitted = reader.emitted(), "Done");
        }
        Some(Err(e)) => {
            error!(error = %e, cursor = %reader.cursor(), "Tail exited with error");
            return Err(e).with_context(|| format!("failed reading stream {}", config.stream_key));
        }
        None => {
            info!(cursor = %reader.cursor(), "Received shutdown signal, exiting...");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("xtail").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_key_is_required() {
        assert!(Args::try_parse_from(["xtail"]).is_err());
    }

    #[test]
    fn test_short_h_is_host() {
        let args = parse(&["-h", "redis.internal", "-p", "6380", "events"]);
        assert_eq!(args.host, "redis.internal");
        assert_eq!(args.port, 6380);
        assert_eq!(args.key, "events");
    }

    #[test]
    fn test_build_config_resolves_bounds() {
        let args = parse(&["--start", "100-1", "--end", "200", "--count", "3", "events"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.bounds.start, Some(xtail::MessageId::new(100, 1)));
        assert_eq!(config.bounds.end, Some(xtail::MessageId::new(200, 0)));
        assert_eq!(config.bounds.limit, Some(3));
    }

    #[test]
    fn test_build_config_time_bounds() {
        let args = parse(&["--bounds", "time", "--start", "1970-01-01T00:00:01Z", "events"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.bounds.start, Some(xtail::MessageId::new(1000, 0)));
    }

    #[test]
    fn test_build_config_rejects_bad_bound() {
        let args = parse(&["--start", "yesterday", "events"]);
        let err = build_config(&args).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<xtail::TailError>(),
            Some(xtail::TailError::MalformedId { .. })
        ));
    }

    #[test]
    fn test_build_config_url_overrides_parts() {
        let args = parse(&["--url", "redis://other:7000/2", "-h", "ignored", "events"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.redis_url, "redis://other:7000/2");
    }

    #[test]
    fn test_build_config_rejects_zero_block() {
        let args = parse(&["--block-ms", "0", "events"]);
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_negative_count_is_usage_error() {
        assert!(Args::try_parse_from(["xtail", "--count", "-1", "events"]).is_err());
    }
}
