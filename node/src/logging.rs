//! # Structured Logging
//!
//! Tracing-subscriber setup for the daemon. The filter defaults come from
//! [`default_directives`] and quiet the chattier dependencies (sled logs
//! every flush at info); `RUST_LOG` overrides them entirely when set.
//!
//! All log output goes to stderr so stdout stays clean for structured
//! data (the `status` subcommand prints JSON there).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored output. Suitable for local development.
    Pretty,
    /// Machine-parseable JSON lines. Suitable for production log aggregation.
    Json,
}

impl LogFormat {
    /// Parse a format string. Accepts "json" or "pretty" (case-insensitive).
    /// Returns `Pretty` for any unrecognized value.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// The daemon's default filter directives when `RUST_LOG` is unset.
///
/// Our own crates log at `info`, sled is held to `warn` (its flush chatter
/// drowns everything else at scale), and per-request HTTP traces sit at
/// `debug` so they only appear when explicitly asked for.
pub fn default_directives() -> String {
    [
        "info",
        "attestify_node=info",
        "attestify_vault=info",
        "sled=warn",
        "tower_http=debug",
    ]
    .join(",")
}

/// Initialize the global tracing subscriber.
///
/// Call this exactly once, early in `main()`. Subsequent calls will panic.
/// `directives` is the fallback filter ([`default_directives`] for the
/// daemon); the `RUST_LOG` environment variable takes precedence when set.
pub fn init_logging(directives: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .init();
        }
    }

    tracing::info!(format = ?format, "logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_is_lossy() {
        assert_eq!(LogFormat::from_str_lossy("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str_lossy("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str_lossy("garbage"), LogFormat::Pretty);
    }

    #[test]
    fn default_directives_quiet_noisy_dependencies() {
        let directives = default_directives();
        assert!(directives.contains("sled=warn"));
        assert!(directives.contains("attestify_vault=info"));
        // Valid EnvFilter syntax.
        EnvFilter::try_new(&directives).expect("parseable directives");
    }
}
