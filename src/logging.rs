//! Tracing subscriber setup shared by both binaries.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "STUDIO_BRIDGE_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Compact stderr lines for the long-running server.
    Server,
    /// Warnings only, so CLI stdout stays machine-readable.
    Cli,
    /// Verbose output with source locations.
    Debug,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

impl LoggingMode {
    fn default_directive(self) -> &'static str {
        match self {
            Self::Server => "info",
            Self::Cli => "warn",
            Self::Debug => "debug",
        }
    }
}

/// Install the global subscriber. `configured` is the settings-file filter,
/// used only when neither env variable is set.
pub fn init_logging(mode: LoggingMode, configured: Option<&str>) -> Result<(), LoggingError> {
    let filter = create_env_filter(mode.default_directive(), configured)?;

    let result = match mode {
        LoggingMode::Server | LoggingMode::Cli => Registry::default()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(mode == LoggingMode::Server)
                    .compact(),
            )
            .with(filter)
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init(),
    };
    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// `STUDIO_BRIDGE_LOG`, then `RUST_LOG`, then `configured`, then `default_directive`.
fn create_env_filter(
    default_directive: &str,
    configured: Option<&str>,
) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| default_directive.to_string());

    parse_filter(&directive)
}

fn parse_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        filter: directive.to_string(),
        reason: e.to_string(),
    })
}

pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_accepts_directives() {
        assert!(parse_filter("info").is_ok());
        assert!(parse_filter("studio_bridge=debug,tower_http=warn").is_ok());
    }

    #[test]
    fn test_parse_filter_rejects_garbage() {
        let err = parse_filter("studio_bridge=[[[").unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
    }

    #[test]
    fn test_mode_defaults() {
        assert_eq!(LoggingMode::Server.default_directive(), "info");
        assert_eq!(LoggingMode::Cli.default_directive(), "warn");
    }
}
