//! Structured logging setup.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{Error, Result};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output for terminals.
    #[default]
    Pretty,
    /// One JSON object per line for log shippers.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Whether verbose (debug-level) output was requested.
    pub verbose: bool,
}

impl LoggingConfig {
    /// Builds a logging configuration from the environment.
    ///
    /// `DUPGATE_LOG_FORMAT=json` selects JSON output; `RUST_LOG` controls
    /// the filter as usual. `verbose` lowers the default level to `debug`
    /// when `RUST_LOG` is unset.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        let format = match std::env::var("DUPGATE_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self { format, verbose }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_env(false)
    }
}

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Initializes the global tracing subscriber.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] when logging has already been
/// initialized or subscriber registration fails.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "logging_init".to_string(),
            cause: "logging already initialized".to_string(),
        });
    }

    let default_directive = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .with(filter)
            .try_init()
            .map_err(init_error)?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(filter)
            .try_init()
            .map_err(init_error)?,
    }

    LOGGING_INIT.set(()).map_err(|()| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: "failed to mark logging initialized".to_string(),
    })?;

    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format_is_pretty() {
        let config = LoggingConfig {
            format: LogFormat::default(),
            verbose: false,
        };
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
