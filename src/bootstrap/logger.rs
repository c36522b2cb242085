//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, before the worker is launched.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Log filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LEVEL: &str = "info";

/// Initialise the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence; `level` (`"error"`, `"warn"`, `"info"`,
/// `"debug"`, `"trace"` or a full filter directive) is the fallback. Stdout is
/// left to the delegated worker.
pub fn init(level: &str) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}
