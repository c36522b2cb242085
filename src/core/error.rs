//! Application-wide error types.

use thiserror::Error;

use crate::core::settings::SettingsError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
