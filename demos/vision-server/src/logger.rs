//! Process-wide `tracing` subscriber, configured from [`Config`].

use std::io::IsTerminal;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{Config, LogFormat};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid log level {level:?}: {reason}")]
    InvalidLevel { level: String, reason: String },
    #[error("logger already initialized")]
    AlreadyInitialized,
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &Config) -> Result<(), LoggerError> {
    let registry = tracing_subscriber::registry().with(filter(&config.log_level)?);
    let installed = match config.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_ansi(std::io::stdout().is_terminal()))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    installed.map_err(|_| LoggerError::AlreadyInitialized)
}

/// Parses `LOG_LEVEL`, which accepts full `EnvFilter` directives
/// such as `info,kamado=debug`.
pub fn filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|e| LoggerError::InvalidLevel {
        level: level.to_string(),
        reason: e.to_string(),
    })
}
