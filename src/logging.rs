use serde::{Deserialize, Serialize};
use std::sync::Once;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid filter directive: {0}")]
    InvalidFilter(String),
    #[error("Logging already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Installs a global tracing subscriber with a compact fmt layer.
///
/// `RUST_LOG` overrides `default_level` when set. Subsequent calls return
/// `AlreadyInitialized` instead of panicking, so embedders and test
/// binaries can call this unconditionally.
pub fn setup_logging(default_level: LogLevel) -> Result<(), LoggingError> {
    static INIT: Once = Once::new();
    let mut installed = false;

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level.as_str()))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .compact(),
        );

        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            installed = true;
        }
    });

    if installed {
        Ok(())
    } else {
        Err(LoggingError::AlreadyInitialized)
    }
}
