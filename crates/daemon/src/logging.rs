// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup

use crate::config::LogConfig;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log path has no file name: {0}")]
    InvalidPath(std::path::PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("tracing already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Build the filter: `RUST_LOG` first, then the configured directive
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.filter)?),
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes buffered lines when dropped; hold it for the
/// life of the process.
pub fn setup_logging(config: &LogConfig) -> Result<WorkerGuard, LoggingError> {
    let filter = env_filter(config)?;

    let (writer, guard) = match &config.path {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| LoggingError::InvalidPath(path.clone()))?;
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => std::path::PathBuf::from("."),
            };
            std::fs::create_dir_all(&dir)?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_filter_must_parse() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LogConfig {
            filter: "nm_engine=notalevel".to_string(),
            path: None,
        };
        assert!(matches!(env_filter(&config), Err(LoggingError::Filter(_))));
    }

    #[test]
    fn default_filter_parses() {
        assert!(env_filter(&LogConfig::default()).is_ok());
    }
}
