//! Tracing setup driven by the `[logging]` config section.
//!
//! `EVENTLENS_LOG` overrides the configured level filter. Output goes to the
//! journal on Linux when enabled and reachable, otherwise to a daily-rolling
//! file in the configured directory.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_FILE: &str = "eventlens.log";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber. Call once at startup.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = filter_for(config)?;

    #[cfg(target_os = "linux")]
    if config.journald {
        if let Ok(journald) = tracing_journald::layer() {
            tracing_subscriber::registry().with(filter).with(journald).init();
            tracing::info!(level = %config.level, "Logging to journald");
            return Ok(());
        }
    }

    let dir = log_dir(config);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE));
    // Buffered lines are lost once the guard drops
    let _ = FILE_GUARD.set(guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    tracing::info!(dir = %dir.display(), level = %config.level, "Logging to file");
    Ok(())
}

/// `EVENTLENS_LOG` when set, else the configured level.
fn filter_for(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env("EVENTLENS_LOG") {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level filter {:?}", config.level))
}

/// Where log files go when the journal is not used.
pub fn log_dir(config: &LoggingConfig) -> PathBuf {
    config.dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventlens")
            .join("logs")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_prefers_config() {
        let config = LoggingConfig {
            dir: Some(PathBuf::from("/var/log/eventlens")),
            ..LoggingConfig::default()
        };
        assert_eq!(log_dir(&config), PathBuf::from("/var/log/eventlens"));

        let fallback = log_dir(&LoggingConfig::default());
        assert!(fallback.ends_with("eventlens/logs"));
    }

    #[test]
    fn test_level_filter_is_validated() {
        let config = LoggingConfig {
            level: "eventlens=debug,ureq=warn".to_string(),
            ..LoggingConfig::default()
        };
        if std::env::var_os("EVENTLENS_LOG").is_none() {
            assert!(filter_for(&config).is_ok());
            let broken = LoggingConfig {
                level: "eventlens=loudest".to_string(),
                ..LoggingConfig::default()
            };
            assert!(filter_for(&broken).is_err());
        }
    }
}
