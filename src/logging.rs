//! Structured logging setup for the binary.
//!
//! Logs go to stderr so that reports on stdout stay machine-readable.
//! `RUST_LOG` takes precedence over the verbosity flags.

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::VerbosityLevel;
use crate::error::{Result, ValidationError};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Text,
    /// JSON lines
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub verbosity: VerbosityLevel,
}

impl LoggingConfig {
    pub fn new(verbosity: VerbosityLevel, json: bool) -> Self {
        Self {
            format: if json { LogFormat::Json } else { LogFormat::Text },
            verbosity,
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> &'static str {
        match self.verbosity {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "netex_validator=debug,info",
        }
    }
}

/// Install the global subscriber; fails when one is already installed
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let registry = tracing_subscriber::registry();
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_filter(env_filter),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(atty::is(atty::Stream::Stderr))
                    .with_filter(env_filter),
            )
            .try_init(),
    };

    installed.map_err(|e| ValidationError::Config(format!("Failed to initialize logging: {}", e)))?;
    tracing::debug!(format = ?config.format, verbosity = ?config.verbosity, "logging initialized");
    Ok(())
}
