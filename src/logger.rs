//! Centralized logging configuration and initialization manager.
//!
//! The `LoggerManager` validates logging configuration and installs the
//! global `tracing` subscriber: a console `fmt` layer in the configured
//! format behind an `EnvFilter`. `RUST_LOG` takes precedence over the
//! configured level when it is set.

use std::io;

use thiserror::Error;
use tracing::instrument;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};
use validator::{Validate, ValidationErrors};

use crate::{
    config::logger::{ConsoleConfig, LogFormat, LoggerConfig},
    print_warn,
};

/// Errors that can occur during logger configuration or initialization.
#[derive(Error, Debug)]
pub enum LoggerError {
    /// General initialization failure with a descriptive message.
    #[error("Logger initialization error: {0}")]
    InitializationError(String),

    /// Validation errors from the logger configuration struct.
    #[error("Logger configuration validation error: {0}")]
    ValidationError(#[from] ValidationErrors),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Manages logging configuration and global subscriber initialization.
pub struct LoggerManager {
    config: LoggerConfig,
}

impl LoggerManager {
    /// Creates a new `LoggerManager` and validates the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns `LoggerError::ValidationError` if configuration validation fails.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;

        Ok(LoggerManager { config })
    }

    /// Installs the global subscriber. Must be called once, before any
    /// tracing macro whose output matters.
    ///
    /// # Errors
    ///
    /// `InitializationError` if a global subscriber is already installed.
    #[instrument(skip(self))]
    pub fn init(&mut self) -> Result<(), LoggerError> {
        let layer = self.console_layer(&self.config.console, self.env_filter());

        tracing_subscriber::registry()
            .with(layer)
            .try_init()
            .map_err(|e| LoggerError::InitializationError(e.to_string()))
    }

    /// Builds the level filter; `RUST_LOG` wins when it parses.
    fn env_filter(&self) -> EnvFilter {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => {
                print_warn!(
                    "RUST_LOG is set and overrides the configured level '{}'",
                    self.config.level
                );
                filter
            }
            Err(_) => EnvFilter::new(self.config.filter_directive()),
        }
    }

    /// Constructs a console output layer according to the provided configuration.
    fn console_layer(&self, config: &ConsoleConfig, filter: EnvFilter) -> BoxedLayer {
        let writer = io::stdout;

        match config.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_target(false)
                .with_ansi(config.ansi_colors)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_target(false)
                .with_ansi(config.ansi_colors)
                .with_writer(writer)
                .with_filter(filter)
                .boxed(),
        }
    }
}
