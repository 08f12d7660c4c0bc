//! Custom error types for the application.
//!
//! This module defines the primary error type, `DaqError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of errors that can occur,
//! from I/O and configuration issues to storage and serial-port problems.
//!
//! By using `#[from]`, `DaqError` can be seamlessly created from underlying
//! error types, simplifying error handling throughout the crate with the
//! `?` operator. Per-sample failures inside the workers are caught and
//! logged rather than propagated; only startup-time failures reach the
//! process exit path.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// The central error type for the datagrapher crate.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Errors from parsing or loading the settings file.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Semantic errors in configuration values that parsed correctly.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File and stream I/O failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the SQLite storage layer.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The database file does not exist for a read-only operation.
    #[error("Database is not a file: {0}")]
    DatabaseMissing(String),

    /// A query matched no rows where at least one was required.
    #[error("No rows found: {0}")]
    NoRows(String),

    /// Failures while writing export output.
    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    /// Failures opening or reading the physical acquisition channel.
    #[error("Serial port error: {0}")]
    Serial(String),

    /// A required serial port was not specified.
    #[error("Must specify a serial port")]
    PortRequired,

    /// Serial support was not compiled in.
    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    /// A line of instrument output failed value/unit classification.
    #[error("Unable to classify reading: [{0}]")]
    Classification(String),
}
