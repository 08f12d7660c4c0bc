//! Configuration management.
//!
//! Settings are loaded from an optional TOML file (`datagrapher.toml` by
//! default) merged over built-in defaults; every field may be omitted. The
//! serial profile defaults to the Mettler-Toledo NewClassic (MS-S / MS-L)
//! factory settings: 9600 baud, 8 data bits, no parity, one stop bit,
//! XON/XOFF flow control, 60 second read timeout.

use crate::error::{AppResult, DaqError};
use config::Config;
use serde::Deserialize;

/// Top-level application settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Default path of the SQLite database.
    pub db_path: String,
    /// Capacity of the rolling display window.
    pub window_capacity: usize,
    /// Interval in milliseconds between synthetic samples.
    pub sample_interval_ms: u64,
    /// Serial port profile for the balance.
    pub serial: SerialSettings,
}

/// Serial port parameters for the balance connection.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    /// "none", "odd" or "even".
    pub parity: String,
    pub stop_bits: u8,
    /// XON/XOFF software flow control.
    pub xonxoff: bool,
    /// Read timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            db_path: "test.db".into(),
            window_capacity: 100,
            sample_interval_ms: 300,
            serial: SerialSettings::default(),
        }
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        // Mettler-Toledo NewClassic factory profile.
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: "none".into(),
            stop_bits: 1,
            xonxoff: true,
            timeout_ms: 60_000,
        }
    }
}

impl Settings {
    /// Loads settings, merging an optional TOML file over the defaults.
    pub fn new(config_name: Option<&str>) -> AppResult<Self> {
        let config_path = config_name.unwrap_or("datagrapher");
        let s = Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .build()
            .map_err(DaqError::Config)?;

        let settings: Settings = s.try_deserialize().map_err(DaqError::Config)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks values that parse correctly but are logically invalid.
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(DaqError::Configuration(format!(
                "invalid log_level '{}'",
                self.log_level
            )));
        }
        if self.window_capacity < 2 {
            return Err(DaqError::Configuration(
                "window_capacity must be at least 2".into(),
            ));
        }
        if !["none", "odd", "even"].contains(&self.serial.parity.as_str()) {
            return Err(DaqError::Configuration(format!(
                "invalid parity '{}'",
                self.serial.parity
            )));
        }
        Ok(())
    }
}
