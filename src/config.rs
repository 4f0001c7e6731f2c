// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Logging configuration.
//!
//! JSON5 configuration format supporting comments and trailing commas.
//! Discovery order: explicit path, then the `MW_LOG_CONFIG_FILE`
//! environment variable. Invalid or absent configuration degrades to a
//! console-only recorder with default values; the library never aborts over
//! configuration problems.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{report_initialization_error, Error};
use crate::ident::LoggingIdentifier;
use crate::level::LogLevel;
use crate::queue::max_linear_buffer_capacity_bytes;

/// Environment variable pointing at the configuration file.
pub const CONFIG_FILE_ENV: &str = "MW_LOG_CONFIG_FILE";

/// Destination sinks a configuration can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Shared ring to the remote collector
    Remote,
    /// Human-readable text on stdout
    Console,
    /// DLT messages into `{log_file_path}/{app_id}.dlt`
    File,
    /// Platform system logger
    System,
}

impl std::str::FromStr for LogMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(LogMode::Remote),
            "console" => Ok(LogMode::Console),
            "file" => Ok(LogMode::File),
            "system" => Ok(LogMode::System),
            other => Err(Error::InvalidLogModeString(other.to_string())),
        }
    }
}

/// Startup configuration (read once, then immutable).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub ecu_id: String,
    pub app_id: String,
    pub app_description: String,

    /// Enabled sinks; more than one gets a composite recorder
    pub log_mode: HashSet<LogMode>,

    /// Threshold for contexts without an override
    pub default_log_level: LogLevel,
    /// Threshold used by the console recorder
    pub default_console_log_level: LogLevel,
    /// Per-context thresholds. Keys longer than 4 bytes are truncated on
    /// insertion; lookups truncate the same way, so long names consistently
    /// map to their 4-byte prefix.
    pub context_log_level: HashMap<String, LogLevel>,

    /// Record slots per backend
    pub number_of_slots: usize,
    /// Payload capacity of one slot
    pub slot_size_bytes: usize,
    /// Capacity of each half of the remote ring
    pub remote_ring_bytes: usize,
    /// Chunk limit of the non-blocking writer
    pub writer_chunk_bytes: usize,
    /// Interval of the drop-statistics self-report, 0 disables
    pub statistics_report_interval_seconds: u64,

    /// Directory the file sink writes `{app_id}.dlt` into
    pub log_file_path: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            ecu_id: "NONE".to_string(),
            app_id: "NONE".to_string(),
            app_description: String::new(),
            log_mode: HashSet::from([LogMode::Console]),
            default_log_level: LogLevel::Info,
            default_console_log_level: LogLevel::Info,
            context_log_level: HashMap::new(),
            number_of_slots: 8,
            slot_size_bytes: 2048,
            remote_ring_bytes: 1024 * 1024,
            writer_chunk_bytes: 64 * 1024,
            statistics_report_interval_seconds: 300,
            log_file_path: "/tmp".to_string(),
        }
    }
}

impl Configuration {
    /// Load configuration from a JSON5 file
    pub fn load_from_file(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigurationFilesNotFound
            } else {
                Error::ConfigurationParseError(error.to_string())
            }
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string
    pub fn parse(content: &str) -> Result<Self, Error> {
        let config: Configuration =
            json5::from_str(content).map_err(|e| Error::ConfigurationParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for this process.
    ///
    /// Reads the file named by `MW_LOG_CONFIG_FILE` when set; any failure is
    /// reported out-of-band and the defaults (console-only) are used.
    pub fn discover() -> Self {
        match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => match Self::load_from_file(Path::new(&path)) {
                Ok(config) => config,
                Err(error) => {
                    report_initialization_error(&error);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Validate buffer geometry and mode selection
    pub fn validate(&self) -> Result<(), Error> {
        if self.log_mode.is_empty() {
            return Err(Error::NoLogModeSpecified);
        }
        if self.number_of_slots == 0 {
            return Err(Error::InvalidBufferConfiguration(
                "number_of_slots must be non-zero".to_string(),
            ));
        }
        if self.slot_size_bytes == 0 {
            return Err(Error::InvalidBufferConfiguration(
                "slot_size_bytes must be non-zero".to_string(),
            ));
        }
        if self.remote_ring_bytes as u64 > max_linear_buffer_capacity_bytes() {
            return Err(Error::InvalidBufferConfiguration(
                "remote_ring_bytes exceeds the queue capacity bound".to_string(),
            ));
        }
        if self.writer_chunk_bytes == 0 {
            return Err(Error::InvalidBufferConfiguration(
                "writer_chunk_bytes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-context thresholds keyed by truncated identifier
    pub fn context_level_map(&self) -> HashMap<LoggingIdentifier, LogLevel> {
        self.context_log_level
            .iter()
            .map(|(context, level)| (LoggingIdentifier::new(context), *level))
            .collect()
    }

    /// Path of the DLT log file for this application
    pub fn log_file_name(&self) -> String {
        format!("{}/{}.dlt", self.log_file_path, self.app_id)
    }
}
