// SPDX-License-Identifier: Apache-2.0 OR MIT
// Error taxonomy and the out-of-band initialization reporter

use std::io::Write;

/// Errors raised by initialization and the I/O layer.
///
/// Hot-path failures (slot exhausted, payload overflow) are not represented
/// here; they degrade to silent drops counted by the statistics reporter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unknown error")]
    Unknown,
    #[error("invalid log level string: '{0}'")]
    InvalidLogLevelString(String),
    #[error("invalid log mode string: '{0}'")]
    InvalidLogModeString(String),
    #[error("configuration file not found")]
    ConfigurationFilesNotFound,
    #[error("failed to parse configuration: {0}")]
    ConfigurationParseError(String),
    #[error("optional configuration key not found: '{0}'")]
    ConfigurationOptionalKeyNotFound(String),
    #[error("maximum number of recorders exceeded")]
    MaximumNumberOfRecordersExceeded,
    #[error("log mode not supported on this platform")]
    UnsupportedLogMode,
    #[error("no log mode specified")]
    NoLogModeSpecified,
    #[error("receiver initialization failed")]
    ReceiverInitializationError,
    #[error("log file creation failed: {0}")]
    LogFileCreationFailed(String),
    #[error("failed to set logger thread name")]
    FailedToSetThreadName,
    #[error("failed to block termination signals")]
    BlockingTerminationSignalFailed,
    #[error("memory resource missing")]
    MemoryResourceError,
    #[error("system logger error")]
    SystemLoggerError,
    #[error("invalid buffer configuration: {0}")]
    InvalidBufferConfiguration(String),
}

/// Report an initialization error out-of-band on stderr.
///
/// Initialization failures must never travel through the normal logging
/// path, which may not be functional yet (and logging about logging would
/// recurse). One framework-tagged line per error.
pub fn report_initialization_error(error: &Error) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "mwlog: {error}");
}

/// Variant of [`report_initialization_error`] with extra context.
pub fn report_initialization_error_with(error: &Error, context: &str) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "mwlog: {error}: {context}");
}
