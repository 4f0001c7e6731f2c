// SPDX-License-Identifier: Apache-2.0 OR MIT
// Process-wide runtime: the recorder set built from configuration, the
// always-available console fallback, and the per-context logger registry.

use std::os::fd::RawFd;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use nix::fcntl::OFlag;
use nix::sys::stat::Mode;

use crate::backend::{FileOutputBackend, RemoteBackend};
use crate::builder::{DltMessageBuilder, TextMessageBuilder};
use crate::config::{Configuration, LogMode};
use crate::error::{report_initialization_error, report_initialization_error_with, Error};
use crate::ident::LoggingIdentifier;
use crate::logger::{Logger, DEFAULT_CONTEXT};
use crate::queue::AlternatingControlBlock;
use crate::record::LogRecord;
use crate::recorder::{BackendRecorder, CompositeRecorder, FormatStyle, Recorder};
use crate::slots::CircularAllocator;
use crate::stack::WaitFreeStack;
use crate::stats::StatisticsReporter;
use crate::writer::SysWrite;

const MAX_LOGGERS: usize = 32;
const STDOUT_FD: RawFd = 1;

/// Per-context [`Logger`] registry.
///
/// Backed by the push-only wait-free stack, so loggers live for the process
/// and references can be handed out freely. When the capacity is exhausted
/// new contexts share the default "DFLT" logger.
pub struct LoggerContainer {
    stack: WaitFreeStack<Logger>,
    default_logger: Logger,
}

impl LoggerContainer {
    pub fn new() -> Self {
        Self {
            stack: WaitFreeStack::new(MAX_LOGGERS),
            default_logger: Logger::new(DEFAULT_CONTEXT),
        }
    }

    /// Find or create the logger for `context` (truncated to 4 bytes)
    pub fn get_logger(&self, context: &str) -> &Logger {
        let ident = LoggingIdentifier::new(context);
        if let Some(logger) = self.stack.find(|logger| logger.ident() == ident) {
            return logger;
        }
        self.stack
            .try_push(Logger::new(context))
            .unwrap_or(&self.default_logger)
    }

    pub fn default_logger(&self) -> &Logger {
        &self.default_logger
    }

    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }
}

impl Default for LoggerContainer {
    fn default() -> Self {
        Self::new()
    }
}

fn slot_allocator(config: &Configuration) -> Arc<CircularAllocator<LogRecord>> {
    let slot_size = config.slot_size_bytes;
    Arc::new(CircularAllocator::new(config.number_of_slots, move || {
        LogRecord::new(slot_size)
    }))
}

fn statistics(config: &Configuration) -> StatisticsReporter {
    StatisticsReporter::new(
        Duration::from_secs(config.statistics_report_interval_seconds),
        config.number_of_slots,
        config.slot_size_bytes,
    )
}

/// Text recorder on stdout, thresholded by the console default level
pub fn create_console_recorder(config: &Configuration) -> Box<dyn Recorder> {
    let ecu_id = LoggingIdentifier::new(&config.ecu_id);
    let backend = FileOutputBackend::new(
        Box::new(TextMessageBuilder::new(ecu_id)),
        STDOUT_FD,
        slot_allocator(config),
        config.writer_chunk_bytes,
        Box::new(SysWrite),
    );
    Box::new(BackendRecorder::new(
        Box::new(backend),
        FormatStyle::Text,
        LoggingIdentifier::new(&config.app_id),
        config.default_console_log_level,
        config.context_level_map(),
        statistics(config),
    ))
}

/// DLT recorder writing `{log_file_path}/{app_id}.dlt`
fn create_file_recorder(config: &Configuration) -> Option<Box<dyn Recorder>> {
    let file_name = config.log_file_name();
    let descriptor = match nix::fcntl::open(
        file_name.as_str(),
        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_CLOEXEC,
        Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH,
    ) {
        Ok(descriptor) => descriptor,
        Err(errno) => {
            report_initialization_error(&Error::LogFileCreationFailed(errno.to_string()));
            return None;
        }
    };

    let ecu_id = LoggingIdentifier::new(&config.ecu_id);
    let backend = FileOutputBackend::new(
        Box::new(DltMessageBuilder::new(ecu_id)),
        descriptor,
        slot_allocator(config),
        config.writer_chunk_bytes,
        Box::new(SysWrite),
    );
    Some(Box::new(BackendRecorder::new(
        Box::new(backend),
        FormatStyle::Dlt,
        LoggingIdentifier::new(&config.app_id),
        config.default_log_level,
        config.context_level_map(),
        statistics(config),
    )))
}

/// Recorder committing DLT-encoded records into the shared alternating ring
fn create_remote_recorder(config: &Configuration) -> Box<dyn Recorder> {
    let ring = Arc::new(AlternatingControlBlock::new(config.remote_ring_bytes));
    let backend = RemoteBackend::new(slot_allocator(config), ring);
    Box::new(BackendRecorder::new(
        Box::new(backend),
        FormatStyle::Dlt,
        LoggingIdentifier::new(&config.app_id),
        config.default_log_level,
        config.context_level_map(),
        statistics(config),
    ))
}

/// Build the recorder set the configuration asks for.
///
/// Unusable modes are reported out-of-band and skipped; if nothing remains
/// the console recorder is used so the library keeps working.
pub fn create_recorder_from_configuration(config: &Configuration) -> Box<dyn Recorder> {
    // Deterministic composite order regardless of set iteration.
    let mut recorders: Vec<Box<dyn Recorder>> = Vec::new();
    for mode in [LogMode::Remote, LogMode::Console, LogMode::File, LogMode::System] {
        if !config.log_mode.contains(&mode) {
            continue;
        }
        match mode {
            LogMode::Console => recorders.push(create_console_recorder(config)),
            LogMode::File => {
                if let Some(recorder) = create_file_recorder(config) {
                    recorders.push(recorder);
                }
            }
            LogMode::Remote => recorders.push(create_remote_recorder(config)),
            LogMode::System => {
                // Only a QNX slogger exists upstream of this trait; on other
                // hosts the mode is rejected.
                report_initialization_error_with(&Error::UnsupportedLogMode, "system");
            }
        }
    }

    match recorders.len() {
        0 => create_console_recorder(config),
        1 => recorders.remove(0),
        _ => Box::new(CompositeRecorder::new(recorders)),
    }
}

/// Process-wide logging state: active recorder, console fallback and logger
/// registry. Initialized on first use, alive until process exit.
pub struct Runtime {
    default_recorder: Box<dyn Recorder>,
    override_recorder: OnceLock<Box<dyn Recorder>>,
    fallback_recorder: Box<dyn Recorder>,
    logger_container: LoggerContainer,
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

impl Runtime {
    /// The singleton, built from the discovered configuration on first use
    pub fn instance() -> &'static Runtime {
        RUNTIME.get_or_init(|| Runtime::from_configuration(&Configuration::discover()))
    }

    /// Build a runtime for the given configuration.
    ///
    /// The fallback recorder is always console-only so re-entrant logging
    /// has a functional target even when the configured sinks misbehave.
    pub fn from_configuration(config: &Configuration) -> Self {
        let mut effective = config.clone();
        if let Err(error) = effective.validate() {
            report_initialization_error(&error);
            effective = Configuration::default();
        }

        Self {
            default_recorder: create_recorder_from_configuration(&effective),
            override_recorder: OnceLock::new(),
            fallback_recorder: create_console_recorder(&effective),
            logger_container: LoggerContainer::new(),
        }
    }

    /// The active recorder: the installed override, else the configured one
    pub fn recorder(&self) -> &dyn Recorder {
        match self.override_recorder.get() {
            Some(recorder) => recorder.as_ref(),
            None => self.default_recorder.as_ref(),
        }
    }

    /// The console-only recorder used to break logging recursion
    pub fn fallback_recorder(&self) -> &dyn Recorder {
        self.fallback_recorder.as_ref()
    }

    pub fn logger_container(&self) -> &LoggerContainer {
        &self.logger_container
    }

    /// Install a recorder override on the singleton.
    ///
    /// Only the first installation wins (the library is not dynamically
    /// reconfigurable); returns false when an override was already set.
    pub fn set_recorder(recorder: Box<dyn Recorder>) -> bool {
        Runtime::instance().override_recorder.set(recorder).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;

    #[test]
    fn test_logger_container_reuses_context() {
        let container = LoggerContainer::new();
        let first = container.get_logger("CTX1") as *const Logger;
        let second = container.get_logger("CTX1") as *const Logger;
        assert_eq!(first, second);
    }

    #[test]
    fn test_logger_container_truncates_context() {
        let container = LoggerContainer::new();
        let long = container.get_logger("LONGCONTEXT") as *const Logger;
        let short = container.get_logger("LONG") as *const Logger;
        assert_eq!(long, short);
    }

    #[test]
    fn test_logger_container_falls_back_when_full() {
        let container = LoggerContainer::new();
        for index in 0..container.capacity() {
            container.get_logger(&format!("C{index:03}"));
        }
        let overflow = container.get_logger("MORE") as *const Logger;
        assert_eq!(overflow, container.default_logger() as *const Logger);
    }

    #[test]
    fn test_remote_recorder_from_configuration() {
        let config = Configuration {
            log_mode: std::collections::HashSet::from([LogMode::Remote]),
            ..Default::default()
        };
        let recorder = create_recorder_from_configuration(&config);
        let handle = recorder.start_record("CTX1", LogLevel::Info).unwrap();
        recorder.log_str(&handle, "remote bound");
        recorder.stop_record(&handle);
    }

    #[test]
    fn test_system_mode_degrades_to_console() {
        let config = Configuration {
            log_mode: std::collections::HashSet::from([LogMode::System]),
            ..Default::default()
        };
        // System alone is unsupported here; the factory falls back to the
        // console recorder rather than producing nothing.
        let recorder = create_recorder_from_configuration(&config);
        assert!(recorder.is_log_enabled(LogLevel::Info, "CTX1"));
    }

    #[test]
    fn test_runtime_from_invalid_configuration_uses_defaults() {
        let mut config = Configuration::default();
        config.log_mode.clear();
        let runtime = Runtime::from_configuration(&config);
        assert!(runtime.recorder().is_log_enabled(LogLevel::Info, "ANY"));
    }
}
