// Per-context logger handles

use crate::ident::LoggingIdentifier;
use crate::level::LogLevel;
use crate::runtime::Runtime;
use crate::stream::LogStream;

/// Context id used when none is given
pub const DEFAULT_CONTEXT: &str = "DFLT";

/// A logger bound to one context id.
///
/// Cheap value type; the level methods hand out a [`LogStream`] that
/// flushes when it goes out of scope:
///
/// ```no_run
/// let logger = mwlog::create_logger("COMM");
/// logger.log_info().value("frames relayed").value(128u32);
/// ```
#[derive(Debug, Clone)]
pub struct Logger {
    context: LoggingIdentifier,
}

impl Logger {
    pub fn new(context: &str) -> Self {
        Self {
            context: LoggingIdentifier::new(context),
        }
    }

    pub fn context(&self) -> &str {
        self.context.as_str()
    }

    pub(crate) fn ident(&self) -> LoggingIdentifier {
        self.context
    }

    pub fn log_fatal(&self) -> LogStream {
        LogStream::new(LogLevel::Fatal, self.context())
    }

    pub fn log_error(&self) -> LogStream {
        LogStream::new(LogLevel::Error, self.context())
    }

    pub fn log_warn(&self) -> LogStream {
        LogStream::new(LogLevel::Warn, self.context())
    }

    pub fn log_info(&self) -> LogStream {
        LogStream::new(LogLevel::Info, self.context())
    }

    pub fn log_debug(&self) -> LogStream {
        LogStream::new(LogLevel::Debug, self.context())
    }

    pub fn log_verbose(&self) -> LogStream {
        LogStream::new(LogLevel::Verbose, self.context())
    }

    /// Stream for an arbitrary level
    pub fn with_level(&self, log_level: LogLevel) -> LogStream {
        LogStream::new(log_level, self.context())
    }

    /// True iff the active recorder admits `log_level` for this context
    pub fn is_enabled(&self, log_level: LogLevel) -> bool {
        Runtime::instance()
            .recorder()
            .is_log_enabled(log_level, self.context())
    }
}

/// Find or create the process-wide logger for `context`.
///
/// Loggers live for the whole process; when the registry is full the
/// default ("DFLT") logger is returned.
pub fn create_logger(context: &str) -> &'static Logger {
    Runtime::instance().logger_container().get_logger(context)
}
