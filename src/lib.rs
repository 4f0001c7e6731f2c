// SPDX-License-Identifier: Apache-2.0 OR MIT
//! High-throughput, multi-backend DLT logging for automotive middleware.
//!
//! Producer threads enqueue structured records into bounded lock-free
//! buffers; per-sink drainers serialize them into the DLT wire format (file,
//! remote ring) or human-readable text (console). Producers never block:
//! overload degrades to counted drops, never to backpressure.
//!
//! Documentation:
//! - DESIGN.md: component grounding and concurrency notes
//!
//! # Quick start
//!
//! ```no_run
//! use mwlog::{create_logger, log_info, LogHex32};
//!
//! // Free functions log under the "DFLT" context.
//! log_info().value("ready, state").value(LogHex32(0x0badf00d));
//!
//! // Or grab a per-context logger once and keep it.
//! let logger = create_logger("COMM");
//! logger.log_warn().value("retries").value(3u32);
//! ```

pub mod backend;
pub mod builder;
pub mod config;
pub mod dlt;
pub mod drainer;
pub mod error;
pub mod ident;
pub mod level;
pub mod logger;
pub mod payload;
pub mod queue;
pub mod record;
pub mod recorder;
pub mod runtime;
pub mod slots;
pub mod stack;
pub mod stats;
pub mod stream;
pub mod text;
pub mod types;
pub mod writer;

pub use config::{Configuration, LogMode};
pub use error::Error;
pub use ident::LoggingIdentifier;
pub use level::LogLevel;
pub use logger::{create_logger, Logger, DEFAULT_CONTEXT};
pub use recorder::Recorder;
pub use runtime::Runtime;
pub use slots::SlotHandle;
pub use stream::{LogStream, Loggable};
pub use types::{
    LogBin16, LogBin32, LogBin64, LogBin8, LogHex16, LogHex32, LogHex64, LogHex8, LogRawBuffer,
    LogSystemMessage,
};

/// Stream at fatal level under the default context
pub fn log_fatal() -> LogStream {
    LogStream::new(LogLevel::Fatal, DEFAULT_CONTEXT)
}

/// Stream at error level under the default context
pub fn log_error() -> LogStream {
    LogStream::new(LogLevel::Error, DEFAULT_CONTEXT)
}

/// Stream at warn level under the default context
pub fn log_warn() -> LogStream {
    LogStream::new(LogLevel::Warn, DEFAULT_CONTEXT)
}

/// Stream at info level under the default context
pub fn log_info() -> LogStream {
    LogStream::new(LogLevel::Info, DEFAULT_CONTEXT)
}

/// Stream at debug level under the default context
pub fn log_debug() -> LogStream {
    LogStream::new(LogLevel::Debug, DEFAULT_CONTEXT)
}

/// Stream at verbose level under the default context
pub fn log_verbose() -> LogStream {
    LogStream::new(LogLevel::Verbose, DEFAULT_CONTEXT)
}

/// Stream at fatal level under the given context
pub fn log_fatal_ctx(context: &str) -> LogStream {
    LogStream::new(LogLevel::Fatal, context)
}

/// Stream at error level under the given context
pub fn log_error_ctx(context: &str) -> LogStream {
    LogStream::new(LogLevel::Error, context)
}

/// Stream at warn level under the given context
pub fn log_warn_ctx(context: &str) -> LogStream {
    LogStream::new(LogLevel::Warn, context)
}

/// Stream at info level under the given context
pub fn log_info_ctx(context: &str) -> LogStream {
    LogStream::new(LogLevel::Info, context)
}

/// Stream at debug level under the given context
pub fn log_debug_ctx(context: &str) -> LogStream {
    LogStream::new(LogLevel::Debug, context)
}

/// Stream at verbose level under the given context
pub fn log_verbose_ctx(context: &str) -> LogStream {
    LogStream::new(LogLevel::Verbose, context)
}
