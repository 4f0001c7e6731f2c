// Log record: fixed metadata plus the owned payload buffer

use crate::ident::LoggingIdentifier;
use crate::level::LogLevel;
use crate::payload::VerbosePayload;

/// The data carried by one log message: routing metadata plus the encoded
/// argument payload.
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    pub app_id: LoggingIdentifier,
    pub ctx_id: LoggingIdentifier,
    pub log_level: LogLevel,
    pub num_of_args: u8,
    pub payload: VerbosePayload,
    /// Numeric code forwarded to a platform system-logger sink, when set
    pub system_code: Option<u16>,
}

/// A reusable slot buffer: one [`LogEntry`] whose payload capacity is fixed
/// at startup and preserved across messages.
///
/// Records are created once during allocator construction and recycled; a
/// `reset` clears the per-message state but keeps the payload allocation.
#[derive(Debug, Clone)]
pub struct LogRecord {
    entry: LogEntry,
}

impl LogRecord {
    pub fn new(max_payload_size_bytes: usize) -> Self {
        Self {
            entry: LogEntry {
                payload: VerbosePayload::new(max_payload_size_bytes),
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn entry(&self) -> &LogEntry {
        &self.entry
    }

    #[inline]
    pub fn entry_mut(&mut self) -> &mut LogEntry {
        &mut self.entry
    }

    /// Clear per-message state; the payload keeps its capacity
    pub fn reset(&mut self) {
        self.entry.payload.reset();
        self.entry.num_of_args = 0;
        self.entry.system_code = None;
    }
}
