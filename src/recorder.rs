// SPDX-License-Identifier: Apache-2.0 OR MIT
// Recorders: the producer-facing layer above the backends. A recorder
// filters by level, reserves a slot, formats streamed arguments into the
// record and finally flushes it. The composite recorder fans one logical
// record out across up to eight concrete recorders.

use std::collections::HashMap;

use crate::backend::Backend;
use crate::dlt::DltFormat;
use crate::error::{report_initialization_error, Error};
use crate::ident::LoggingIdentifier;
use crate::level::LogLevel;
use crate::payload::VerbosePayload;
use crate::slots::{RecorderId, SlotHandle, MAX_RECORDERS};
use crate::stats::StatisticsReporter;
use crate::text::TextFormat;
use crate::types::{AddArgumentResult, IntegerRepresentation};

/// Producer-facing log-statement interface.
///
/// `start_record` / `log_*` / `stop_record` mirror the lifetime of one log
/// statement. All methods are wait-free on the hot path; failures degrade
/// to counted drops.
pub trait Recorder: Send + Sync {
    /// Reserve a record for the given context and level.
    ///
    /// `None` when the level is filtered for this context or no slot is
    /// available.
    fn start_record(&self, context_id: &str, log_level: LogLevel) -> Option<SlotHandle>;

    /// Finalize and hand the record to the sink
    fn stop_record(&self, handle: &SlotHandle);

    fn log_bool(&self, handle: &SlotHandle, value: bool);
    fn log_u8(&self, handle: &SlotHandle, value: u8, repr: IntegerRepresentation);
    fn log_u16(&self, handle: &SlotHandle, value: u16, repr: IntegerRepresentation);
    fn log_u32(&self, handle: &SlotHandle, value: u32, repr: IntegerRepresentation);
    fn log_u64(&self, handle: &SlotHandle, value: u64, repr: IntegerRepresentation);
    fn log_i8(&self, handle: &SlotHandle, value: i8, repr: IntegerRepresentation);
    fn log_i16(&self, handle: &SlotHandle, value: i16, repr: IntegerRepresentation);
    fn log_i32(&self, handle: &SlotHandle, value: i32, repr: IntegerRepresentation);
    fn log_i64(&self, handle: &SlotHandle, value: i64, repr: IntegerRepresentation);
    fn log_f32(&self, handle: &SlotHandle, value: f32);
    fn log_f64(&self, handle: &SlotHandle, value: f64);
    fn log_str(&self, handle: &SlotHandle, value: &str);
    fn log_raw(&self, handle: &SlotHandle, value: &[u8]);
    fn log_system_message(&self, handle: &SlotHandle, message: &str, code: u16);

    /// True iff the per-context threshold (or the default) admits `level`
    fn is_log_enabled(&self, level: LogLevel, context: &str) -> bool;
}

/// Which argument encoding a backend recorder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStyle {
    /// Binary DLT verbose arguments (file, remote)
    Dlt,
    /// Space-separated ASCII (console)
    Text,
}

/// A recorder bound to one backend and one argument encoding.
pub struct BackendRecorder {
    backend: Box<dyn Backend>,
    format: FormatStyle,
    app_id: LoggingIdentifier,
    default_level: LogLevel,
    context_levels: HashMap<LoggingIdentifier, LogLevel>,
    stats: StatisticsReporter,
}

impl BackendRecorder {
    pub fn new(
        backend: Box<dyn Backend>,
        format: FormatStyle,
        app_id: LoggingIdentifier,
        default_level: LogLevel,
        context_levels: HashMap<LoggingIdentifier, LogLevel>,
        stats: StatisticsReporter,
    ) -> Self {
        Self {
            backend,
            format,
            app_id,
            default_level,
            context_levels,
            stats,
        }
    }

    /// Run the formatter, count the argument on success, count the drop on
    /// overflow.
    fn add_argument<F>(&self, handle: &SlotHandle, format: F)
    where
        F: Fn(&mut VerbosePayload) -> AddArgumentResult,
    {
        let mut result = AddArgumentResult::NotAdded;
        self.backend.with_record(handle, &mut |record| {
            let entry = record.entry_mut();
            result = format(&mut entry.payload);
            if result == AddArgumentResult::Added {
                entry.num_of_args = entry.num_of_args.saturating_add(1);
            }
        });
        if result == AddArgumentResult::NotAdded {
            self.stats.increment_message_too_long();
        }
    }
}

macro_rules! backend_log_int {
    ($name:ident, $ty:ty) => {
        fn $name(&self, handle: &SlotHandle, value: $ty, repr: IntegerRepresentation) {
            let format = self.format;
            self.add_argument(handle, move |payload| match format {
                FormatStyle::Dlt => DltFormat::$name(payload, value, repr),
                FormatStyle::Text => TextFormat::$name(payload, value, repr),
            });
        }
    };
}

impl Recorder for BackendRecorder {
    fn start_record(&self, context_id: &str, log_level: LogLevel) -> Option<SlotHandle> {
        self.stats.update(self);

        if !self.is_log_enabled(log_level, context_id) {
            return None;
        }

        let Some(handle) = self.backend.reserve_slot() else {
            self.stats.increment_no_slot_available();
            return None;
        };

        let app_id = self.app_id;
        let ctx_id = LoggingIdentifier::new(context_id);
        self.backend.with_record(&handle, &mut |record| {
            record.reset();
            let entry = record.entry_mut();
            entry.app_id = app_id;
            entry.ctx_id = ctx_id;
            entry.log_level = log_level;
        });
        Some(handle)
    }

    fn stop_record(&self, handle: &SlotHandle) {
        self.backend.flush_slot(handle);
    }

    fn log_bool(&self, handle: &SlotHandle, value: bool) {
        let format = self.format;
        self.add_argument(handle, move |payload| match format {
            FormatStyle::Dlt => DltFormat::log_bool(payload, value),
            FormatStyle::Text => TextFormat::log_bool(payload, value),
        });
    }

    backend_log_int!(log_u8, u8);
    backend_log_int!(log_u16, u16);
    backend_log_int!(log_u32, u32);
    backend_log_int!(log_u64, u64);
    backend_log_int!(log_i8, i8);
    backend_log_int!(log_i16, i16);
    backend_log_int!(log_i32, i32);
    backend_log_int!(log_i64, i64);

    fn log_f32(&self, handle: &SlotHandle, value: f32) {
        let format = self.format;
        self.add_argument(handle, move |payload| match format {
            FormatStyle::Dlt => DltFormat::log_f32(payload, value),
            FormatStyle::Text => TextFormat::log_f32(payload, value),
        });
    }

    fn log_f64(&self, handle: &SlotHandle, value: f64) {
        let format = self.format;
        self.add_argument(handle, move |payload| match format {
            FormatStyle::Dlt => DltFormat::log_f64(payload, value),
            FormatStyle::Text => TextFormat::log_f64(payload, value),
        });
    }

    fn log_str(&self, handle: &SlotHandle, value: &str) {
        let format = self.format;
        self.add_argument(handle, move |payload| match format {
            FormatStyle::Dlt => DltFormat::log_str(payload, value),
            FormatStyle::Text => TextFormat::log_str(payload, value),
        });
    }

    fn log_raw(&self, handle: &SlotHandle, value: &[u8]) {
        let format = self.format;
        self.add_argument(handle, move |payload| match format {
            FormatStyle::Dlt => DltFormat::log_raw(payload, value),
            FormatStyle::Text => TextFormat::log_raw(payload, value),
        });
    }

    fn log_system_message(&self, handle: &SlotHandle, message: &str, code: u16) {
        self.backend.with_record(handle, &mut |record| {
            record.entry_mut().system_code = Some(code);
        });
        self.log_str(handle, message);
    }

    fn is_log_enabled(&self, level: LogLevel, context: &str) -> bool {
        let effective = self
            .context_levels
            .get(&LoggingIdentifier::new(context))
            .copied()
            .unwrap_or(self.default_level);
        effective >= level
    }
}

/// Fans one logical record out to up to [`MAX_RECORDERS`] concrete
/// recorders. Each child that reserves a slot gets its bit in the composite
/// handle; `log_*`/`stop_record` dispatch only to those children.
pub struct CompositeRecorder {
    recorders: Vec<Box<dyn Recorder>>,
}

impl CompositeRecorder {
    pub fn new(mut recorders: Vec<Box<dyn Recorder>>) -> Self {
        if recorders.len() > MAX_RECORDERS {
            report_initialization_error(&Error::MaximumNumberOfRecordersExceeded);
            recorders.truncate(MAX_RECORDERS);
        }
        Self { recorders }
    }

    pub fn recorder_count(&self) -> usize {
        self.recorders.len()
    }

    fn for_each_active<F>(&self, handle: &SlotHandle, f: F)
    where
        F: Fn(&dyn Recorder, &SlotHandle),
    {
        for (index, recorder) in self.recorders.iter().enumerate() {
            let id = RecorderId(index);
            if handle.is_recorder_active(id) {
                let child_handle = SlotHandle::from_slot(handle.slot(id));
                f(recorder.as_ref(), &child_handle);
            }
        }
    }
}

macro_rules! composite_log {
    ($name:ident $(, $arg:ident : $ty:ty)*) => {
        fn $name(&self, handle: &SlotHandle $(, $arg: $ty)*) {
            self.for_each_active(handle, |recorder, child| recorder.$name(child $(, $arg)*));
        }
    };
}

impl Recorder for CompositeRecorder {
    fn start_record(&self, context_id: &str, log_level: LogLevel) -> Option<SlotHandle> {
        let mut composite = SlotHandle::default();
        for (index, recorder) in self.recorders.iter().enumerate() {
            if let Some(child) = recorder.start_record(context_id, log_level) {
                composite.set_slot(child.selected_slot(), RecorderId(index));
            }
        }
        composite.any_active().then_some(composite)
    }

    fn stop_record(&self, handle: &SlotHandle) {
        self.for_each_active(handle, |recorder, child| recorder.stop_record(child));
    }

    composite_log!(log_bool, value: bool);
    composite_log!(log_u8, value: u8, repr: IntegerRepresentation);
    composite_log!(log_u16, value: u16, repr: IntegerRepresentation);
    composite_log!(log_u32, value: u32, repr: IntegerRepresentation);
    composite_log!(log_u64, value: u64, repr: IntegerRepresentation);
    composite_log!(log_i8, value: i8, repr: IntegerRepresentation);
    composite_log!(log_i16, value: i16, repr: IntegerRepresentation);
    composite_log!(log_i32, value: i32, repr: IntegerRepresentation);
    composite_log!(log_i64, value: i64, repr: IntegerRepresentation);
    composite_log!(log_f32, value: f32);
    composite_log!(log_f64, value: f64);
    composite_log!(log_str, value: &str);
    composite_log!(log_raw, value: &[u8]);
    composite_log!(log_system_message, message: &str, code: u16);

    fn is_log_enabled(&self, level: LogLevel, context: &str) -> bool {
        self.recorders
            .iter()
            .any(|recorder| recorder.is_log_enabled(level, context))
    }
}
