// SPDX-License-Identifier: Apache-2.0 OR MIT
// LogStream: scoped builder for one log statement, flushed on drop.

use std::cell::Cell;

use crate::ident::LoggingIdentifier;
use crate::level::LogLevel;
use crate::recorder::Recorder;
use crate::runtime::Runtime;
use crate::slots::SlotHandle;
use crate::types::{
    IntegerRepresentation, LogBin16, LogBin32, LogBin64, LogBin8, LogHex16, LogHex32, LogHex64,
    LogHex8, LogRawBuffer, LogSystemMessage,
};

thread_local! {
    static INSIDE_LOGGING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as "inside the logging stack" while alive.
///
/// A log statement started under this flag binds to the fallback recorder
/// instead of the active one, breaking recursion when user code logs from
/// within an argument formatter.
pub(crate) struct ThreadLocalGuard {
    was_inside: bool,
}

impl ThreadLocalGuard {
    pub fn enter() -> Self {
        let was_inside = INSIDE_LOGGING.with(|flag| flag.replace(true));
        Self { was_inside }
    }

    pub fn is_within_logging() -> bool {
        INSIDE_LOGGING.with(Cell::get)
    }
}

impl Drop for ThreadLocalGuard {
    fn drop(&mut self) {
        INSIDE_LOGGING.with(|flag| flag.set(self.was_inside));
    }
}

/// Scoped log statement. Streamed values are formatted into the reserved
/// record; the record is flushed when the stream is dropped.
///
/// Move-only by construction: moving the stream transfers the slot handle,
/// the moved-from binding is gone and nothing double-flushes.
pub struct LogStream {
    recorder: &'static dyn Recorder,
    fallback_recorder: &'static dyn Recorder,
    slot: Option<SlotHandle>,
    context_id: LoggingIdentifier,
    log_level: LogLevel,
}

impl LogStream {
    pub(crate) fn new(log_level: LogLevel, context_id: &str) -> Self {
        let runtime = Runtime::instance();
        let fallback_recorder = runtime.fallback_recorder();
        let recorder = if ThreadLocalGuard::is_within_logging() {
            fallback_recorder
        } else {
            runtime.recorder()
        };
        Self::with_recorders(recorder, fallback_recorder, log_level, context_id)
    }

    /// Bind a stream to explicit recorders (runtime-independent)
    pub fn with_recorders(
        recorder: &'static dyn Recorder,
        fallback_recorder: &'static dyn Recorder,
        log_level: LogLevel,
        context_id: &str,
    ) -> Self {
        let context = LoggingIdentifier::new(context_id);
        let slot = {
            let _guard = ThreadLocalGuard::enter();
            recorder.start_record(context.as_str(), log_level)
        };
        Self {
            recorder,
            fallback_recorder,
            slot,
            context_id: context,
            log_level,
        }
    }

    /// Dispatch to the bound recorder, or to the fallback when the call
    /// itself happens from inside the logging stack.
    fn call<R>(&self, f: impl FnOnce(&dyn Recorder) -> R) -> R {
        if ThreadLocalGuard::is_within_logging() {
            f(self.fallback_recorder)
        } else {
            let _guard = ThreadLocalGuard::enter();
            f(self.recorder)
        }
    }

    pub(crate) fn log_with(&mut self, f: impl FnOnce(&dyn Recorder, &SlotHandle)) {
        if let Some(slot) = self.slot {
            self.call(|recorder| f(recorder, &slot));
        }
    }

    /// Append a value to the statement
    pub fn value<T: Loggable>(mut self, value: T) -> Self {
        value.add_to(&mut self);
        self
    }

    /// Flush the record and start a fresh one on the same context and level
    pub fn flush(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.call(|recorder| recorder.stop_record(&slot));
        }
        self.slot = self.call(|recorder| {
            recorder.start_record(self.context_id.as_str(), self.log_level)
        });
    }

    /// True if a record was reserved for this statement
    pub fn is_active(&self) -> bool {
        self.slot.is_some()
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.call(|recorder| recorder.stop_record(&slot));
        }
    }
}

/// Values that can be streamed into a [`LogStream`].
pub trait Loggable {
    fn add_to(self, stream: &mut LogStream);
}

impl Loggable for bool {
    fn add_to(self, stream: &mut LogStream) {
        stream.log_with(|recorder, slot| recorder.log_bool(slot, self));
    }
}

macro_rules! loggable_int {
    ($ty:ty, $method:ident) => {
        impl Loggable for $ty {
            fn add_to(self, stream: &mut LogStream) {
                stream.log_with(|recorder, slot| {
                    recorder.$method(slot, self, IntegerRepresentation::Decimal)
                });
            }
        }
    };
}

loggable_int!(u8, log_u8);
loggable_int!(u16, log_u16);
loggable_int!(u32, log_u32);
loggable_int!(u64, log_u64);
loggable_int!(i8, log_i8);
loggable_int!(i16, log_i16);
loggable_int!(i32, log_i32);
loggable_int!(i64, log_i64);

impl Loggable for f32 {
    fn add_to(self, stream: &mut LogStream) {
        stream.log_with(|recorder, slot| recorder.log_f32(slot, self));
    }
}

impl Loggable for f64 {
    fn add_to(self, stream: &mut LogStream) {
        stream.log_with(|recorder, slot| recorder.log_f64(slot, self));
    }
}

impl Loggable for &str {
    fn add_to(self, stream: &mut LogStream) {
        stream.log_with(|recorder, slot| recorder.log_str(slot, self));
    }
}

impl Loggable for &String {
    fn add_to(self, stream: &mut LogStream) {
        stream.log_with(|recorder, slot| recorder.log_str(slot, self));
    }
}

macro_rules! loggable_wrapped {
    ($ty:ty, $method:ident, $repr:expr) => {
        impl Loggable for $ty {
            fn add_to(self, stream: &mut LogStream) {
                stream.log_with(|recorder, slot| recorder.$method(slot, self.0, $repr));
            }
        }
    };
}

loggable_wrapped!(LogHex8, log_u8, IntegerRepresentation::Hex);
loggable_wrapped!(LogHex16, log_u16, IntegerRepresentation::Hex);
loggable_wrapped!(LogHex32, log_u32, IntegerRepresentation::Hex);
loggable_wrapped!(LogHex64, log_u64, IntegerRepresentation::Hex);
loggable_wrapped!(LogBin8, log_u8, IntegerRepresentation::Binary);
loggable_wrapped!(LogBin16, log_u16, IntegerRepresentation::Binary);
loggable_wrapped!(LogBin32, log_u32, IntegerRepresentation::Binary);
loggable_wrapped!(LogBin64, log_u64, IntegerRepresentation::Binary);

impl Loggable for LogRawBuffer<'_> {
    fn add_to(self, stream: &mut LogStream) {
        stream.log_with(|recorder, slot| recorder.log_raw(slot, self.0));
    }
}

impl Loggable for LogSystemMessage<'_> {
    fn add_to(self, stream: &mut LogStream) {
        stream.log_with(|recorder, slot| {
            recorder.log_system_message(slot, self.message, self.code)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ProbeRecorder {
        starts: AtomicUsize,
        stops: AtomicUsize,
        values: Mutex<Vec<String>>,
        give_slots: bool,
    }

    impl ProbeRecorder {
        fn active() -> Self {
            Self {
                give_slots: true,
                ..Default::default()
            }
        }
    }

    impl Recorder for ProbeRecorder {
        fn start_record(&self, _context_id: &str, _log_level: LogLevel) -> Option<SlotHandle> {
            self.starts.fetch_add(1, Ordering::Relaxed);
            self.give_slots.then(|| SlotHandle::from_slot(0))
        }
        fn stop_record(&self, _handle: &SlotHandle) {
            self.stops.fetch_add(1, Ordering::Relaxed);
        }
        fn log_bool(&self, _h: &SlotHandle, value: bool) {
            self.values.lock().unwrap().push(format!("bool:{value}"));
        }
        fn log_u8(&self, _h: &SlotHandle, v: u8, r: IntegerRepresentation) {
            self.values.lock().unwrap().push(format!("u8:{v}:{r:?}"));
        }
        fn log_u16(&self, _h: &SlotHandle, v: u16, r: IntegerRepresentation) {
            self.values.lock().unwrap().push(format!("u16:{v}:{r:?}"));
        }
        fn log_u32(&self, _h: &SlotHandle, v: u32, r: IntegerRepresentation) {
            self.values.lock().unwrap().push(format!("u32:{v}:{r:?}"));
        }
        fn log_u64(&self, _h: &SlotHandle, v: u64, r: IntegerRepresentation) {
            self.values.lock().unwrap().push(format!("u64:{v}:{r:?}"));
        }
        fn log_i8(&self, _h: &SlotHandle, v: i8, _r: IntegerRepresentation) {
            self.values.lock().unwrap().push(format!("i8:{v}"));
        }
        fn log_i16(&self, _h: &SlotHandle, v: i16, _r: IntegerRepresentation) {
            self.values.lock().unwrap().push(format!("i16:{v}"));
        }
        fn log_i32(&self, _h: &SlotHandle, v: i32, _r: IntegerRepresentation) {
            self.values.lock().unwrap().push(format!("i32:{v}"));
        }
        fn log_i64(&self, _h: &SlotHandle, v: i64, _r: IntegerRepresentation) {
            self.values.lock().unwrap().push(format!("i64:{v}"));
        }
        fn log_f32(&self, _h: &SlotHandle, v: f32) {
            self.values.lock().unwrap().push(format!("f32:{v}"));
        }
        fn log_f64(&self, _h: &SlotHandle, v: f64) {
            self.values.lock().unwrap().push(format!("f64:{v}"));
        }
        fn log_str(&self, _h: &SlotHandle, v: &str) {
            self.values.lock().unwrap().push(format!("str:{v}"));
        }
        fn log_raw(&self, _h: &SlotHandle, v: &[u8]) {
            self.values.lock().unwrap().push(format!("raw:{}", v.len()));
        }
        fn log_system_message(&self, _h: &SlotHandle, m: &str, c: u16) {
            self.values.lock().unwrap().push(format!("sys:{m}:{c}"));
        }
        fn is_log_enabled(&self, _level: LogLevel, _context: &str) -> bool {
            true
        }
    }

    fn leaked(recorder: ProbeRecorder) -> &'static ProbeRecorder {
        Box::leak(Box::new(recorder))
    }

    #[test]
    fn test_stream_flushes_on_drop() {
        let recorder = leaked(ProbeRecorder::active());
        {
            let _stream =
                LogStream::with_recorders(recorder, recorder, LogLevel::Info, "CTX1");
        }
        assert_eq!(recorder.starts.load(Ordering::Relaxed), 1);
        assert_eq!(recorder.stops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_stream_without_slot_never_stops() {
        let recorder = leaked(ProbeRecorder::default());
        {
            let stream = LogStream::with_recorders(recorder, recorder, LogLevel::Info, "CTX1");
            assert!(!stream.is_active());
        }
        assert_eq!(recorder.stops.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_streamed_values_reach_recorder() {
        let recorder = leaked(ProbeRecorder::active());
        {
            let stream = LogStream::with_recorders(recorder, recorder, LogLevel::Info, "CTX1");
            let _stream = stream
                .value(true)
                .value(42u32)
                .value(-1i64)
                .value(1.5f64)
                .value("text")
                .value(LogHex8(0xff))
                .value(LogBin16(3))
                .value(LogRawBuffer(&[1, 2, 3]))
                .value(LogSystemMessage {
                    message: "sys",
                    code: 9,
                });
        }
        let values = recorder.values.lock().unwrap();
        assert_eq!(
            *values,
            vec![
                "bool:true",
                "u32:42:Decimal",
                "i64:-1",
                "f64:1.5",
                "str:text",
                "u8:255:Hex",
                "u16:3:Binary",
                "raw:3",
                "sys:sys:9",
            ]
        );
    }

    #[test]
    fn test_flush_restarts_record() {
        let recorder = leaked(ProbeRecorder::active());
        {
            let mut stream =
                LogStream::with_recorders(recorder, recorder, LogLevel::Info, "CTX1");
            stream.flush();
        }
        assert_eq!(recorder.starts.load(Ordering::Relaxed), 2);
        assert_eq!(recorder.stops.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_nested_statement_uses_fallback() {
        let active = leaked(ProbeRecorder::active());
        let fallback = leaked(ProbeRecorder::active());

        let _guard = ThreadLocalGuard::enter();
        // Started while inside the logging stack: binds to the fallback.
        {
            let _stream = LogStream::with_recorders(
                if ThreadLocalGuard::is_within_logging() {
                    fallback
                } else {
                    active
                },
                fallback,
                LogLevel::Info,
                "CTX1",
            );
        }
        assert_eq!(active.starts.load(Ordering::Relaxed), 0);
        assert_eq!(fallback.starts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_guard_nesting_restores_state() {
        assert!(!ThreadLocalGuard::is_within_logging());
        {
            let _outer = ThreadLocalGuard::enter();
            assert!(ThreadLocalGuard::is_within_logging());
            {
                let _inner = ThreadLocalGuard::enter();
                assert!(ThreadLocalGuard::is_within_logging());
            }
            assert!(ThreadLocalGuard::is_within_logging());
        }
        assert!(!ThreadLocalGuard::is_within_logging());
    }
}
