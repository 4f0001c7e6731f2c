// Statistics reporter: hot-path drops become counters, surfaced periodically
// as a single warn-level self-log instead of per-site reports.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::level::LogLevel;
use crate::recorder::Recorder;
use crate::types::IntegerRepresentation;

fn monotonic_nanos() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos() as u64
}

/// Counts records lost on the hot path and periodically reports them.
///
/// The report travels through the normal recorder at warn level; the
/// `currently_reporting` flag keeps the self-log from recursing into
/// another report.
pub struct StatisticsReporter {
    report_interval: Duration,
    number_of_slots: usize,
    slot_size_bytes: usize,
    no_slot_available_counter: AtomicUsize,
    message_too_long_counter: AtomicUsize,
    last_report_nanos: AtomicU64,
    currently_reporting: AtomicBool,
}

impl StatisticsReporter {
    pub fn new(
        report_interval: Duration,
        number_of_slots: usize,
        slot_size_bytes: usize,
    ) -> Self {
        Self {
            report_interval,
            number_of_slots,
            slot_size_bytes,
            no_slot_available_counter: AtomicUsize::new(0),
            message_too_long_counter: AtomicUsize::new(0),
            last_report_nanos: AtomicU64::new(monotonic_nanos()),
            currently_reporting: AtomicBool::new(false),
        }
    }

    /// A `start_record` found no free slot
    pub fn increment_no_slot_available(&self) {
        self.no_slot_available_counter.fetch_add(1, Ordering::Relaxed);
    }

    /// An argument did not fit the record payload
    pub fn increment_message_too_long(&self) {
        self.message_too_long_counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn no_slot_available(&self) -> usize {
        self.no_slot_available_counter.load(Ordering::Relaxed)
    }

    pub fn message_too_long(&self) -> usize {
        self.message_too_long_counter.load(Ordering::Relaxed)
    }

    /// Emit the periodic report when the interval elapsed and there is
    /// something to say. Counters reset with each report.
    pub fn update(&self, recorder: &dyn Recorder) {
        if self.report_interval.is_zero() {
            return;
        }
        if self.currently_reporting.load(Ordering::Relaxed) {
            return;
        }

        let now = monotonic_nanos();
        let last = self.last_report_nanos.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.report_interval.as_nanos() as u64 {
            return;
        }
        // One reporter wins the interval; losers return.
        if self
            .last_report_nanos
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        if self.currently_reporting.swap(true, Ordering::Acquire) {
            return;
        }

        let no_slot = self.no_slot_available_counter.swap(0, Ordering::Relaxed);
        let too_long = self.message_too_long_counter.swap(0, Ordering::Relaxed);

        if no_slot > 0 || too_long > 0 {
            if let Some(handle) = recorder.start_record("DFLT", LogLevel::Warn) {
                recorder.log_str(&handle, "mwlog dropped records since last report:");
                recorder.log_str(&handle, "no slot available");
                recorder.log_u64(&handle, no_slot as u64, IntegerRepresentation::Decimal);
                recorder.log_str(&handle, "message too long");
                recorder.log_u64(&handle, too_long as u64, IntegerRepresentation::Decimal);
                recorder.log_str(&handle, "slots");
                recorder.log_u64(
                    &handle,
                    self.number_of_slots as u64,
                    IntegerRepresentation::Decimal,
                );
                recorder.log_str(&handle, "slot bytes");
                recorder.log_u64(
                    &handle,
                    self.slot_size_bytes as u64,
                    IntegerRepresentation::Decimal,
                );
                recorder.stop_record(&handle);
            }
        }

        self.currently_reporting.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::SlotHandle;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ProbeRecorder {
        started: Mutex<Vec<(String, LogLevel)>>,
        strings: Mutex<Vec<String>>,
        numbers: Mutex<Vec<u64>>,
    }

    impl Recorder for ProbeRecorder {
        fn start_record(&self, context_id: &str, log_level: LogLevel) -> Option<SlotHandle> {
            self.started
                .lock()
                .unwrap()
                .push((context_id.to_string(), log_level));
            Some(SlotHandle::from_slot(0))
        }
        fn stop_record(&self, _handle: &SlotHandle) {}
        fn log_bool(&self, _handle: &SlotHandle, _value: bool) {}
        fn log_u8(&self, _h: &SlotHandle, _v: u8, _r: IntegerRepresentation) {}
        fn log_u16(&self, _h: &SlotHandle, _v: u16, _r: IntegerRepresentation) {}
        fn log_u32(&self, _h: &SlotHandle, _v: u32, _r: IntegerRepresentation) {}
        fn log_u64(&self, _h: &SlotHandle, v: u64, _r: IntegerRepresentation) {
            self.numbers.lock().unwrap().push(v);
        }
        fn log_i8(&self, _h: &SlotHandle, _v: i8, _r: IntegerRepresentation) {}
        fn log_i16(&self, _h: &SlotHandle, _v: i16, _r: IntegerRepresentation) {}
        fn log_i32(&self, _h: &SlotHandle, _v: i32, _r: IntegerRepresentation) {}
        fn log_i64(&self, _h: &SlotHandle, _v: i64, _r: IntegerRepresentation) {}
        fn log_f32(&self, _h: &SlotHandle, _v: f32) {}
        fn log_f64(&self, _h: &SlotHandle, _v: f64) {}
        fn log_str(&self, _h: &SlotHandle, value: &str) {
            self.strings.lock().unwrap().push(value.to_string());
        }
        fn log_raw(&self, _h: &SlotHandle, _value: &[u8]) {}
        fn log_system_message(&self, _h: &SlotHandle, _message: &str, _code: u16) {}
        fn is_log_enabled(&self, _level: LogLevel, _context: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_counters() {
        let stats = StatisticsReporter::new(Duration::from_secs(300), 8, 2048);
        stats.increment_no_slot_available();
        stats.increment_no_slot_available();
        stats.increment_message_too_long();
        assert_eq!(stats.no_slot_available(), 2);
        assert_eq!(stats.message_too_long(), 1);
    }

    #[test]
    fn test_report_emitted_after_interval() {
        let stats = StatisticsReporter::new(Duration::from_nanos(1), 8, 2048);
        stats.increment_no_slot_available();

        let recorder = ProbeRecorder::default();
        std::thread::sleep(Duration::from_millis(1));
        stats.update(&recorder);

        let started = recorder.started.lock().unwrap();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].1, LogLevel::Warn);
        assert_eq!(recorder.numbers.lock().unwrap()[0], 1);

        // Counters reset with the report.
        assert_eq!(stats.no_slot_available(), 0);
    }

    #[test]
    fn test_no_report_when_nothing_dropped() {
        let stats = StatisticsReporter::new(Duration::from_nanos(1), 8, 2048);
        let recorder = ProbeRecorder::default();
        std::thread::sleep(Duration::from_millis(1));
        stats.update(&recorder);
        assert!(recorder.started.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_interval_disables_reporting() {
        let stats = StatisticsReporter::new(Duration::ZERO, 8, 2048);
        stats.increment_no_slot_available();
        let recorder = ProbeRecorder::default();
        stats.update(&recorder);
        assert!(recorder.started.lock().unwrap().is_empty());
        assert_eq!(stats.no_slot_available(), 1);
    }
}
