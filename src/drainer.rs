// SPDX-License-Identifier: Apache-2.0 OR MIT
// Slot drainer: pulls flushed slot handles from a bounded ring, runs the
// message builder and pushes the resulting spans through the non-blocking
// writer. Producers enqueue wait-free; the drain itself is serialized by a
// try-lock so whoever gets there first (a producer or the backend's drain
// thread) does the work.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_queue::ArrayQueue;

use crate::builder::MessageBuilder;
use crate::error::{report_initialization_error, Error};
use crate::record::LogRecord;
use crate::slots::{CircularAllocator, SlotHandle};
use crate::writer::{FlushResult, NonBlockingWriter};

/// Capacity of the flushed-handle ring
pub const MAX_QUEUED_SLOTS: usize = 1024;

/// Slots emitted per flush cycle before yielding back to the caller
pub const LIMIT_SLOTS_IN_ONE_CYCLE: usize = 32;

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The queue is drained and no span is pending
    AllDataProcessed,
    /// The descriptor would block mid-span; resume later
    PartiallyProcessed,
    /// The per-cycle slot budget was exhausted; more work is queued
    NumberOfProcessedSlotsExceeded,
}

struct DrainContext {
    builder: Box<dyn MessageBuilder>,
    writer: NonBlockingWriter,
    current_slot: Option<SlotHandle>,
    span_pending: bool,
}

/// Consumer pipeline of one backend.
pub struct SlotDrainer {
    queue: ArrayQueue<SlotHandle>,
    allocator: Arc<CircularAllocator<LogRecord>>,
    context: Mutex<DrainContext>,
    dropped_records: AtomicU64,
}

impl SlotDrainer {
    pub fn new(
        builder: Box<dyn MessageBuilder>,
        allocator: Arc<CircularAllocator<LogRecord>>,
        writer: NonBlockingWriter,
    ) -> Self {
        Self {
            queue: ArrayQueue::new(MAX_QUEUED_SLOTS),
            allocator,
            context: Mutex::new(DrainContext {
                builder,
                writer,
                current_slot: None,
                span_pending: false,
            }),
            dropped_records: AtomicU64::new(0),
        }
    }

    /// Enqueue a flushed slot for emission.
    ///
    /// If the ring is full the record is dropped and its slot returned to
    /// the allocator, so producers are never blocked by a slow sink.
    pub fn push(&self, handle: SlotHandle) {
        if self.queue.push(handle).is_err() {
            // SAFETY: the producer handed the claim over to us.
            unsafe {
                self.allocator
                    .slot_data(handle.selected_slot() as usize)
                    .reset();
            }
            self.allocator.release_slot(handle.selected_slot() as usize);
            self.dropped_records.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records dropped because the handle ring was full
    pub fn dropped_records(&self) -> u64 {
        self.dropped_records.load(Ordering::Relaxed)
    }

    /// Number of handles waiting to be emitted
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Drain queued slots through the builder and writer.
    ///
    /// Processes at most [`LIMIT_SLOTS_IN_ONE_CYCLE`] slots; a concurrent
    /// flush in progress turns this call into a no-op.
    pub fn flush(&self) -> FlushOutcome {
        let mut guard = match self.context.try_lock() {
            Ok(guard) => guard,
            Err(_) => return FlushOutcome::AllDataProcessed,
        };
        let context = &mut *guard;

        let mut processed_slots = 0;
        loop {
            let handle = match context.current_slot {
                Some(handle) => handle,
                None => match self.queue.pop() {
                    Some(handle) => {
                        // SAFETY: the claim travels with the handle; we are
                        // the only consumer.
                        let record =
                            unsafe { self.allocator.slot_data(handle.selected_slot() as usize) };
                        context.builder.set_next_message(record.entry());
                        context.current_slot = Some(handle);
                        context.span_pending = false;
                        handle
                    }
                    None => return FlushOutcome::AllDataProcessed,
                },
            };
            let slot_index = handle.selected_slot() as usize;

            // Drive the bound record until it completes or the fd blocks.
            loop {
                if !context.span_pending {
                    // SAFETY: same claim as above; the previous span borrow
                    // ended when the writer finished it.
                    let record = unsafe { self.allocator.slot_data(slot_index) };
                    match context.builder.next_span(record.entry_mut()) {
                        Some(span) => {
                            // SAFETY: the span points into the builder's
                            // header buffer or the record payload. Neither is
                            // reset before this span reports Done, neither
                            // reallocates, and the slot stays claimed.
                            unsafe { context.writer.set_span(span) };
                            context.span_pending = true;
                        }
                        None => {
                            self.allocator.release_slot(slot_index);
                            context.current_slot = None;
                            processed_slots += 1;
                            break;
                        }
                    }
                    continue;
                }

                match context.writer.flush() {
                    Ok(FlushResult::Done) => context.span_pending = false,
                    Ok(FlushResult::WouldBlock) => return FlushOutcome::PartiallyProcessed,
                    Err(error) => {
                        // Drop the remainder of this record, report
                        // out-of-band, keep draining.
                        self.abandon_current(context, slot_index, &error);
                        processed_slots += 1;
                        break;
                    }
                }
            }

            if processed_slots >= LIMIT_SLOTS_IN_ONE_CYCLE {
                return FlushOutcome::NumberOfProcessedSlotsExceeded;
            }
        }
    }

    fn abandon_current(&self, context: &mut DrainContext, slot_index: usize, error: &Error) {
        report_initialization_error(error);
        // SAFETY: we still hold the claim for slot_index.
        let record = unsafe { self.allocator.slot_data(slot_index) };
        while context.builder.next_span(record.entry_mut()).is_some() {}
        self.allocator.release_slot(slot_index);
        context.current_slot = None;
        context.span_pending = false;
        self.dropped_records.fetch_add(1, Ordering::Relaxed);
    }
}

/// Interval the drain thread sleeps when idle or blocked on the descriptor
const DRAIN_IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Background consumer thread of one backend.
///
/// Runs `flush` in a loop, sleeping while there is nothing to do and
/// yielding between budget-limited cycles. On stop it drains what is queued,
/// then exits; records reserved but never flushed are lost.
pub struct DrainThread {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DrainThread {
    pub fn spawn(drainer: Arc<SlotDrainer>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("mwlog-drain".into())
            .spawn(move || {
                while thread_running.load(Ordering::Relaxed) {
                    match drainer.flush() {
                        FlushOutcome::AllDataProcessed => std::thread::sleep(DRAIN_IDLE_SLEEP),
                        FlushOutcome::PartiallyProcessed => std::thread::sleep(DRAIN_IDLE_SLEEP),
                        FlushOutcome::NumberOfProcessedSlotsExceeded => std::thread::yield_now(),
                    }
                }

                // Final drain of everything still queued, bounded so a sink
                // that stopped accepting bytes cannot hang shutdown.
                let mut attempts = 0;
                while drainer.queued() > 0 && attempts < 128 {
                    if drainer.flush() == FlushOutcome::PartiallyProcessed {
                        std::thread::sleep(DRAIN_IDLE_SLEEP);
                    }
                    attempts += 1;
                }
            })
            .ok();

        if handle.is_none() {
            report_initialization_error(&Error::FailedToSetThreadName);
        }

        Self {
            running,
            handle,
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DrainThread {
    fn drop(&mut self) {
        self.stop();
    }
}
