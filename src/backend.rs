// SPDX-License-Identifier: Apache-2.0 OR MIT
// Backends: each sink owns a slot allocator and the machinery that turns
// flushed slots into bytes. The file/console backend drains through the
// non-blocking writer; the remote backend commits records into the
// wait-free alternating ring.

use std::os::fd::RawFd;
use std::sync::Arc;

use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};

use crate::builder::MessageBuilder;
use crate::drainer::{DrainThread, SlotDrainer};
use crate::queue::{AlternatingControlBlock, WaitFreeAlternatingWriter};
use crate::record::LogRecord;
use crate::slots::{CircularAllocator, SlotHandle};
use crate::writer::{FdWrite, NonBlockingWriter};

/// One sink: reserve a slot, expose its record for formatting, flush it.
pub trait Backend: Send + Sync {
    /// Reserve a slot before a producer may write.
    ///
    /// Returns `None` when every slot is claimed; the caller counts the
    /// drop. A returned handle guarantees exclusive access to the record
    /// until `flush_slot`.
    fn reserve_slot(&self) -> Option<SlotHandle>;

    /// Hand a finished record to the sink. The slot becomes reusable once
    /// the sink is done with it.
    fn flush_slot(&self, handle: &SlotHandle);

    /// Run `f` on the record behind a reserved slot.
    fn with_record(&self, handle: &SlotHandle, f: &mut dyn FnMut(&mut LogRecord));
}

fn set_nonblocking_cloexec(fd: RawFd) {
    if let Ok(flags) = fcntl(fd, FcntlArg::F_GETFL) {
        let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
        let _ = fcntl(fd, FcntlArg::F_SETFL(flags));
    }
    let _ = fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC));
}

/// Backend draining DLT or text messages to a file descriptor (log file,
/// stdout).
///
/// The descriptor is switched to non-blocking mode with close-on-exec; a
/// background thread drains the slot ring, and producers opportunistically
/// drain on reserve/flush so an idle thread never delays emission.
pub struct FileOutputBackend {
    // Field order matters: the drain thread must stop before the drainer
    // and allocator go away.
    drain_thread: DrainThread,
    drainer: Arc<SlotDrainer>,
    allocator: Arc<CircularAllocator<LogRecord>>,
}

impl FileOutputBackend {
    pub fn new(
        builder: Box<dyn MessageBuilder>,
        file_descriptor: RawFd,
        allocator: Arc<CircularAllocator<LogRecord>>,
        chunk_size: usize,
        sys: Box<dyn FdWrite>,
    ) -> Self {
        set_nonblocking_cloexec(file_descriptor);

        let writer = NonBlockingWriter::new(file_descriptor, chunk_size, sys);
        let drainer = Arc::new(SlotDrainer::new(builder, Arc::clone(&allocator), writer));
        let drain_thread = DrainThread::spawn(Arc::clone(&drainer));

        Self {
            drain_thread,
            drainer,
            allocator,
        }
    }

    pub fn drainer(&self) -> &SlotDrainer {
        &self.drainer
    }

    /// Stop the drain thread after it has drained the queued slots
    pub fn shutdown(&mut self) {
        self.drain_thread.stop();
    }
}

impl Backend for FileOutputBackend {
    fn reserve_slot(&self) -> Option<SlotHandle> {
        self.drainer.flush();
        let slot = self.allocator.acquire_slot()?;
        // SAFETY: freshly acquired claim.
        unsafe { self.allocator.slot_data(slot) }.reset();
        Some(SlotHandle::from_slot(slot as u32))
    }

    fn flush_slot(&self, handle: &SlotHandle) {
        self.drainer.push(*handle);
        self.drainer.flush();
    }

    fn with_record(&self, handle: &SlotHandle, f: &mut dyn FnMut(&mut LogRecord)) {
        // SAFETY: the handle proves the caller holds the claim.
        let record = unsafe { self.allocator.slot_data(handle.selected_slot() as usize) };
        f(record);
    }
}

/// Byte layout of one record in the remote ring, before the payload
const REMOTE_ENTRY_HEADER_BYTES: usize = 4 + 4 + 1 + 1;

/// Backend committing flushed records into the shared alternating ring for
/// the remote collector.
///
/// The collector process owns the reader side; this backend only ever
/// acquires, fills and releases. A failed acquire means the ring is
/// saturated and the record is dropped (counted).
pub struct RemoteBackend {
    allocator: Arc<CircularAllocator<LogRecord>>,
    ring: Arc<AlternatingControlBlock>,
    dropped_records: std::sync::atomic::AtomicU64,
}

impl RemoteBackend {
    pub fn new(
        allocator: Arc<CircularAllocator<LogRecord>>,
        ring: Arc<AlternatingControlBlock>,
    ) -> Self {
        Self {
            allocator,
            ring,
            dropped_records: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn ring(&self) -> &AlternatingControlBlock {
        &self.ring
    }

    pub fn dropped_records(&self) -> u64 {
        self.dropped_records
            .load(std::sync::atomic::Ordering::Relaxed)
    }

    fn commit(&self, record: &LogRecord) -> bool {
        let entry = record.entry();
        let total = REMOTE_ENTRY_HEADER_BYTES + entry.payload.len();

        let writer = WaitFreeAlternatingWriter::new(&self.ring);
        let Some(region) = writer.acquire(total as u64) else {
            return false;
        };

        writer.write_payload(&region, 0, &entry.app_id.bytes());
        writer.write_payload(&region, 4, &entry.ctx_id.bytes());
        writer.write_payload(&region, 8, &[entry.log_level.as_u8(), entry.num_of_args]);
        writer.write_payload(&region, REMOTE_ENTRY_HEADER_BYTES, entry.payload.as_slice());
        writer.release(region);
        true
    }
}

impl Backend for RemoteBackend {
    fn reserve_slot(&self) -> Option<SlotHandle> {
        let slot = self.allocator.acquire_slot()?;
        // SAFETY: freshly acquired claim.
        unsafe { self.allocator.slot_data(slot) }.reset();
        Some(SlotHandle::from_slot(slot as u32))
    }

    fn flush_slot(&self, handle: &SlotHandle) {
        let slot = handle.selected_slot() as usize;
        // SAFETY: the producer handed the claim over to us.
        let record = unsafe { self.allocator.slot_data(slot) };
        if !self.commit(record) {
            self.dropped_records
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
        record.reset();
        self.allocator.release_slot(slot);
    }

    fn with_record(&self, handle: &SlotHandle, f: &mut dyn FnMut(&mut LogRecord)) {
        // SAFETY: the handle proves the caller holds the claim.
        let record = unsafe { self.allocator.slot_data(handle.selected_slot() as usize) };
        f(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TextMessageBuilder;
    use crate::dlt::DltFormat;
    use crate::ident::LoggingIdentifier;
    use crate::level::LogLevel;
    use crate::queue::AlternatingReader;
    use crate::types::IntegerRepresentation;
    use nix::errno::Errno;
    use std::sync::Mutex;
    use std::time::Duration;

    struct CaptureWrite(Arc<Mutex<Vec<u8>>>);

    impl FdWrite for CaptureWrite {
        fn write(&mut self, _fd: RawFd, buf: &[u8]) -> Result<usize, Errno> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    fn file_backend() -> (FileOutputBackend, Arc<Mutex<Vec<u8>>>) {
        let bytes = Arc::new(Mutex::new(Vec::new()));
        let allocator = Arc::new(CircularAllocator::new(4, || LogRecord::new(128)));
        let backend = FileOutputBackend::new(
            Box::new(TextMessageBuilder::new(LoggingIdentifier::new("NONE"))),
            -1,
            allocator,
            1024,
            Box::new(CaptureWrite(Arc::clone(&bytes))),
        );
        (backend, bytes)
    }

    #[test]
    fn test_file_backend_reserve_write_flush() {
        let (backend, bytes) = file_backend();
        let handle = backend.reserve_slot().unwrap();

        backend.with_record(&handle, &mut |record| {
            let entry = record.entry_mut();
            entry.app_id = LoggingIdentifier::new("APP1");
            entry.ctx_id = LoggingIdentifier::new("CTX1");
            entry.log_level = LogLevel::Error;
            crate::text::TextFormat::log_u32(
                &mut entry.payload,
                13,
                IntegerRepresentation::Decimal,
            );
            entry.num_of_args = 1;
        });
        backend.flush_slot(&handle);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while bytes.lock().unwrap().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let written = String::from_utf8(bytes.lock().unwrap().clone()).unwrap();
        assert!(written.contains(" log error verbose 1 "));
        assert!(written.ends_with("13 \n"));
    }

    #[test]
    fn test_file_backend_exhaustion() {
        let (backend, _bytes) = file_backend();
        // Slots are reclaimed by the drain thread, so claim them faster than
        // they can drain by never flushing.
        let mut handles = vec![];
        while let Some(handle) = backend.reserve_slot() {
            handles.push(handle);
            if handles.len() > 8 {
                break;
            }
        }
        assert!(handles.len() <= 4);
    }

    #[test]
    fn test_remote_backend_roundtrip() {
        let allocator = Arc::new(CircularAllocator::new(4, || LogRecord::new(128)));
        let ring = Arc::new(AlternatingControlBlock::new(4096));
        let backend = RemoteBackend::new(allocator, Arc::clone(&ring));

        let handle = backend.reserve_slot().unwrap();
        backend.with_record(&handle, &mut |record| {
            let entry = record.entry_mut();
            entry.app_id = LoggingIdentifier::new("APP1");
            entry.ctx_id = LoggingIdentifier::new("CTX1");
            entry.log_level = LogLevel::Warn;
            DltFormat::log_str(&mut entry.payload, "hi");
            entry.num_of_args = 1;
        });
        backend.flush_slot(&handle);
        assert_eq!(backend.dropped_records(), 0);

        let mut reader = AlternatingReader::new(&ring);
        let drained = reader.switch();
        assert!(reader.is_block_released(drained));
        // SAFETY: released observed, no further producers.
        let mut linear = unsafe { reader.read_block(drained) };
        let entry = linear.read().unwrap();
        assert_eq!(&entry[0..4], b"APP1");
        assert_eq!(&entry[4..8], b"CTX1");
        assert_eq!(entry[8], LogLevel::Warn.as_u8());
        assert_eq!(entry[9], 1);
        // DLT string argument follows.
        assert_eq!(&entry[10..14], &((1u32 << 9) | (1 << 15)).to_le_bytes()[..]);
    }

    #[test]
    fn test_remote_backend_counts_ring_overflow() {
        let allocator = Arc::new(CircularAllocator::new(2, || LogRecord::new(128)));
        // Ring too small for even one header.
        let ring = Arc::new(AlternatingControlBlock::new(8));
        let backend = RemoteBackend::new(Arc::clone(&allocator), ring);

        let handle = backend.reserve_slot().unwrap();
        backend.flush_slot(&handle);
        assert_eq!(backend.dropped_records(), 1);
        // Slot is still recycled.
        assert_eq!(allocator.used_count(), 0);
    }
}
