// SPDX-License-Identifier: Apache-2.0 OR MIT
// Linear control block: one half of the dual-buffer queue.
//
// Producers reserve disjoint length-prefixed sub-ranges with a fetch-add on
// the acquire index; the reader walks the region sequentially once all
// writers have released it.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Index/length type of the queue. Entries are prefixed with one `Length`.
pub type Length = u64;

/// Size of the length prefix stored before each entry's payload.
pub const LENGTH_PREFIX_BYTES: Length = std::mem::size_of::<Length>() as Length;

/// Upper bound for a single acquire. Keeps index arithmetic overflow-free
/// and is comfortably above the largest DLT message.
pub const fn max_acquire_length_bytes() -> Length {
    128 * 1024 * 1024
}

/// Maximum number of producers concurrently inside acquire/release.
pub const fn max_concurrent_writers() -> Length {
    64
}

/// Maximum total capacity of one linear buffer.
///
/// With at most 64 writers each over-reserving at most one maximal entry,
/// the acquire index can never wrap `u64`.
pub const fn max_linear_buffer_capacity_bytes() -> Length {
    Length::MAX - max_concurrent_writers() * (max_acquire_length_bytes() + LENGTH_PREFIX_BYTES)
}

fn bytes_fit_in_remaining_capacity(capacity: Length, offset: Length, number_of_bytes: Length) -> bool {
    if offset > capacity {
        return false;
    }
    number_of_bytes <= capacity - offset
}

/// Shared state of one linear buffer region.
pub struct LinearControlBlock {
    data: Box<[UnsafeCell<u8>]>,
    acquired_index: AtomicU64,
    written_index: AtomicU64,
    number_of_writers: AtomicU64,
}

// SAFETY: LinearControlBlock is Sync because:
// - each producer only writes the disjoint byte range it reserved via the
//   fetch-add on acquired_index
// - the reader only dereferences the data after observing
//   number_of_writers == 0 && written_index == acquired_index with an
//   acquire fence, i.e. after every writer's release
unsafe impl Sync for LinearControlBlock {}
unsafe impl Send for LinearControlBlock {}

impl LinearControlBlock {
    /// # Panics
    /// Panics if `capacity` exceeds [`max_linear_buffer_capacity_bytes`].
    pub fn new(capacity: usize) -> Self {
        assert!(
            (capacity as Length) <= max_linear_buffer_capacity_bytes(),
            "linear buffer capacity out of range"
        );
        let data: Vec<UnsafeCell<u8>> = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
        Self {
            data: data.into_boxed_slice(),
            acquired_index: AtomicU64::new(0),
            written_index: AtomicU64::new(0),
            number_of_writers: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn capacity(&self) -> Length {
        self.data.len() as Length
    }

    pub fn acquired_index(&self) -> Length {
        self.acquired_index.load(Ordering::Acquire)
    }

    pub fn written_index(&self) -> Length {
        self.written_index.load(Ordering::Acquire)
    }

    pub fn number_of_writers(&self) -> Length {
        self.number_of_writers.load(Ordering::Acquire)
    }

    /// Reset both indices; only valid between a drain and the next switch.
    pub fn reset_indices(&self) {
        self.acquired_index.store(0, Ordering::Release);
        self.written_index.store(0, Ordering::Release);
    }

    fn write_bytes(&self, offset: Length, bytes: &[u8]) {
        debug_assert!(bytes_fit_in_remaining_capacity(
            self.capacity(),
            offset,
            bytes.len() as Length
        ));
        // SAFETY: the caller (writer) owns [offset, offset + bytes.len())
        // exclusively between acquire and release.
        unsafe {
            let base = self.data.as_ptr() as *mut u8;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), base.add(offset as usize), bytes.len());
        }
    }

    /// View of the written region.
    ///
    /// # Safety
    /// No writer may be active: the caller must have observed
    /// `number_of_writers == 0 && written_index == acquired_index` (with
    /// acquire ordering) and no new producer may target this block until the
    /// returned slice is dropped.
    pub unsafe fn written_data(&self) -> &[u8] {
        let written = self.written_index.load(Ordering::Acquire) as usize;
        let length = written.min(self.data.len());
        std::slice::from_raw_parts(self.data.as_ptr() as *const u8, length)
    }
}

/// A reserved sub-range of a linear buffer, not yet published.
#[derive(Debug)]
pub struct AcquiredRegion {
    offset: Length,
    length: Length,
}

impl AcquiredRegion {
    #[inline]
    pub fn len(&self) -> Length {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Wait-free writing into a linear buffer. Thread-safe for multiple writers;
/// entries are never overwritten and come out first-in first-out.
pub struct WaitFreeLinearWriter<'a> {
    control_block: &'a LinearControlBlock,
}

impl<'a> WaitFreeLinearWriter<'a> {
    pub fn new(control_block: &'a LinearControlBlock) -> Self {
        Self { control_block }
    }

    /// Try to reserve `length` payload bytes (plus the length prefix).
    ///
    /// Returns `None` when the entry would not fit; that is the expected
    /// overload behavior and is counted by the caller. Never blocks.
    pub fn acquire(&self, length: Length) -> Option<AcquiredRegion> {
        if length == 0 || length > max_acquire_length_bytes() {
            return None;
        }

        let cb = self.control_block;

        // 1. Announce the writer so a concurrent reader switch cannot
        //    declare this block quiescent mid-reservation.
        cb.number_of_writers.fetch_add(1, Ordering::AcqRel);

        // 2. Reserve the range.
        let needed = length + LENGTH_PREFIX_BYTES;
        let offset = cb.acquired_index.fetch_add(needed, Ordering::AcqRel);

        if !bytes_fit_in_remaining_capacity(cb.capacity(), offset, needed) {
            // 3. Roll back our own addition; each writer only ever undoes
            //    the exact amount it added, so the index stays consistent.
            cb.acquired_index.fetch_sub(needed, Ordering::AcqRel);
            cb.number_of_writers.fetch_sub(1, Ordering::AcqRel);
            return None;
        }

        Some(AcquiredRegion { offset, length })
    }

    /// Copy payload bytes into the reserved range.
    ///
    /// # Panics
    /// Panics if the write would exceed the reservation.
    pub fn write_payload(&self, region: &AcquiredRegion, offset_in_region: usize, bytes: &[u8]) {
        assert!(
            (offset_in_region as Length) + (bytes.len() as Length) <= region.length,
            "write beyond acquired region"
        );
        let offset = region.offset + LENGTH_PREFIX_BYTES + offset_in_region as Length;
        self.control_block.write_bytes(offset, bytes);
    }

    /// Publish the entry: store the length prefix and make the bytes
    /// visible to the reader.
    pub fn release(&self, region: AcquiredRegion) {
        let cb = self.control_block;

        cb.write_bytes(region.offset, &region.length.to_le_bytes());

        // The release on written_index publishes the prefix and payload
        // bytes; it pairs with the reader's acquire fence.
        cb.written_index
            .fetch_add(region.length + LENGTH_PREFIX_BYTES, Ordering::AcqRel);
        cb.number_of_writers.fetch_sub(1, Ordering::Release);
    }
}

/// Sequential reader over a fully released linear region.
///
/// Not thread-safe; only use after the last writer has finished.
pub struct LinearReader<'a> {
    data: &'a [u8],
    read_index: usize,
}

impl<'a> LinearReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            read_index: 0,
        }
    }

    /// Read the next entry's payload.
    ///
    /// A corrupt length prefix (beyond the acquire bound or past the end of
    /// the region) drops the remainder of the block.
    pub fn read(&mut self) -> Option<&'a [u8]> {
        let prefix = LENGTH_PREFIX_BYTES as usize;
        if self.read_index + prefix > self.data.len() {
            return None;
        }

        let mut length_bytes = [0u8; 8];
        length_bytes.copy_from_slice(&self.data[self.read_index..self.read_index + prefix]);
        let length = Length::from_le_bytes(length_bytes);

        if length > max_acquire_length_bytes() {
            self.read_index = self.data.len();
            return None;
        }

        let start = self.read_index + prefix;
        let end = start.checked_add(length as usize)?;
        if end > self.data.len() {
            self.read_index = self.data.len();
            return None;
        }

        self.read_index = end;
        Some(&self.data[start..end])
    }

    /// Total size of the underlying region including prefixes
    pub fn size_of_whole_data_buffer(&self) -> Length {
        self.data.len() as Length
    }
}
