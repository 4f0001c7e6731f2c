// SPDX-License-Identifier: Apache-2.0 OR MIT
// Alternating (dual) buffer: writers fill one linear region while the single
// reader drains the other. The reader's switch is the only synchronization
// point; producers stay wait-free.

use std::sync::atomic::{fence, AtomicU32, Ordering};

use super::linear::{
    AcquiredRegion, Length, LinearControlBlock, LinearReader, WaitFreeLinearWriter,
};

/// Selects one of the two linear regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    Even,
    Odd,
}

impl BlockId {
    /// The block the given switch count selects for writing
    #[inline]
    pub fn from_switch_count(count: u32) -> Self {
        if count % 2 == 0 {
            BlockId::Even
        } else {
            BlockId::Odd
        }
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            BlockId::Even => BlockId::Odd,
            BlockId::Odd => BlockId::Even,
        }
    }
}

/// Two linear control blocks plus the switch counter whose parity selects
/// the block active for writing.
pub struct AlternatingControlBlock {
    block_even: LinearControlBlock,
    block_odd: LinearControlBlock,
    switch_count: AtomicU32,
}

impl AlternatingControlBlock {
    /// Create with `capacity_per_block` bytes per region.
    ///
    /// Starts with the odd block active for writing and the even block
    /// reserved for the reader, so the first switch hands over an empty
    /// block.
    pub fn new(capacity_per_block: usize) -> Self {
        Self {
            block_even: LinearControlBlock::new(capacity_per_block),
            block_odd: LinearControlBlock::new(capacity_per_block),
            switch_count: AtomicU32::new(1),
        }
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &LinearControlBlock {
        match id {
            BlockId::Even => &self.block_even,
            BlockId::Odd => &self.block_odd,
        }
    }

    #[inline]
    pub fn switch_count(&self) -> u32 {
        self.switch_count.load(Ordering::Acquire)
    }
}

/// An acquired region plus the block it lives in.
#[derive(Debug)]
pub struct AlternatingAcquiredRegion {
    region: AcquiredRegion,
    block_id: BlockId,
}

impl AlternatingAcquiredRegion {
    #[inline]
    pub fn len(&self) -> Length {
        self.region.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block_id
    }
}

/// Wait-free writing to the two alternating regions. Thread-safe for
/// multiple writers.
pub struct WaitFreeAlternatingWriter<'a> {
    control_block: &'a AlternatingControlBlock,
}

impl<'a> WaitFreeAlternatingWriter<'a> {
    pub fn new(control_block: &'a AlternatingControlBlock) -> Self {
        Self { control_block }
    }

    /// Try to reserve `length` bytes on the block currently active for
    /// writing. `None` means "no space"; producers must treat that as a
    /// counted drop, never as an error.
    pub fn acquire(&self, length: Length) -> Option<AlternatingAcquiredRegion> {
        let count = self.control_block.switch_count.load(Ordering::Acquire);
        let block_id = BlockId::from_switch_count(count);
        let writer = WaitFreeLinearWriter::new(self.control_block.block(block_id));

        // A switch may land between the load and the acquire; the late
        // writer is still counted in number_of_writers on the old block, so
        // the reader simply waits for its release.
        writer
            .acquire(length)
            .map(|region| AlternatingAcquiredRegion { region, block_id })
    }

    /// Copy payload bytes into the reserved range
    pub fn write_payload(
        &self,
        region: &AlternatingAcquiredRegion,
        offset_in_region: usize,
        bytes: &[u8],
    ) {
        let writer = WaitFreeLinearWriter::new(self.control_block.block(region.block_id));
        writer.write_payload(&region.region, offset_in_region, bytes);
    }

    /// Publish the entry
    pub fn release(&self, region: AlternatingAcquiredRegion) {
        let writer = WaitFreeLinearWriter::new(self.control_block.block(region.block_id));
        writer.release(region.region);
    }
}

/// Single consumer side of the dual buffer.
///
/// `switch` must not be called concurrently; create exactly one reader per
/// control block.
pub struct AlternatingReader<'a> {
    control_block: &'a AlternatingControlBlock,
}

impl<'a> AlternatingReader<'a> {
    pub fn new(control_block: &'a AlternatingControlBlock) -> Self {
        Self { control_block }
    }

    /// Flip the writer side.
    ///
    /// Resets the block the reader finished draining (making it the new
    /// write target) and returns the id of the previously active block,
    /// which the reader may drain once [`Self::is_block_released`] reports
    /// true.
    pub fn switch(&mut self) -> BlockId {
        let cb = self.control_block;
        let count = cb.switch_count.load(Ordering::Acquire);
        let active = BlockId::from_switch_count(count);

        // The opposite block was drained before this switch; clear its
        // indices so writers start from offset zero.
        cb.block(active.opposite()).reset_indices();

        let previous = cb.switch_count.fetch_add(1, Ordering::AcqRel);
        fence(Ordering::Release);

        BlockId::from_switch_count(previous)
    }

    /// True once every writer has released the given block. On success an
    /// acquire fence synchronizes the subsequent reads with the writers'
    /// releases.
    pub fn is_block_released(&self, block_id: BlockId) -> bool {
        let block = self.control_block.block(block_id);
        let released =
            block.number_of_writers() == 0 && block.written_index() == block.acquired_index();
        if released {
            fence(Ordering::Acquire);
        }
        released
    }

    /// Sequential reader over a released block.
    ///
    /// # Safety
    /// The caller must have observed `is_block_released(block_id)` and no
    /// producer may acquire on this block while the reader is alive (i.e.
    /// do not switch back before dropping it).
    pub unsafe fn read_block(&self, block_id: BlockId) -> LinearReader<'_> {
        LinearReader::new(self.control_block.block(block_id).written_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_block_id_parity() {
        assert_eq!(BlockId::from_switch_count(0), BlockId::Even);
        assert_eq!(BlockId::from_switch_count(1), BlockId::Odd);
        assert_eq!(BlockId::Even.opposite(), BlockId::Odd);
    }

    #[test]
    fn test_acquire_release_and_drain() {
        let control = AlternatingControlBlock::new(1024);
        let writer = WaitFreeAlternatingWriter::new(&control);
        let mut reader = AlternatingReader::new(&control);

        let region = writer.acquire(4).unwrap();
        assert_eq!(region.block_id(), BlockId::Odd);
        writer.write_payload(&region, 0, b"abcd");
        writer.release(region);

        let drained = reader.switch();
        assert_eq!(drained, BlockId::Odd);
        assert!(reader.is_block_released(drained));

        // SAFETY: released observed, no concurrent switch.
        let mut linear = unsafe { reader.read_block(drained) };
        assert_eq!(linear.read(), Some(&b"abcd"[..]));
        assert_eq!(linear.read(), None);
    }

    #[test]
    fn test_rollover_succeeds_after_switch() {
        // Buffer of 1024: 900 + 8 bytes fit, a further 200 + 8 do not.
        let control = AlternatingControlBlock::new(1024);
        let writer = WaitFreeAlternatingWriter::new(&control);
        let mut reader = AlternatingReader::new(&control);

        let big = writer.acquire(900).unwrap();
        writer.write_payload(&big, 0, &[1u8; 900]);
        writer.release(big);

        assert!(writer.acquire(200).is_none());

        let drained = reader.switch();
        assert!(reader.is_block_released(drained));
        {
            let mut linear = unsafe { reader.read_block(drained) };
            assert_eq!(linear.read().map(|d| d.len()), Some(900));
        }

        // The freshly activated block takes the 200-byte entry.
        let second = writer.acquire(200).unwrap();
        assert_eq!(second.block_id(), drained.opposite());
        writer.release(second);
    }

    #[test]
    fn test_reader_waits_for_writer_release() {
        let control = Arc::new(AlternatingControlBlock::new(4096));
        let writer_started = Arc::new(AtomicBool::new(false));

        let control_clone = Arc::clone(&control);
        let started = Arc::clone(&writer_started);
        let producer = thread::spawn(move || {
            let writer = WaitFreeAlternatingWriter::new(&control_clone);
            let region = writer.acquire(64).unwrap();
            started.store(true, Ordering::Release);
            thread::sleep(Duration::from_millis(20));
            writer.write_payload(&region, 0, &[9u8; 64]);
            writer.release(region);
        });

        while !writer_started.load(Ordering::Acquire) {
            std::hint::spin_loop();
        }

        let mut reader = AlternatingReader::new(&control);
        let drained = reader.switch();

        // The producer still holds the block; the reader spins with sleep
        // until released.
        let mut waited = false;
        while !reader.is_block_released(drained) {
            waited = true;
            thread::sleep(Duration::from_millis(1));
        }
        assert!(waited);

        let mut linear = unsafe { reader.read_block(drained) };
        assert_eq!(linear.read().map(|d| d.len()), Some(64));
        producer.join().unwrap();
    }

    #[test]
    fn test_many_producers_one_consumer() {
        let control = Arc::new(AlternatingControlBlock::new(1024 * 1024));
        let mut handles = vec![];

        for t in 0..4u8 {
            let control = Arc::clone(&control);
            handles.push(thread::spawn(move || {
                let writer = WaitFreeAlternatingWriter::new(&control);
                let mut written = 0u32;
                for _ in 0..500 {
                    if let Some(region) = writer.acquire(32) {
                        writer.write_payload(&region, 0, &[t; 32]);
                        writer.release(region);
                        written += 1;
                    }
                }
                written
            }));
        }

        let produced: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        let mut reader = AlternatingReader::new(&control);
        let mut consumed = 0u32;
        for _ in 0..2 {
            let drained = reader.switch();
            while !reader.is_block_released(drained) {
                thread::sleep(Duration::from_millis(1));
            }
            let mut linear = unsafe { reader.read_block(drained) };
            while let Some(entry) = linear.read() {
                assert_eq!(entry.len(), 32);
                consumed += 1;
            }
        }
        assert_eq!(produced, consumed);
    }
}
