// SPDX-License-Identifier: Apache-2.0 OR MIT
// Lock-free circular slot allocator and the slot handle carried by producers
//
// The allocator follows the reserve-then-write discipline also used by the
// wait-free queue: a monotonic claim counter picks a candidate slot, a CAS on
// the slot's `in_use` flag takes exclusive ownership.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Maximum number of concrete recorders a composite handle can address.
pub const MAX_RECORDERS: usize = 8;

/// Index of a slot inside one backend's allocator.
pub type SlotIndex = u32;

/// Identifies one concrete recorder inside a composite recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecorderId(pub usize);

/// Opaque tag for a reserved record.
///
/// For a single-backend recorder exactly one entry is active. The composite
/// recorder stores one entry per child that managed to reserve a slot; the
/// active bits are exactly the children participating in this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotHandle {
    slots: [SlotIndex; MAX_RECORDERS],
    active: u8,
    selected: u8,
}

impl SlotHandle {
    /// Handle for a single-backend recorder
    pub fn from_slot(index: SlotIndex) -> Self {
        let mut handle = Self::default();
        handle.set_slot(index, RecorderId(0));
        handle
    }

    /// Record that `recorder` reserved `index` for this message
    pub fn set_slot(&mut self, index: SlotIndex, recorder: RecorderId) {
        debug_assert!(recorder.0 < MAX_RECORDERS);
        self.slots[recorder.0] = index;
        self.active |= 1 << recorder.0;
        self.selected = recorder.0 as u8;
    }

    pub fn slot(&self, recorder: RecorderId) -> SlotIndex {
        self.slots[recorder.0]
    }

    pub fn is_recorder_active(&self, recorder: RecorderId) -> bool {
        recorder.0 < MAX_RECORDERS && (self.active & (1 << recorder.0)) != 0
    }

    /// The slot of the recorder selected last; single-backend recorders use
    /// this to get their only slot back.
    pub fn selected_slot(&self) -> SlotIndex {
        self.slots[self.selected as usize]
    }

    /// True if at least one recorder reserved a slot for this record
    pub fn any_active(&self) -> bool {
        self.active != 0
    }
}

struct Slot<T> {
    data: UnsafeCell<T>,
    in_use: AtomicBool,
}

/// Fixed-capacity ring of reusable record slots.
///
/// Concurrent producers claim an exclusive slot via CAS; the drainer (or
/// whichever consumer holds the logical claim) releases it when the record
/// has been emitted. Slots are allocated once at construction and never
/// reallocated.
pub struct CircularAllocator<T> {
    slots: Box<[Slot<T>]>,
    claimed_sequence: AtomicUsize,
}

// SAFETY: CircularAllocator is Sync because:
// - a slot's data is only accessed by the unique owner of its claim
//   (established by the in_use CAS, relinquished by release_slot)
// - the claim transfer pairs AcqRel on the CAS with Release on the reset
unsafe impl<T: Send> Sync for CircularAllocator<T> {}
unsafe impl<T: Send> Send for CircularAllocator<T> {}

impl<T> CircularAllocator<T> {
    /// Create an allocator with `capacity` slots built by `init`
    ///
    /// # Panics
    /// Panics if capacity is 0 or exceeds `SlotIndex` range.
    pub fn new<F: Fn() -> T>(capacity: usize, init: F) -> Self {
        assert!(capacity > 0, "allocator capacity must be non-zero");
        assert!(
            capacity <= SlotIndex::MAX as usize,
            "allocator capacity exceeds slot index range"
        );
        let slots: Vec<Slot<T>> = (0..capacity)
            .map(|_| Slot {
                data: UnsafeCell::new(init()),
                in_use: AtomicBool::new(false),
            })
            .collect();
        Self {
            slots: slots.into_boxed_slice(),
            claimed_sequence: AtomicUsize::new(0),
        }
    }

    /// Claim an exclusive slot for writing.
    ///
    /// Bounded: probes at most one full pass over the ring, then reports
    /// `None` (the caller counts a "no slot available" event).
    pub fn acquire_slot(&self) -> Option<usize> {
        for _ in 0..self.slots.len() {
            // 1. Advance the claim counter; reduce to a candidate index.
            let sequence = self.claimed_sequence.fetch_add(1, Ordering::Relaxed);
            let index = sequence % self.slots.len();

            // 2. Try to take ownership of the candidate.
            if self.slots[index]
                .in_use
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(index);
            }
        }
        None
    }

    /// Return a slot to the ring.
    ///
    /// The release store pairs with the next owner's acquire on the CAS, so
    /// everything written into the slot happens-before its reuse.
    pub fn release_slot(&self, index: usize) {
        self.slots[index].in_use.store(false, Ordering::Release);
    }

    /// Access the buffer behind a claimed slot.
    ///
    /// # Safety
    /// The caller must hold the logical claim for `index` (obtained from
    /// `acquire_slot` and not yet released) and must not create overlapping
    /// references to the same slot.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slot_data(&self, index: usize) -> &mut T {
        &mut *self.slots[index].data.get()
    }

    /// Number of slots currently claimed (diagnostic)
    pub fn used_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.in_use.load(Ordering::Relaxed))
            .count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
