// SPDX-License-Identifier: Apache-2.0 OR MIT
// Bounded wait-free push-only stack. Elements are never removed; the logger
// registry relies on that to hand out references that live as long as the
// process.

use std::cell::UnsafeCell;
use std::sync::atomic::{fence, AtomicBool, AtomicI32, AtomicUsize, Ordering};

/// Wait- and lock-free push-only stack with fixed capacity.
///
/// Push claims an index with a fetch-add, writes the element and then
/// publishes it via the `written` flag; find only looks at published
/// entries. Elements stay put forever, so shared references handed out by
/// `try_push`/`find` remain valid for the stack's lifetime.
pub struct WaitFreeStack<T> {
    elements: Box<[UnsafeCell<Option<T>>]>,
    elements_written: Box<[AtomicI32]>,
    write_index: AtomicUsize,
    capacity_full: AtomicBool,
}

// SAFETY: WaitFreeStack is Sync because:
// - each element cell is written exactly once, by the thread that claimed
//   its index via the fetch-add on write_index
// - readers only dereference a cell after observing written != 0 through an
//   acquire fence paired with the writer's release fence
// - no element is ever mutated or removed after publication
unsafe impl<T: Send + Sync> Sync for WaitFreeStack<T> {}
unsafe impl<T: Send> Send for WaitFreeStack<T> {}

impl<T> WaitFreeStack<T> {
    pub fn new(max_number_of_elements: usize) -> Self {
        let elements: Vec<UnsafeCell<Option<T>>> = (0..max_number_of_elements)
            .map(|_| UnsafeCell::new(None))
            .collect();
        let elements_written: Vec<AtomicI32> = (0..max_number_of_elements)
            .map(|_| AtomicI32::new(0))
            .collect();
        Self {
            elements: elements.into_boxed_slice(),
            elements_written: elements_written.into_boxed_slice(),
            write_index: AtomicUsize::new(0),
            capacity_full: AtomicBool::new(false),
        }
    }

    /// Insert an element if capacity is left; returns a reference to the
    /// stored element on success.
    pub fn try_push(&self, element: T) -> Option<&T> {
        if self.capacity_full.load(Ordering::Relaxed) {
            return None;
        }

        let index = self.write_index.fetch_add(1, Ordering::Relaxed);
        if index >= self.elements.len() {
            self.capacity_full.store(true, Ordering::Relaxed);
            return None;
        }

        // SAFETY: the fetch-add handed us exclusive ownership of this index
        // and it has never been written before.
        unsafe {
            *self.elements[index].get() = Some(element);
        }

        fence(Ordering::Release);
        self.elements_written[index].store(1, Ordering::Relaxed);

        // SAFETY: published above; the cell is never touched again.
        unsafe { (*self.elements[index].get()).as_ref() }
    }

    /// Return the first published element matching the predicate
    pub fn find<P: Fn(&T) -> bool>(&self, predicate: P) -> Option<&T> {
        let written_up_to = self.write_index.load(Ordering::Relaxed);
        for index in 0..self.elements.len().min(written_up_to.saturating_add(1)) {
            if self.elements_written[index].load(Ordering::Relaxed) != 0 {
                fence(Ordering::Acquire);
                // SAFETY: written flag observed, element is published and
                // immutable from here on.
                let element = unsafe { (*self.elements[index].get()).as_ref() };
                if let Some(element) = element {
                    if predicate(element) {
                        return Some(element);
                    }
                }
            }
        }
        None
    }

    pub fn capacity(&self) -> usize {
        self.elements.len()
    }
}
