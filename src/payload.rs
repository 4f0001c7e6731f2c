// SPDX-License-Identifier: Apache-2.0 OR MIT
// Append-only payload buffer with fixed capacity and reserve-callback writes

/// Append-only byte buffer with a fixed capacity.
///
/// Backs one log record's argument payload. The buffer is allocated once and
/// never reallocates: `len() <= capacity()` holds at all times and appends
/// that would exceed the capacity are silently truncated (the calling
/// formatter reports `NotAdded`).
#[derive(Debug, Clone, Default)]
pub struct VerbosePayload {
    buf: Vec<u8>,
    capacity: usize,
}

impl VerbosePayload {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append bytes, truncating silently to the remaining capacity
    pub fn put(&mut self, bytes: &[u8]) {
        let length = bytes.len().min(self.remaining_capacity());
        self.buf.extend_from_slice(&bytes[..length]);
    }

    /// Reserve scratch space, let `fill` write into it, keep only what it used.
    ///
    /// Reserves `min(reserve_hint, remaining_capacity)` bytes (the full
    /// remaining capacity when the hint is `None` or zero), passes the
    /// scratch span to `fill`, then shrinks the buffer back so that exactly
    /// the used byte count `fill` returned (capped at the reservation) stays.
    ///
    /// This is the pattern that lets formatters render directly into the
    /// record without intermediate allocations.
    ///
    /// Returns the number of bytes kept.
    pub fn put_with<F>(&mut self, reserve_hint: Option<usize>, fill: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let remaining = self.remaining_capacity();
        let reserved = match reserve_hint {
            Some(hint) if hint > 0 => hint.min(remaining),
            _ => remaining,
        };

        let old_len = self.buf.len();
        self.buf.resize(old_len + reserved, 0);
        let used = fill(&mut self.buf[old_len..old_len + reserved]).min(reserved);
        self.buf.truncate(old_len + used);
        used
    }

    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// True if appending `length` bytes would exceed the capacity
    #[inline]
    pub fn will_overflow(&self, length: usize) -> bool {
        length > self.remaining_capacity()
    }

    /// Clear the content, preserving the capacity
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
