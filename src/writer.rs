// SPDX-License-Identifier: Apache-2.0 OR MIT
// Chunked, resumable writer for a non-blocking file descriptor

use std::os::fd::{BorrowedFd, RawFd};

use nix::errno::Errno;

use crate::error::Error;

/// Progress of a flush call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushResult {
    /// The span is not fully written yet; call `flush` again
    WouldBlock,
    /// The whole span reached the descriptor
    Done,
}

/// Injectable write syscall, so tests can model partial writes and errors.
pub trait FdWrite: Send {
    fn write(&mut self, fd: RawFd, buf: &[u8]) -> Result<usize, Errno>;
}

/// Production implementation using `write(2)`.
pub struct SysWrite;

impl FdWrite for SysWrite {
    fn write(&mut self, fd: RawFd, buf: &[u8]) -> Result<usize, Errno> {
        // SAFETY: the fd is owned by the backend for the writer's lifetime.
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        nix::unistd::write(fd, buf)
    }
}

/// Largest chunk a single `write(2)` may carry.
pub fn max_chunk_size() -> usize {
    isize::MAX as usize
}

/// Writes arbitrary-sized byte spans to a non-blocking descriptor in bounded
/// chunks, resumable across partial writes.
///
/// The writer keeps a raw view of the span between `flush` calls; the
/// drainer guarantees the underlying buffer stays valid and untouched until
/// `Done`.
pub struct NonBlockingWriter {
    sys: Box<dyn FdWrite>,
    file_handle: RawFd,
    span_ptr: *const u8,
    span_len: u64,
    flushed_bytes: u64,
    max_chunk_size: usize,
}

// SAFETY: the raw span pointer is only dereferenced inside flush() under the
// drainer's single-consumer discipline; the pointed-to buffers are Send.
unsafe impl Send for NonBlockingWriter {}

impl NonBlockingWriter {
    pub fn new(file_handle: RawFd, chunk_size: usize, sys: Box<dyn FdWrite>) -> Self {
        Self {
            sys,
            file_handle,
            span_ptr: std::ptr::null(),
            span_len: 0,
            flushed_bytes: 0,
            max_chunk_size: chunk_size.min(max_chunk_size()).max(1),
        }
    }

    /// Re-initialize the cursor for a new span.
    ///
    /// # Safety
    /// The memory behind `span` must stay valid and unmodified until `flush`
    /// returns `Done` or `set_span` is called again.
    pub unsafe fn set_span(&mut self, span: &[u8]) {
        self.span_ptr = span.as_ptr();
        self.span_len = span.len() as u64;
        self.flushed_bytes = 0;
    }

    /// True once the current span has been fully written
    pub fn is_done(&self) -> bool {
        self.flushed_bytes == self.span_len
    }

    /// Write at most one chunk and advance the cursor.
    ///
    /// `EAGAIN`-style conditions are not distinguished from a short write:
    /// both surface as `WouldBlock` and the caller retries. Any other write
    /// failure is `Error::Unknown`.
    pub fn flush(&mut self) -> Result<FlushResult, Error> {
        if self.flushed_bytes < self.span_len {
            let left_over = self.span_len - self.flushed_bytes;
            let bytes_to_write = (self.max_chunk_size as u64).min(left_over) as usize;

            // SAFETY: set_span's contract keeps [span_ptr, span_ptr+span_len)
            // valid; flushed_bytes < span_len bounds the offset.
            let chunk = unsafe {
                std::slice::from_raw_parts(
                    self.span_ptr.add(self.flushed_bytes as usize),
                    bytes_to_write,
                )
            };

            match self.sys.write(self.file_handle, chunk) {
                Ok(written) => self.flushed_bytes += written as u64,
                Err(Errno::EAGAIN) => return Ok(FlushResult::WouldBlock),
                Err(_) => return Err(Error::Unknown),
            }
        }

        if self.flushed_bytes == self.span_len {
            Ok(FlushResult::Done)
        } else {
            Ok(FlushResult::WouldBlock)
        }
    }
}
