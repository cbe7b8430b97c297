//! Sample buffers shared with the audio-out service.
//!
//! Each buffer is a page-aligned heap region that is either being filled by the writer or queued
//! with the service, never both: handing a buffer to the service moves the [`OutputBuffer`]
//! value, and the writer only gets it back from the service's released queue.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use crate::PAGE_SIZE;

/// Zero-initialised, page-aligned memory owned by one output buffer.
pub struct PageBuf {
    ptr: NonNull<u8>,
    len: usize,
}

// `PageBuf` uniquely owns its allocation; moving it to the service's playback thread is the
// handoff.
unsafe impl Send for PageBuf {}

impl PageBuf {
    /// Allocate `len` zeroed bytes aligned to [`PAGE_SIZE`].
    ///
    /// Returns `None` for a zero length or when the allocator fails.
    pub fn try_new(len: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let layout = Layout::from_size_align(len, PAGE_SIZE).ok()?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        NonNull::new(ptr).map(|ptr| Self { ptr, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` points at `len` initialised bytes owned by `self`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for PageBuf {
    fn drop(&mut self) {
        // SAFETY: the layout matches the one used in `try_new`, which already validated it.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.len, PAGE_SIZE);
            dealloc(self.ptr.as_ptr(), layout);
        }
    }
}

impl core::fmt::Debug for PageBuf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageBuf")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// One output buffer as exchanged with the service.
///
/// Mirrors the service ABI: `buffer_size` is the declared total size, `data_size` the number of
/// valid sample bytes, and `reserved` an unused field the service expects to be zero. The fill
/// length never exceeds the backing memory, which is the same fixed size for every buffer in a
/// pool.
#[derive(Debug)]
pub struct OutputBuffer {
    index: usize,
    memory: PageBuf,
    buffer_size: usize,
    data_size: usize,
    reserved: u64,
}

impl OutputBuffer {
    /// Wrap freshly allocated memory as pool buffer `index`.
    ///
    /// New buffers are declared completely full so that pre-submitting them primes the service
    /// with silence.
    pub fn new(index: usize, memory: PageBuf) -> Self {
        let len = memory.len();
        Self {
            index,
            memory,
            buffer_size: len,
            data_size: len,
            reserved: 0,
        }
    }

    /// Position of this buffer in the pool it was allocated for.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fixed capacity of the backing memory.
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    /// Declared total size as last written for the service.
    ///
    /// Buffers coming back from the service may carry a stale value here; the writer relies on
    /// [`OutputBuffer::capacity`] instead.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        self.buffer_size = size;
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Set the fill length, clamped to the capacity.
    pub fn set_data_size(&mut self, size: usize) {
        self.data_size = size.min(self.capacity());
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.data_size
    }

    pub fn clear(&mut self) {
        self.data_size = 0;
    }

    /// Valid sample bytes.
    pub fn data(&self) -> &[u8] {
        &self.memory.as_slice()[..self.data_size]
    }

    /// Start address of the backing memory, as registered with the service.
    pub fn sample_data(&self) -> *const u8 {
        self.memory.as_ptr()
    }

    /// Append as much of `bytes` as fits and return the number of bytes copied.
    ///
    /// Also re-asserts the declared size to the fixed capacity.
    pub fn fill(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.remaining());
        let start = self.data_size;
        self.memory.as_mut_slice()[start..start + n].copy_from_slice(&bytes[..n]);
        self.data_size += n;
        self.buffer_size = self.capacity();
        n
    }
}
