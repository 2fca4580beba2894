//! Single-producer/single-consumer byte ring over a module heap.
//!
//! Layout of one ring inside the heap:
//!
//! ```text
//! +-----------+-----------+     +--------------------------------------+
//! | head: u32 | tail: u32 | ... | data region (capacity bytes, pow2)   |
//! +-----------+-----------+     +--------------------------------------+
//! ```
//!
//! `head` and `tail` are free-running counters that wrap modulo 2^32; the
//! number of queued bytes is `head.wrapping_sub(tail)` and stays within
//! `0..=capacity`. A counter indexes the data region through a power-of-two
//! mask, so copies that cross the end of the region split into two segments.
//!
//! Exactly one context may push and exactly one may pop. Only the producer
//! ever stores `head` and only the consumer ever stores `tail`; that
//! single-writer-per-field discipline is what keeps the ring lock-free.
//! Pushes are deliberately lossy: bytes beyond the free capacity are dropped
//! and counted, never blocked on.

use crate::error::BindError;
use crate::heap::{ModuleHeap, Span};
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Resolved geometry of one ring: two counter cells and a data span.
#[derive(Clone, Copy, Debug)]
pub struct RingLayout {
    /// Offset of the head counter cell.
    pub head: u32,
    /// Offset of the tail counter cell.
    pub tail: u32,
    /// Data region; its length is the ring capacity.
    pub data: Span,
}

#[derive(Debug)]
struct RingShared {
    heap: ModuleHeap,
    head: u32,
    tail: u32,
    data: Span,
    mask: u32,
    dropped: AtomicU64,
}

/// Handle to one SPSC byte ring.
///
/// Handles are cheap to clone; clones address the same counters and data.
/// Callers uphold the SPSC discipline: one context calls the push methods,
/// one context calls [`try_pop`](Self::try_pop).
#[derive(Clone, Debug)]
pub struct ByteRing {
    shared: Arc<RingShared>,
}

impl ByteRing {
    /// Resolves `layout` against `heap` into a usable ring.
    ///
    /// Validates that both counter cells are aligned and in bounds, that the
    /// data span fits the heap, and that the capacity is a nonzero power of
    /// two. Does not touch the memory itself; the module owns initialisation.
    pub fn bind(heap: ModuleHeap, layout: RingLayout) -> Result<Self, BindError> {
        heap.check_counter(layout.head)?;
        heap.check_counter(layout.tail)?;
        heap.check_span(layout.data)?;
        let capacity = layout.data.length;
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(BindError::InvalidCapacity { capacity });
        }

        Ok(Self {
            shared: Arc::new(RingShared {
                heap,
                head: layout.head,
                tail: layout.tail,
                data: layout.data,
                mask: capacity - 1,
                dropped: AtomicU64::new(0),
            }),
        })
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.shared.data.length
    }

    /// Number of bytes currently queued. Approximate while the other side is
    /// actively pushing or popping.
    pub fn len(&self) -> u32 {
        let head = self.head_cell().load(Ordering::Acquire);
        let tail = self.tail_cell().load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Returns true when no bytes are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes dropped by lossy pushes since binding.
    pub fn dropped_bytes(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Pushes as much of `bytes` as fits and returns the written count.
    ///
    /// Never blocks. Bytes beyond the free capacity are dropped and added to
    /// the drop counter.
    pub fn try_push(&self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }

        let head = self.head_cell().load(Ordering::Relaxed);
        let tail = self.tail_cell().load(Ordering::Acquire);
        let used = head.wrapping_sub(tail);
        let free = (self.capacity() - used) as usize;

        let written = free.min(bytes.len());
        if written < bytes.len() {
            let lost = (bytes.len() - written) as u64;
            self.shared.dropped.fetch_add(lost, Ordering::Relaxed);
            tracing::trace!(lost, capacity = self.capacity(), "ring full, dropping bytes");
        }
        if written == 0 {
            return 0;
        }

        // SAFETY: the target range [head, head+written) holds at most
        // `free` bytes past head, which the consumer never touches until the
        // head store below publishes them.
        unsafe { self.copy_in(head, &bytes[..written]) };
        self.head_cell()
            .store(head.wrapping_add(written as u32), Ordering::Release);
        written
    }

    /// Pushes a single byte. Returns false when the ring is full and the byte
    /// was dropped.
    pub fn push_one(&self, byte: u8) -> bool {
        self.try_push(&[byte]) == 1
    }

    /// Pops up to `out.len()` bytes into `out` and returns the read count.
    ///
    /// Returns 0 with no side effect when the ring is empty.
    pub fn try_pop(&self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }

        let tail = self.tail_cell().load(Ordering::Relaxed);
        let head = self.head_cell().load(Ordering::Acquire);
        let available = head.wrapping_sub(tail) as usize;
        if available == 0 {
            return 0;
        }

        let read = available.min(out.len());
        // SAFETY: the source range [tail, tail+read) was published by the
        // producer's release store of head; the producer never rewrites bytes
        // until the tail store below frees them.
        unsafe { self.copy_out(tail, &mut out[..read]) };
        self.tail_cell()
            .store(tail.wrapping_add(read as u32), Ordering::Release);
        read
    }

    fn head_cell(&self) -> &AtomicU32 {
        // SAFETY: offset validated against the heap in `bind`.
        unsafe { self.shared.heap.counter_unchecked(self.shared.head) }
    }

    fn tail_cell(&self) -> &AtomicU32 {
        // SAFETY: offset validated against the heap in `bind`.
        unsafe { self.shared.heap.counter_unchecked(self.shared.tail) }
    }

    /// Copies `src` into the data region starting at counter position `at`,
    /// splitting at the wrap boundary when needed.
    ///
    /// # Safety
    /// Caller must ensure `src.len()` bytes past `at` are free.
    unsafe fn copy_in(&self, at: u32, src: &[u8]) {
        let cap = self.capacity() as usize;
        let idx = (at & self.shared.mask) as usize;
        let first = src.len().min(cap - idx);
        let base = self.shared.heap.base().add(self.shared.data.offset as usize);

        ptr::copy_nonoverlapping(src.as_ptr(), base.add(idx), first);
        if first < src.len() {
            ptr::copy_nonoverlapping(src.as_ptr().add(first), base, src.len() - first);
        }
    }

    /// Counterpart of [`copy_in`](Self::copy_in) for the consumer side.
    ///
    /// # Safety
    /// Caller must ensure `out.len()` bytes past `at` are queued.
    unsafe fn copy_out(&self, at: u32, out: &mut [u8]) {
        let cap = self.capacity() as usize;
        let idx = (at & self.shared.mask) as usize;
        let first = out.len().min(cap - idx);
        let base = self.shared.heap.base().add(self.shared.data.offset as usize);

        ptr::copy_nonoverlapping(base.add(idx), out.as_mut_ptr(), first);
        if first < out.len() {
            ptr::copy_nonoverlapping(base, out.as_mut_ptr().add(first), out.len() - first);
        }
    }
}
