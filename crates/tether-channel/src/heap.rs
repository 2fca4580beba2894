//! Shared handle over a module heap.
//!
//! A computation module describes its channels as numeric offsets into its
//! heap. Rather than treating those numbers as pointers, the host wraps the
//! heap in a [`ModuleHeap`] and validates every descriptor against the heap's
//! actual length before any access happens. After validation, counter cells
//! are addressed as `AtomicU32` and data spans through raw copies whose ranges
//! the rings keep disjoint.

use crate::error::BindError;
use crate::region::SharedRegion;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

/// Byte-range descriptor within the module heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    /// Offset in bytes from the start of the heap.
    pub offset: u32,
    /// Length in bytes.
    pub length: u32,
}

impl Span {
    /// Constructs a span covering `length` bytes starting at `offset`.
    pub const fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }
}

/// Cloneable handle over the shared memory a module exports its channels in.
///
/// The handle keeps the backing [`SharedRegion`] alive and is the only path
/// through which channel code touches the memory: counter cells come out as
/// atomics, bulk data moves through offsets that were bounds-checked when the
/// owning descriptor was bound.
#[derive(Clone, Debug)]
pub struct ModuleHeap {
    region: Arc<SharedRegion>,
}

impl ModuleHeap {
    /// Wraps an allocated region as a module heap.
    pub fn new(region: SharedRegion) -> Self {
        Self {
            region: Arc::new(region),
        }
    }

    /// Heap length in bytes.
    pub fn len(&self) -> usize {
        self.region.len()
    }

    /// Returns true when the heap has zero length.
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }

    /// Validates that `offset` names an aligned `u32` counter cell in bounds.
    pub fn check_counter(&self, offset: u32) -> Result<(), BindError> {
        if offset % 4 != 0 {
            return Err(BindError::MisalignedCounter { offset });
        }
        self.check_span(Span::new(offset, 4))
    }

    /// Validates that `span` lies entirely within the heap.
    pub fn check_span(&self, span: Span) -> Result<(), BindError> {
        let end = span.offset as u64 + span.length as u64;
        if end > self.len() as u64 {
            return Err(BindError::OutOfBounds {
                offset: span.offset,
                length: span.length,
                heap_len: self.len(),
            });
        }
        Ok(())
    }

    /// Borrows the counter cell at `offset`.
    ///
    /// # Safety
    /// `offset` must have been validated with [`check_counter`](Self::check_counter)
    /// against this heap.
    pub(crate) unsafe fn counter_unchecked(&self, offset: u32) -> &AtomicU32 {
        // SAFETY: caller guarantees the offset is in bounds and 4-byte
        // aligned; zero-initialised memory is a valid AtomicU32.
        &*(self.region.base().as_ptr().add(offset as usize) as *const AtomicU32)
    }

    /// Raw base pointer of the heap.
    ///
    /// # Safety
    /// Callers must keep every derived access inside spans validated with
    /// [`check_span`](Self::check_span) and uphold the single-writer
    /// discipline for ranges written concurrently.
    pub(crate) unsafe fn base(&self) -> *mut u8 {
        self.region.base().as_ptr()
    }
}
