//! Backing memory for module heaps.
//!
//! The computation module owns the memory every channel lives in; binding only
//! produces descriptors over it. Hosts that embed a module natively (and the
//! test fixtures) still need to materialise that heap somewhere, which is what
//! [`SharedRegion`] provides: a fixed-size, aligned, zeroed allocation that
//! prefers an anonymous `mmap` and falls back to the heap when the mapping
//! cannot honor the requested alignment.

use crate::error::{ChannelError, ChannelResult};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

#[derive(Debug)]
enum Backing {
    Mapped(#[allow(dead_code)] memmap2::MmapMut),
    Owned { layout: Layout },
}

/// Fixed-size zeroed allocation backing a module heap.
///
/// The base pointer is captured once at construction so shared handles can
/// address the region without re-borrowing the backing object.
#[derive(Debug)]
pub struct SharedRegion {
    len: usize,
    alignment: usize,
    base: NonNull<u8>,
    backing: Backing,
}

// SAFETY: the region is a plain byte allocation. All concurrent access is
// funneled through `ModuleHeap`, which hands out atomic counter cells and
// enforces the single-writer-per-range copy discipline of the rings.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Allocates a zeroed region of `len` bytes aligned to `alignment`.
    ///
    /// Anonymous mappings arrive zero-filled from the kernel; the heap
    /// fallback uses `alloc_zeroed`. Either way callers may assume every byte
    /// (counter cells included) starts at zero.
    pub fn zeroed(len: usize, alignment: usize) -> ChannelResult<Self> {
        if len == 0 || alignment == 0 || !alignment.is_power_of_two() {
            return Err(ChannelError::AllocationFailed {
                size: len,
                alignment,
            });
        }

        if let Some(region) = Self::mapped(len, alignment) {
            return Ok(region);
        }
        Self::heap_backed(len, alignment)
    }

    fn mapped(len: usize, alignment: usize) -> Option<Self> {
        let mut map = memmap2::MmapOptions::new().len(len).map_anon().ok()?;
        let base = NonNull::new(map.as_mut_ptr())?;
        if base.as_ptr() as usize % alignment != 0 {
            return None;
        }
        Some(Self {
            len,
            alignment,
            base,
            backing: Backing::Mapped(map),
        })
    }

    fn heap_backed(len: usize, alignment: usize) -> ChannelResult<Self> {
        let layout =
            Layout::from_size_align(len, alignment).map_err(|_| ChannelError::AllocationFailed {
                size: len,
                alignment,
            })?;

        // SAFETY: layout has nonzero size (checked in `zeroed`).
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or(ChannelError::AllocationFailed {
            size: len,
            alignment,
        })?;

        Ok(Self {
            len,
            alignment,
            base,
            backing: Backing::Owned { layout },
        })
    }

    /// Total number of bytes managed by this region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the region has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the alignment the region was allocated with.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub(crate) fn base(&self) -> NonNull<u8> {
        self.base
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if let Backing::Owned { layout } = &self.backing {
            // SAFETY: pointer and layout come from the matching alloc_zeroed.
            unsafe { dealloc(self.base.as_ptr(), *layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_region_starts_clean() {
        let region = SharedRegion::zeroed(4096, 64).expect("allocate region");
        assert_eq!(region.len(), 4096);
        assert_eq!(region.base().as_ptr() as usize % 64, 0);
        // SAFETY: freshly allocated region, exclusively owned here.
        let bytes = unsafe { std::slice::from_raw_parts(region.base().as_ptr(), region.len()) };
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn rejects_degenerate_requests() {
        assert!(SharedRegion::zeroed(0, 64).is_err());
        assert!(SharedRegion::zeroed(64, 0).is_err());
        assert!(SharedRegion::zeroed(64, 48).is_err());
    }
}
