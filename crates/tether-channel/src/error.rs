//! Error surface for the channel layer.
//!
//! The layer keeps two small families apart: allocation failures when a host
//! materialises a module heap ([`ChannelError`]), and validation failures when
//! channel descriptors are resolved against a module's exports ([`BindError`]).
//! Data-path faults (overflow) are absorbed by the rings themselves and only
//! surface through per-ring drop counters.

use thiserror::Error;

/// Convenience result alias for fallible channel operations.
pub type ChannelResult<T, E = ChannelError> = Result<T, E>;

/// Errors surfaced by low-level heap helpers.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Allocation of a module heap failed for the given size/alignment pair.
    #[error("failed to allocate module heap of {size} bytes aligned to {alignment}")]
    AllocationFailed { size: usize, alignment: usize },
}

/// Errors produced while binding a channel set against module exports.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    /// A required accessor is not exported by the module.
    #[error("module is missing required export `{name}`")]
    MissingExport { name: &'static str },
    /// The exported ring capacity is unusable.
    #[error("ring capacity {capacity} must be a nonzero power of two")]
    InvalidCapacity { capacity: u32 },
    /// A counter cell offset is not 4-byte aligned.
    #[error("counter cell at offset {offset} must be 4-byte aligned")]
    MisalignedCounter { offset: u32 },
    /// A descriptor points outside the module heap.
    #[error("span {offset}..+{length} falls outside the {heap_len}-byte module heap")]
    OutOfBounds {
        offset: u32,
        length: u32,
        heap_len: usize,
    },
}
