//! Shared-memory byte channels between a host and a computation module.
//!
//! This crate holds the transport half that lives in shared memory:
//! * [`SharedRegion`] – contiguous, aligned allocation backing a module heap.
//! * [`ModuleHeap`] / [`Span`] – validated handle over the heap the module exports.
//! * [`ByteRing`] – lossy single-producer/single-consumer byte ring.
//! * [`ModuleExports`] / [`ChannelSet`] – one-shot binding of the RX/TX/Stdin
//!   rings against the accessors a module exports.
//!
//! Payload bytes are opaque here; pumping them to and from a physical device
//! is the bridge crate's job.

mod bind;
mod error;
mod heap;
mod region;
mod ring;

pub use bind::{ChannelKind, ChannelSet, ModuleExports};
pub use error::{BindError, ChannelError, ChannelResult};
pub use heap::{ModuleHeap, Span};
pub use region::SharedRegion;
pub use ring::{ByteRing, RingLayout};
