//! Mock computation module for tests.
//!
//! Owns a heap laid out the way a real module exports it: six `u32` counter
//! cells up front, then one data buffer per channel. Implements
//! [`ModuleExports`] so hosts can bind against it, and exposes the module
//! side of each channel (draining RX/Stdin, producing TX) so tests can play
//! both ends of the shared memory.

use tether_channel::{
    ByteRing, ChannelKind, ModuleExports, ModuleHeap, RingLayout, SharedRegion, Span,
};

const RX_HEAD: u32 = 0;
const RX_TAIL: u32 = 4;
const TX_HEAD: u32 = 8;
const TX_TAIL: u32 = 12;
const STDIN_HEAD: u32 = 16;
const STDIN_TAIL: u32 = 20;
/// Buffers start past the counter block, on a cache-line boundary.
const BUF_BASE: u32 = 64;

/// In-process stand-in for a computation module.
pub struct MockModule {
    heap: ModuleHeap,
    capacity: u32,
    rx: ByteRing,
    tx: ByteRing,
    stdin: Option<ByteRing>,
}

impl MockModule {
    /// Builds a module exporting all three channels of `capacity` bytes each.
    pub fn new(capacity: u32) -> Self {
        Self::build(capacity, true)
    }

    /// Builds a module without the optional stdin channel.
    pub fn without_stdin(capacity: u32) -> Self {
        Self::build(capacity, false)
    }

    fn build(capacity: u32, with_stdin: bool) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "mock module capacity must be a power of two"
        );
        let channels = if with_stdin { 3 } else { 2 };
        let len = BUF_BASE as usize + channels * capacity as usize;
        let heap = ModuleHeap::new(SharedRegion::zeroed(len, 64).expect("mock heap"));

        let ring = |head, tail, buf| {
            ByteRing::bind(
                heap.clone(),
                RingLayout {
                    head,
                    tail,
                    data: Span::new(buf, capacity),
                },
            )
            .expect("mock ring bind")
        };

        let rx = ring(RX_HEAD, RX_TAIL, BUF_BASE);
        let tx = ring(TX_HEAD, TX_TAIL, BUF_BASE + capacity);
        let stdin = with_stdin.then(|| ring(STDIN_HEAD, STDIN_TAIL, BUF_BASE + 2 * capacity));

        Self {
            heap,
            capacity,
            rx,
            tx,
            stdin,
        }
    }

    /// Module side of RX: consume bytes the host pushed from the device.
    pub fn drain_rx(&self, out: &mut [u8]) -> usize {
        self.rx.try_pop(out)
    }

    /// Module side of TX: queue output bytes for the host to drain.
    pub fn produce_tx(&self, bytes: &[u8]) -> usize {
        self.tx.try_push(bytes)
    }

    /// Module side of Stdin: consume forwarded keystrokes.
    ///
    /// # Panics
    /// Panics when the module was built without a stdin channel.
    pub fn drain_stdin(&self, out: &mut [u8]) -> usize {
        self.stdin
            .as_ref()
            .expect("mock module has no stdin channel")
            .try_pop(out)
    }
}

impl ModuleExports for MockModule {
    fn heap(&self) -> ModuleHeap {
        self.heap.clone()
    }

    fn ring_capacity(&self) -> Option<u32> {
        Some(self.capacity)
    }

    fn head_ptr(&self, kind: ChannelKind) -> Option<u32> {
        match kind {
            ChannelKind::Rx => Some(RX_HEAD),
            ChannelKind::Tx => Some(TX_HEAD),
            ChannelKind::Stdin => self.stdin.as_ref().map(|_| STDIN_HEAD),
        }
    }

    fn tail_ptr(&self, kind: ChannelKind) -> Option<u32> {
        match kind {
            ChannelKind::Rx => Some(RX_TAIL),
            ChannelKind::Tx => Some(TX_TAIL),
            ChannelKind::Stdin => self.stdin.as_ref().map(|_| STDIN_TAIL),
        }
    }

    fn buf_ptr(&self, kind: ChannelKind) -> Option<u32> {
        match kind {
            ChannelKind::Rx => Some(BUF_BASE),
            ChannelKind::Tx => Some(BUF_BASE + self.capacity),
            ChannelKind::Stdin => self.stdin.as_ref().map(|_| BUF_BASE + 2 * self.capacity),
        }
    }
}
