//! Resolving channel descriptors against a module's exports.
//!
//! A computation module advertises where its channels live through a small
//! namespace of accessors: one shared capacity plus head/tail/buffer offsets
//! per channel. [`ChannelSet::bind`] resolves that namespace into validated
//! [`ByteRing`] handles exactly once per module instance. The device-to-module
//! and module-to-device rings are mandatory; the keystroke ring is optional
//! and its absence only disables interactive forwarding.

use crate::error::BindError;
use crate::heap::{ModuleHeap, Span};
use crate::ring::{ByteRing, RingLayout};

/// The three byte streams a module can expose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Device → module.
    Rx,
    /// Module → device.
    Tx,
    /// Keystrokes/commands → module.
    Stdin,
}

impl ChannelKind {
    fn export_name(self, field: ExportField) -> &'static str {
        match (self, field) {
            (ChannelKind::Rx, ExportField::Head) => "rx_head_ptr",
            (ChannelKind::Rx, ExportField::Tail) => "rx_tail_ptr",
            (ChannelKind::Rx, ExportField::Buf) => "rx_buf_ptr",
            (ChannelKind::Tx, ExportField::Head) => "tx_head_ptr",
            (ChannelKind::Tx, ExportField::Tail) => "tx_tail_ptr",
            (ChannelKind::Tx, ExportField::Buf) => "tx_buf_ptr",
            (ChannelKind::Stdin, ExportField::Head) => "stdin_head_ptr",
            (ChannelKind::Stdin, ExportField::Tail) => "stdin_tail_ptr",
            (ChannelKind::Stdin, ExportField::Buf) => "stdin_buf_ptr",
        }
    }
}

#[derive(Clone, Copy)]
enum ExportField {
    Head,
    Tail,
    Buf,
}

/// Accessor namespace a computation module exports for channel binding.
///
/// Offsets are byte positions inside the heap returned by
/// [`heap`](Self::heap). `None` models a missing export.
pub trait ModuleExports {
    /// Shared heap every channel lives in.
    fn heap(&self) -> ModuleHeap;

    /// Shared ring capacity in bytes, identical for all channels.
    fn ring_capacity(&self) -> Option<u32>;

    /// Offset of the head counter cell for `kind`.
    fn head_ptr(&self, kind: ChannelKind) -> Option<u32>;

    /// Offset of the tail counter cell for `kind`.
    fn tail_ptr(&self, kind: ChannelKind) -> Option<u32>;

    /// Offset of the data buffer for `kind`.
    fn buf_ptr(&self, kind: ChannelKind) -> Option<u32>;
}

/// Immutable set of bound channels for one module instance.
///
/// Constructed exactly once per instance; a fresh module requires a fresh
/// bind. Handles are cheap to clone so the bridge and the command adapter can
/// each hold their side.
#[derive(Clone, Debug)]
pub struct ChannelSet {
    rx: ByteRing,
    tx: ByteRing,
    stdin: Option<ByteRing>,
    capacity: u32,
}

impl ChannelSet {
    /// Resolves the module's exports into a channel set.
    ///
    /// Fails when the capacity accessor or any RX/TX accessor is missing, or
    /// when a descriptor does not validate against the heap. A missing Stdin
    /// triple is not an error; the set then reports `stdin() == None`.
    /// Binding allocates nothing and never writes to the heap.
    pub fn bind(exports: &dyn ModuleExports) -> Result<Self, BindError> {
        let heap = exports.heap();
        let capacity = exports.ring_capacity().ok_or(BindError::MissingExport {
            name: "capacity",
        })?;

        let rx = bind_required(&heap, exports, ChannelKind::Rx, capacity)?;
        let tx = bind_required(&heap, exports, ChannelKind::Tx, capacity)?;
        let stdin = bind_optional(&heap, exports, ChannelKind::Stdin, capacity)?;
        if stdin.is_none() {
            tracing::debug!("module exports no stdin channel, interactive forwarding disabled");
        }

        Ok(Self {
            rx,
            tx,
            stdin,
            capacity,
        })
    }

    /// Device → module ring.
    pub fn rx(&self) -> &ByteRing {
        &self.rx
    }

    /// Module → device ring.
    pub fn tx(&self) -> &ByteRing {
        &self.tx
    }

    /// Keystroke ring, when the module exports one.
    pub fn stdin(&self) -> Option<&ByteRing> {
        self.stdin.as_ref()
    }

    /// Shared per-channel capacity in bytes.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

fn bind_required(
    heap: &ModuleHeap,
    exports: &dyn ModuleExports,
    kind: ChannelKind,
    capacity: u32,
) -> Result<ByteRing, BindError> {
    let layout = resolve_layout(exports, kind, capacity)?.ok_or(BindError::MissingExport {
        name: kind.export_name(ExportField::Head),
    })?;
    ByteRing::bind(heap.clone(), layout)
}

fn bind_optional(
    heap: &ModuleHeap,
    exports: &dyn ModuleExports,
    kind: ChannelKind,
    capacity: u32,
) -> Result<Option<ByteRing>, BindError> {
    match resolve_layout(exports, kind, capacity)? {
        Some(layout) => ByteRing::bind(heap.clone(), layout).map(Some),
        None => Ok(None),
    }
}

/// Reads one channel's accessor triple. `Ok(None)` means the whole triple is
/// absent; a partially exported triple is reported as the missing accessor.
fn resolve_layout(
    exports: &dyn ModuleExports,
    kind: ChannelKind,
    capacity: u32,
) -> Result<Option<RingLayout>, BindError> {
    let head = exports.head_ptr(kind);
    let tail = exports.tail_ptr(kind);
    let buf = exports.buf_ptr(kind);

    match (head, tail, buf) {
        (Some(head), Some(tail), Some(buf)) => Ok(Some(RingLayout {
            head,
            tail,
            data: Span::new(buf, capacity),
        })),
        (None, None, None) => Ok(None),
        (head, tail, _) => {
            let field = if head.is_none() {
                ExportField::Head
            } else if tail.is_none() {
                ExportField::Tail
            } else {
                ExportField::Buf
            };
            Err(BindError::MissingExport {
                name: kind.export_name(field),
            })
        }
    }
}
