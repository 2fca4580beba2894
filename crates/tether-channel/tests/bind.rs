//! Binding behaviour against a module's exported accessor namespace.

use tether_channel::{
    BindError, ByteRing, ChannelKind, ChannelSet, ModuleExports, ModuleHeap, RingLayout,
    SharedRegion, Span,
};
use tether_mock::MockModule;

/// Delegating exports with one accessor hidden, for missing-export cases.
struct Masked<'a> {
    inner: &'a MockModule,
    hide: &'static str,
}

fn prefix(kind: ChannelKind) -> &'static str {
    match kind {
        ChannelKind::Rx => "rx",
        ChannelKind::Tx => "tx",
        ChannelKind::Stdin => "stdin",
    }
}

impl ModuleExports for Masked<'_> {
    fn heap(&self) -> ModuleHeap {
        self.inner.heap()
    }

    fn ring_capacity(&self) -> Option<u32> {
        if self.hide == "capacity" {
            None
        } else {
            self.inner.ring_capacity()
        }
    }

    fn head_ptr(&self, kind: ChannelKind) -> Option<u32> {
        if self.hide == format!("{}_head_ptr", prefix(kind)) {
            None
        } else {
            self.inner.head_ptr(kind)
        }
    }

    fn tail_ptr(&self, kind: ChannelKind) -> Option<u32> {
        if self.hide == format!("{}_tail_ptr", prefix(kind)) {
            None
        } else {
            self.inner.tail_ptr(kind)
        }
    }

    fn buf_ptr(&self, kind: ChannelKind) -> Option<u32> {
        if self.hide == format!("{}_buf_ptr", prefix(kind)) {
            None
        } else {
            self.inner.buf_ptr(kind)
        }
    }
}

#[test]
fn binds_all_three_channels() {
    let module = MockModule::new(64);
    let set = ChannelSet::bind(&module).expect("bind");

    assert_eq!(set.capacity(), 64);
    assert!(set.stdin().is_some());

    // host pushes device bytes, module drains them
    assert_eq!(set.rx().try_push(b"hello"), 5);
    let mut out = [0u8; 8];
    assert_eq!(module.drain_rx(&mut out), 5);
    assert_eq!(&out[..5], b"hello");

    // module produces output, host drains it
    assert_eq!(module.produce_tx(b"ok"), 2);
    assert_eq!(set.tx().try_pop(&mut out), 2);
    assert_eq!(&out[..2], b"ok");

    // keystrokes flow host -> module
    let stdin = set.stdin().expect("stdin ring");
    assert!(stdin.push_one(b'x'));
    assert_eq!(module.drain_stdin(&mut out), 1);
    assert_eq!(out[0], b'x');
}

#[test]
fn channels_are_independent_streams() {
    let module = MockModule::new(64);
    let set = ChannelSet::bind(&module).expect("bind");

    set.rx().try_push(b"rx");
    module.produce_tx(b"tx");
    set.stdin().unwrap().try_push(b"in");

    let mut out = [0u8; 8];
    assert_eq!(module.drain_rx(&mut out), 2);
    assert_eq!(&out[..2], b"rx");
    assert_eq!(set.tx().try_pop(&mut out), 2);
    assert_eq!(&out[..2], b"tx");
    assert_eq!(module.drain_stdin(&mut out), 2);
    assert_eq!(&out[..2], b"in");
}

#[test]
fn missing_stdin_triple_disables_forwarding_only() {
    let module = MockModule::without_stdin(64);
    let set = ChannelSet::bind(&module).expect("bind");
    assert!(set.stdin().is_none());
    assert_eq!(set.rx().capacity(), 64);
}

#[test]
fn missing_capacity_fails() {
    let module = MockModule::new(64);
    let err = ChannelSet::bind(&Masked {
        inner: &module,
        hide: "capacity",
    })
    .unwrap_err();
    assert_eq!(err, BindError::MissingExport { name: "capacity" });
}

#[test]
fn missing_required_accessor_fails_binding_as_a_whole() {
    let module = MockModule::new(64);
    for hide in ["rx_head_ptr", "rx_tail_ptr", "rx_buf_ptr", "tx_head_ptr"] {
        let err = ChannelSet::bind(&Masked {
            inner: &module,
            hide,
        })
        .unwrap_err();
        assert_eq!(err, BindError::MissingExport { name: hide });
    }
}

#[test]
fn partial_stdin_triple_is_reported() {
    let module = MockModule::new(64);
    let err = ChannelSet::bind(&Masked {
        inner: &module,
        hide: "stdin_buf_ptr",
    })
    .unwrap_err();
    assert_eq!(
        err,
        BindError::MissingExport {
            name: "stdin_buf_ptr"
        }
    );
}

#[test]
fn descriptors_are_validated_against_heap_length() {
    let heap = ModuleHeap::new(SharedRegion::zeroed(128, 64).expect("region"));

    // data span runs past the end of the heap
    let err = ByteRing::bind(
        heap.clone(),
        RingLayout {
            head: 0,
            tail: 4,
            data: Span::new(96, 64),
        },
    )
    .unwrap_err();
    assert!(matches!(err, BindError::OutOfBounds { .. }));

    // misaligned counter cell
    let err = ByteRing::bind(
        heap,
        RingLayout {
            head: 2,
            tail: 4,
            data: Span::new(64, 64),
        },
    )
    .unwrap_err();
    assert_eq!(err, BindError::MisalignedCounter { offset: 2 });
}
