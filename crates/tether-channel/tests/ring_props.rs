//! Property coverage for the byte ring's ordering and overflow contract.

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::VecDeque;
use tether_channel::{ByteRing, ModuleHeap, RingLayout, SharedRegion, Span};

const CAPACITY: u32 = 64;

fn ring() -> ByteRing {
    let region = SharedRegion::zeroed(64 + CAPACITY as usize, 64).expect("region");
    ByteRing::bind(
        ModuleHeap::new(region),
        RingLayout {
            head: 0,
            tail: 4,
            data: Span::new(64, CAPACITY),
        },
    )
    .expect("bind ring")
}

#[derive(Clone, Debug)]
enum Op {
    Push(Vec<u8>),
    Pop(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        vec(any::<u8>(), 1..=96).prop_map(Op::Push),
        (1usize..=96).prop_map(Op::Pop),
    ]
}

proptest! {
    /// Pushes whose running total stays within capacity are accepted whole,
    /// and one pop returns their concatenation in order.
    #[test]
    fn within_capacity_round_trips(chunks in vec(vec(any::<u8>(), 0..=16), 0..=4)) {
        let total: usize = chunks.iter().map(Vec::len).sum();
        prop_assume!(total <= CAPACITY as usize);

        let ring = ring();
        for chunk in &chunks {
            prop_assert_eq!(ring.try_push(chunk), chunk.len());
        }

        let mut out = vec![0u8; CAPACITY as usize];
        let read = ring.try_pop(&mut out);
        let expected: Vec<u8> = chunks.concat();
        prop_assert_eq!(&out[..read], expected.as_slice());
        prop_assert_eq!(ring.try_pop(&mut out), 0);
    }

    /// A push that does not fit writes an in-order prefix of its input and
    /// reports the dropped remainder.
    #[test]
    fn overflow_keeps_an_ordered_prefix(prefill in 0u32..=CAPACITY, input in vec(any::<u8>(), 0..=128)) {
        let ring = ring();
        let filler = vec![0xEE; prefill as usize];
        prop_assert_eq!(ring.try_push(&filler), filler.len());

        let free = (CAPACITY - prefill) as usize;
        let written = ring.try_push(&input);
        prop_assert_eq!(written, free.min(input.len()));
        prop_assert_eq!(ring.dropped_bytes(), (input.len() - written) as u64);

        let mut out = vec![0u8; CAPACITY as usize];
        let mut drained = Vec::new();
        loop {
            let read = ring.try_pop(&mut out);
            if read == 0 {
                break;
            }
            drained.extend_from_slice(&out[..read]);
        }
        prop_assert_eq!(&drained[..filler.len()], filler.as_slice());
        prop_assert_eq!(&drained[filler.len()..], &input[..written]);
    }

    /// Arbitrary interleavings of pushes and pops, crossing the wrap boundary
    /// repeatedly, behave exactly like a bounded FIFO queue that drops on
    /// overflow.
    #[test]
    fn behaves_like_a_lossy_bounded_queue(ops in vec(op(), 0..=64)) {
        let ring = ring();
        let mut model = VecDeque::<u8>::new();
        let mut out = vec![0u8; 128];

        for op in ops {
            match op {
                Op::Push(bytes) => {
                    let free = CAPACITY as usize - model.len();
                    let written = ring.try_push(&bytes);
                    prop_assert_eq!(written, free.min(bytes.len()));
                    model.extend(&bytes[..written]);
                }
                Op::Pop(max) => {
                    let read = ring.try_pop(&mut out[..max]);
                    prop_assert_eq!(read, max.min(model.len()));
                    for &b in &out[..read] {
                        prop_assert_eq!(Some(b), model.pop_front());
                    }
                }
            }
        }

        prop_assert_eq!(ring.len() as usize, model.len());
    }
}
