#![no_main]
use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use mirror_ring::{MirroredRing, StandardRing};
use std::collections::VecDeque;

#[derive(Debug, Arbitrary)]
enum Op {
    Write(Vec<u8>),
    Read(u16),
    Consume(u16),
    Peek,
    Reset,
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let ops: Vec<Op> = match Vec::<Op>::arbitrary(&mut unstructured) {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let mut ring = MirroredRing::new(1).unwrap();
    let cap = ring.capacity().unwrap();
    let mut standard = StandardRing::new(cap).unwrap();
    let mut model = VecDeque::<u8>::with_capacity(cap);

    for op in ops {
        match op {
            Op::Write(bytes) => {
                let n = ring.write(&bytes).unwrap();
                assert_eq!(n, bytes.len().min(cap - model.len()));
                assert_eq!(standard.write(&bytes), n);
                model.extend(&bytes[..n]);
            }
            Op::Read(len) => {
                let mut out = vec![0; len as usize];
                let n = ring.read(&mut out).unwrap();
                let mut expected = vec![0; len as usize];
                assert_eq!(standard.read(&mut expected), n);
                assert_eq!(out[..n], expected[..n]);
                assert!(model.drain(..n).eq(out[..n].iter().copied()));
            }
            Op::Consume(len) => {
                let n = (len as usize).min(model.len());
                ring.consume(n).unwrap();
                standard.read(&mut vec![0; n]);
                model.drain(..n);
            }
            Op::Peek => {
                assert_eq!(ring.peek().unwrap(), model.make_contiguous());
            }
            Op::Reset => {
                ring.reset().unwrap();
                standard.reset();
                model.clear();
            }
        }

        assert_eq!(ring.len().unwrap(), model.len());
        assert_eq!(standard.len(), model.len());
        assert!(ring.head().unwrap() < cap && ring.tail().unwrap() < cap);
        assert_eq!(ring.tail().unwrap(), standard.tail());
    }
});
