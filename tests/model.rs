#![cfg(any(unix, windows))]

use mirror_ring::{ByteRing, CapacityPolicy, MirroredRing, RingConfig, StandardRing};
use std::collections::VecDeque;

fn init() { let _ = env_logger::builder().is_test(true).try_init(); }

/// Drives both designs and a `VecDeque` with the same random operations and checks they agree after each one.
fn check_against_model(mut ring: MirroredRing, seed: u64, rounds: usize) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let cap = ring.capacity().unwrap();
    let mut standard = StandardRing::new(cap).unwrap();
    let mut model = VecDeque::with_capacity(cap);
    let mut next = 0u8;

    for round in 0..rounds {
        match rng.u8(..10) {
            0..=4 => {
                let len = rng.usize(..=cap + cap / 4);
                let data: Vec<u8> = (0..len).map(|_| next.wrapping_add(rng.u8(..))).collect();
                next = next.wrapping_add(1);
                let n = ring.write(&data).unwrap();
                assert_eq!(n, len.min(cap - model.len()), "round {round}: write count");
                assert_eq!(standard.write(&data), n, "round {round}: standard write count");
                model.extend(&data[..n]);
            }
            5..=8 => {
                let mut out = vec![0; rng.usize(..=cap)];
                let mut expected = out.clone();
                let n = ring.read(&mut out).unwrap();
                assert_eq!(standard.read(&mut expected), n, "round {round}: standard read count");
                assert_eq!(out[..n], expected[..n], "round {round}: designs disagree");
                let from_model: Vec<u8> = model.drain(..n).collect();
                assert_eq!(out[..n], from_model[..], "round {round}: read data");
            }
            _ => {
                assert_eq!(ring.peek().unwrap(), model.make_contiguous(), "round {round}: peek");
            }
        }

        assert_eq!(ring.len().unwrap(), model.len());
        assert_eq!(ByteRing::len(&standard).unwrap(), model.len());
        assert_eq!(ring.tail().unwrap(), standard.tail());
        assert_eq!(ring.head().unwrap(), standard.head());
    }
}

#[test]
fn one_page_ring_matches_the_model() {
    init();
    for seed in 0..8 {
        check_against_model(MirroredRing::new(1).unwrap(), seed, 2_000);
    }
}

#[test]
fn multi_page_ring_matches_the_model() {
    init();
    let ag = RingConfig::new(1).resolve().unwrap();
    let ring = MirroredRing::with_config(RingConfig::new(ag * 4).policy(CapacityPolicy::Strict)).unwrap();
    check_against_model(ring, 0x5eed, 2_000);
}

#[test]
fn many_rings_can_live_at_once() {
    init();
    let mut rings: Vec<MirroredRing> = (1..=16).map(|pages| MirroredRing::new(pages * 4096).unwrap()).collect();
    for (i, ring) in rings.iter_mut().enumerate() {
        let cap = ring.capacity().unwrap();
        ring.write(&vec![i as u8; cap]).unwrap();
        assert!(ring.is_full().unwrap());
    }
    for (i, ring) in rings.iter_mut().enumerate() {
        assert!(ring.peek().unwrap().iter().all(|&b| b == i as u8));
        ring.close().unwrap();
    }
}
