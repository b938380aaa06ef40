//! Tests for `sketch` module

use super::sketch::FrequencySketch;
use proptest::prelude::*;
use rustc_hash::FxHashMap;

#[test]
fn test_sketch_dimensions_from_error_params() {
    let sketch = FrequencySketch::new(0.001, 0.01);
    let (width, depth) = sketch.dimensions();
    assert!(width >= 2718, "width {width} too small for epsilon 0.001");
    assert!(depth >= 5, "depth {depth} too small for delta 0.01");
}

#[test]
fn test_sketch_increment_and_estimate() {
    let sketch = FrequencySketch::new(0.01, 0.01);

    for _ in 0..5 {
        sketch.increment(42);
    }

    assert!(sketch.estimate(42) >= 5);
    assert_eq!(sketch.estimate(9999), 0);
}

#[test]
fn test_sketch_never_undercounts() {
    let sketch = FrequencySketch::new(0.01, 0.01);
    let mut truth: FxHashMap<u64, u32> = FxHashMap::default();

    // Deterministic pseudo-random increment sequence
    let mut state = 0x1234_5678_9ABC_DEF0u64;
    for _ in 0..10_000 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let key = state % 100;
        sketch.increment(key);
        *truth.entry(key).or_default() += 1;
    }

    for (&key, &count) in &truth {
        assert!(
            sketch.estimate(key) >= count,
            "estimate {} < true count {} for key {}",
            sketch.estimate(key),
            count,
            key
        );
    }
}

#[test]
fn test_sketch_aging_halves_counts() {
    let sketch = FrequencySketch::new(0.01, 0.01);

    for _ in 0..8 {
        sketch.increment(1);
    }
    let before = sketch.estimate(1);
    assert!(before >= 8);

    sketch.age();
    let after = sketch.estimate(1);
    assert_eq!(after, before / 2);

    sketch.age();
    assert_eq!(sketch.estimate(1), before / 4);
}

#[test]
fn test_sketch_aging_drains_to_zero() {
    let sketch = FrequencySketch::new(0.01, 0.01);
    sketch.increment(7);

    for _ in 0..8 {
        sketch.age();
    }
    assert_eq!(sketch.estimate(7), 0);
}

proptest! {
    /// One-sided error property over randomized increment sequences.
    #[test]
    fn prop_estimate_is_upper_bound(keys in proptest::collection::vec(0u64..50, 1..500)) {
        let sketch = FrequencySketch::new(0.01, 0.01);
        let mut truth: FxHashMap<u64, u32> = FxHashMap::default();

        for &key in &keys {
            sketch.increment(key);
            *truth.entry(key).or_default() += 1;
        }

        for (&key, &count) in &truth {
            prop_assert!(sketch.estimate(key) >= count);
        }
    }
}
