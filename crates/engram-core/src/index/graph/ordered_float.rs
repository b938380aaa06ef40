//! Ordered f32 wrapper for use in `BinaryHeap` during graph search.
//!
//! Uses `f32::total_cmp` (IEEE 754 total ordering) so Ord/Eq stay consistent
//! even if a NaN distance slips in, which would otherwise corrupt the heap.

use std::cmp::Ordering;

/// f32 wrapper implementing `Ord` via total ordering.
#[derive(Debug, Clone, Copy)]
pub(super) struct OrderedFloat(pub f32);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
