//! Membership filters for the memory core.
//!
//! Two probabilistic membership structures with complementary contracts:
//! - [`BloomFilter`]: append-only, no deletion, fast negative pre-check
//! - [`CuckooFilter`]: supports deletion, authoritative liveness check
//!
//! Both are keyed by the 64-bit content digest from
//! [`crate::record::content_key`].

mod bloom;
mod cuckoo;

pub use bloom::BloomFilter;
pub use cuckoo::CuckooFilter;
