//! Shared data structures and algorithms.
//!
//! - [`BitSet`] - compact per-block sets for dominance analysis
//! - [`graph`] - graph traits, traversals, dominators, and SCCs

mod bitset;
pub mod graph;

pub use bitset::{BitSet, BitSetIter};
