#![forbid(unsafe_code)]

pub mod distance;
pub mod graph;
pub mod union_find;

pub use distance::mean_nearest_distance;
pub use graph::{select, CombinabilityGraph, PairDistance};
pub use union_find::UnionFind;
