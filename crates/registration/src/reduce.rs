use rayon::join;
use std::ops::Add;

/// Items per leaf; leaves are summed sequentially left to right.
const LEAF_SIZE: usize = 512;

/// Sums `leaf(item)` over `items` with a fixed-shape binary tree.
///
/// The split points depend only on `items.len()`, so the floating-point
/// result is bit-identical for any thread count or scheduling order. The two
/// halves of each split run through `rayon::join`.
pub fn tree_sum<I, T, F>(items: &[I], leaf: &F) -> T
where
    I: Sync,
    T: Add<Output = T> + Default + Send,
    F: Fn(&I) -> T + Sync,
{
    if items.len() <= LEAF_SIZE {
        return items.iter().fold(T::default(), |acc, item| acc + leaf(item));
    }
    let (left, right) = items.split_at(items.len() / 2);
    let (a, b) = join(|| tree_sum(left, leaf), || tree_sum(right, leaf));
    a + b
}
