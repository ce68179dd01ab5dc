use multiway_core::PointCloud;
use multiway_spatial::KdTree;

/// Mean distance from each finite point of `source` to its nearest
/// neighbour in `target`.
///
/// One-directional: the result generally differs with the roles swapped.
/// `f64::INFINITY` when either side has no usable points.
pub fn mean_nearest_distance(source: &PointCloud, target: &KdTree) -> f64 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for p in source.iter_positions() {
        if let Some((_, d)) = target.nearest(&p) {
            sum += d as f64;
            count += 1;
        }
    }
    if count == 0 {
        f64::INFINITY
    } else {
        sum / count as f64
    }
}
