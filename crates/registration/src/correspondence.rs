use multiway_core::{PointCloud, RigidTransform};
use multiway_spatial::KdTree;
use nalgebra::Vector3;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub source_index: usize,
    pub target_index: usize,
    /// Source point after applying the current transform.
    pub source_point: [f64; 3],
    pub distance: f32,
}

impl Correspondence {
    pub fn source_vector(&self) -> Vector3<f64> {
        Vector3::from(self.source_point)
    }
}

/// Nearest target point for every source point mapped through `transform`,
/// keeping pairs with `distance <= max_distance`.
///
/// Output is in source order. Non-finite source points never match.
pub fn find_correspondences(
    source: &PointCloud,
    transform: &RigidTransform,
    target_tree: &KdTree,
    max_distance: f32,
) -> Vec<Correspondence> {
    if target_tree.is_empty() {
        return Vec::new();
    }
    (0..source.len())
        .into_par_iter()
        .filter_map(|i| {
            let p = source.position(i);
            let moved = transform.apply_point(&Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64));
            let query = [moved.x as f32, moved.y as f32, moved.z as f32];
            let (target_index, distance) = target_tree.nearest(&query)?;
            (distance <= max_distance).then_some(Correspondence {
                source_index: i,
                target_index,
                source_point: [moved.x, moved.y, moved.z],
                distance,
            })
        })
        .collect()
}
