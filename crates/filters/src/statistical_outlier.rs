use multiway_core::PointCloud;
use multiway_spatial::KdTree;
use rayon::prelude::*;

/// Removes points whose mean distance to their `k` nearest neighbours exceeds
/// `global mean + std_ratio * global std`.
///
/// Point order and normals of the survivors are preserved. `k == 0` and
/// clouds with fewer than two points are returned unchanged.
pub fn statistical_outlier_removal(cloud: &PointCloud, k: usize, std_ratio: f32) -> PointCloud {
    if k == 0 || cloud.len() < 2 {
        return cloud.clone();
    }

    let points: Vec<[f32; 3]> = cloud.iter_positions().collect();
    let tree = KdTree::from_positions(&points);

    // knn includes the query itself at distance 0; ask for one extra and skip it.
    let mean_dists: Vec<f64> = points
        .par_iter()
        .map(|q| {
            let (_, dists) = tree.knn(q, k + 1);
            let neighbours = dists.get(1..).unwrap_or(&[]);
            if neighbours.is_empty() {
                return f64::INFINITY;
            }
            neighbours.iter().map(|&d| d as f64).sum::<f64>() / neighbours.len() as f64
        })
        .collect();

    let finite: Vec<f64> = mean_dists.iter().copied().filter(|d| d.is_finite()).collect();
    if finite.is_empty() {
        return PointCloud::new();
    }

    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    let threshold = mean + std_ratio as f64 * variance.sqrt();

    let keep: Vec<usize> = (0..cloud.len())
        .filter(|&i| mean_dists[i] <= threshold)
        .collect();

    cloud.select(&keep)
}

#[cfg(test)]
mod tests {
    use super::statistical_outlier_removal;
    use multiway_core::{Normals, PointCloud};
    use proptest::prelude::*;

    fn cluster_with_outlier() -> PointCloud {
        PointCloud::from_xyz(
            vec![0.0, 0.1, -0.1, 0.05, -0.05, 100.0],
            vec![0.0, 0.1, -0.1, 0.05, -0.05, 100.0],
            vec![0.0, 0.1, -0.1, 0.05, -0.05, 100.0],
        )
    }

    #[test]
    fn removes_far_outlier() {
        let result = statistical_outlier_removal(&cluster_with_outlier(), 4, 1.0);
        assert_eq!(result.len(), 5);
        for p in result.iter_positions() {
            assert!(p.iter().all(|v| v.abs() <= 0.2), "unexpected point {p:?}");
        }
    }

    #[test]
    fn keeps_normals_of_survivors() {
        let cloud = cluster_with_outlier().with_normals(Normals::from_vectors(&[
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
        ]));
        let result = statistical_outlier_removal(&cloud, 4, 1.0);
        let normals = result.normals.as_ref().unwrap();
        assert_eq!(normals.len(), 5);
        assert_eq!(normals.get(1), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn regular_grid_survives() {
        let mut pts = Vec::new();
        for ix in 0..3 {
            for iy in 0..3 {
                for iz in 0..3 {
                    pts.push([ix as f32, iy as f32, iz as f32]);
                }
            }
        }
        let cloud = PointCloud::from_positions(&pts);
        assert_eq!(statistical_outlier_removal(&cloud, 5, 3.0).len(), cloud.len());
    }

    #[test]
    fn degenerate_inputs_pass_through() {
        assert!(statistical_outlier_removal(&PointCloud::new(), 5, 1.0).is_empty());
        let single = PointCloud::from_xyz(vec![1.0], vec![2.0], vec![3.0]);
        assert_eq!(statistical_outlier_removal(&single, 5, 1.0), single);
        let pair = PointCloud::from_xyz(vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]);
        assert_eq!(statistical_outlier_removal(&pair, 0, 1.0), pair);
    }

    proptest! {
        #[test]
        fn never_increases_count(
            pts in prop::collection::vec(
                (-100.0f32..100.0f32, -100.0f32..100.0f32, -100.0f32..100.0f32),
                0..200
            ),
            k in 1usize..10,
            std_ratio in 0.5f32..3.0f32,
        ) {
            let cloud = PointCloud::from_xyz(
                pts.iter().map(|p| p.0).collect(),
                pts.iter().map(|p| p.1).collect(),
                pts.iter().map(|p| p.2).collect(),
            );
            let result = statistical_outlier_removal(&cloud, k, std_ratio);
            prop_assert!(result.len() <= cloud.len());
        }
    }
}
