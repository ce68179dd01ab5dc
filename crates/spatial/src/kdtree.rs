use kiddo::float::distance::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use multiway_core::PointCloud;
use std::num::NonZero;

/// Static kd-tree over the positions of one cloud.
///
/// Backed by kiddo's `ImmutableKdTree`; items are `u32` indices into the
/// source cloud. All distances returned are Euclidean, not squared.
#[derive(Debug, Clone)]
pub struct KdTree {
    tree: ImmutableKdTree<f32, u32, 3, 32>,
    num_points: usize,
}

fn is_finite_query(query: &[f32; 3]) -> bool {
    query.iter().all(|v| v.is_finite())
}

impl KdTree {
    pub fn build(cloud: &PointCloud) -> Self {
        let points: Vec<[f32; 3]> = cloud.iter_positions().collect();
        Self::from_positions(&points)
    }

    pub fn from_positions(points: &[[f32; 3]]) -> Self {
        Self {
            tree: ImmutableKdTree::new_from_slice(points),
            num_points: points.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    /// Closest point to `query` as `(index, distance)`.
    ///
    /// `None` for an empty tree or a non-finite query.
    pub fn nearest(&self, query: &[f32; 3]) -> Option<(usize, f32)> {
        if self.is_empty() || !is_finite_query(query) {
            return None;
        }
        let nn = self.tree.nearest_one::<SquaredEuclidean>(query);
        Some((nn.item as usize, nn.distance.sqrt()))
    }

    /// The `k` nearest neighbours, sorted by ascending distance.
    ///
    /// Empty when `k == 0`, the tree is empty, or the query is not finite.
    /// If `k > len()`, every point is returned.
    pub fn knn(&self, query: &[f32; 3], k: usize) -> (Vec<usize>, Vec<f32>) {
        let Some(nz_k) = NonZero::new(k) else {
            return (Vec::new(), Vec::new());
        };
        if self.is_empty() || !is_finite_query(query) {
            return (Vec::new(), Vec::new());
        }

        self.tree
            .nearest_n::<SquaredEuclidean>(query, nz_k)
            .into_iter()
            .map(|nn| (nn.item as usize, nn.distance.sqrt()))
            .unzip()
    }

    pub fn knn_indices(&self, query: &[f32; 3], k: usize) -> Vec<usize> {
        let Some(nz_k) = NonZero::new(k) else {
            return Vec::new();
        };
        if self.is_empty() || !is_finite_query(query) {
            return Vec::new();
        }

        self.tree
            .nearest_n::<SquaredEuclidean>(query, nz_k)
            .iter()
            .map(|nn| nn.item as usize)
            .collect()
    }

    /// Indices of all points with `distance <= radius`, sorted by index.
    pub fn radius_search(&self, query: &[f32; 3], radius: f32) -> Vec<usize> {
        let mut hits = self.within(query, radius);
        hits.sort_unstable_by_key(|&(idx, _)| idx);
        hits.into_iter().map(|(idx, _)| idx).collect()
    }

    /// At most `max_nn` nearest points that also lie within `radius`, sorted
    /// by ascending distance (ties broken by index).
    pub fn hybrid_search(&self, query: &[f32; 3], radius: f32, max_nn: usize) -> Vec<usize> {
        if max_nn == 0 {
            return Vec::new();
        }
        let mut hits = self.within(query, radius);
        hits.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(max_nn);
        hits.into_iter().map(|(idx, _)| idx).collect()
    }

    /// `(index, squared distance)` pairs inside the closed ball.
    fn within(&self, query: &[f32; 3], radius: f32) -> Vec<(usize, f32)> {
        if self.is_empty() || radius <= 0.0 || !radius.is_finite() || !is_finite_query(query) {
            return Vec::new();
        }

        let radius_sq = radius * radius;
        // kiddo compares with strict `<`; widen slightly and post-filter so the
        // boundary is inclusive.
        let query_radius_sq = radius_sq + f32::EPSILON * radius_sq.max(1.0);

        self.tree
            .within_unsorted::<SquaredEuclidean>(query, query_radius_sq)
            .into_iter()
            .filter(|nn| nn.distance <= radius_sq)
            .map(|nn| (nn.item as usize, nn.distance))
            .collect()
    }
}
