use crate::distance::mean_nearest_distance;
use crate::union_find::UnionFind;
use log::{debug, info};
use multiway_core::PointCloud;
use multiway_spatial::KdTree;
use rayon::prelude::*;

/// Mean nearest-neighbour distance from cloud `i` to cloud `j`, `i < j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairDistance {
    pub i: usize,
    pub j: usize,
    pub distance: f64,
}

/// Undirected "close enough to merge" graph over a set of clouds.
///
/// Each unordered pair is evaluated exactly once, as the distance from the
/// lower index to the higher one, so the edge set never depends on
/// iteration order.
#[derive(Debug, Clone)]
pub struct CombinabilityGraph {
    num_clouds: usize,
    threshold: f64,
    pairs: Vec<PairDistance>,
}

impl CombinabilityGraph {
    pub fn build(clouds: &[PointCloud], threshold: f64) -> Self {
        let trees: Vec<KdTree> = clouds.par_iter().map(KdTree::build).collect();
        let index_pairs: Vec<(usize, usize)> = (0..clouds.len())
            .flat_map(|i| (i + 1..clouds.len()).map(move |j| (i, j)))
            .collect();

        let pairs: Vec<PairDistance> = index_pairs
            .par_iter()
            .map(|&(i, j)| PairDistance {
                i,
                j,
                distance: mean_nearest_distance(&clouds[i], &trees[j]),
            })
            .collect();

        for p in &pairs {
            debug!("combinability ({}, {}): mean distance {:.4}", p.i, p.j, p.distance);
        }
        Self {
            num_clouds: clouds.len(),
            threshold,
            pairs,
        }
    }

    pub fn num_clouds(&self) -> usize {
        self.num_clouds
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Every evaluated pair, in `(i, j)` enumeration order.
    pub fn pairs(&self) -> &[PairDistance] {
        &self.pairs
    }

    pub fn is_combinable(&self, p: &PairDistance) -> bool {
        p.distance < self.threshold
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs
            .iter()
            .filter(|p| self.is_combinable(p))
            .map(|p| (p.i, p.j))
    }

    /// Connected components, each ascending, ordered by smallest member.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut uf = UnionFind::new(self.num_clouds);
        for (i, j) in self.edges() {
            uf.union(i, j);
        }
        uf.components()
    }

    /// The largest component in input order. Ties go to the component that
    /// contains the lowest index. Empty only when there are no clouds.
    pub fn largest_component(&self) -> Vec<usize> {
        let mut best: Vec<usize> = Vec::new();
        for comp in self.components() {
            // Components arrive ordered by smallest member, so a strict `>`
            // keeps the earliest one on ties.
            if comp.len() > best.len() {
                best = comp;
            }
        }
        best
    }
}

/// Indices of the largest mutually-combinable subset of `clouds`.
pub fn select(clouds: &[PointCloud], threshold: f64) -> Vec<usize> {
    let graph = CombinabilityGraph::build(clouds, threshold);
    let selected = graph.largest_component();
    info!(
        "combinability: {} of {} clouds selected (threshold {})",
        selected.len(),
        clouds.len(),
        threshold
    );
    selected
}
