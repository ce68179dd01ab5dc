use crate::graph::{PoseGraph, PoseGraphEdge};
use crate::odometry::chain_odometry;
use log::{debug, info, warn};
use multiway_core::{InformationMatrix, PointCloud, RigidTransform};
use multiway_registration::{
    register_pair, PairwiseParams, PairwiseRegistration, PreparedTarget, RegistrationError,
};
use rayon::prelude::*;

/// Aligns cloud `source` onto cloud `target`, both given by position in the
/// working subset.
pub trait PairRegistrar: Sync {
    fn register(
        &self,
        source: usize,
        target: usize,
    ) -> Result<PairwiseRegistration, RegistrationError>;
}

/// Two-stage ICP over a fixed set of clouds. Every cloud is prepared as a
/// target (normals and kd-tree) once, up front.
pub struct IcpRegistrar<'a> {
    clouds: &'a [PointCloud],
    targets: Vec<PreparedTarget>,
    params: PairwiseParams,
}

impl<'a> IcpRegistrar<'a> {
    pub fn new(clouds: &'a [PointCloud], params: PairwiseParams) -> Self {
        let targets = clouds
            .par_iter()
            .map(|c| PreparedTarget::new(c, params.normal_radius, params.normal_max_nn))
            .collect();
        Self {
            clouds,
            targets,
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.clouds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clouds.is_empty()
    }
}

impl PairRegistrar for IcpRegistrar<'_> {
    fn register(
        &self,
        source: usize,
        target: usize,
    ) -> Result<PairwiseRegistration, RegistrationError> {
        register_pair(
            &self.clouds[source],
            &self.targets[target],
            &self.params,
            &RigidTransform::identity(),
        )
    }
}

/// A pair whose registration failed and was replaced by a zero-weight edge.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedPair {
    pub source: usize,
    pub target: usize,
    pub error: RegistrationError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub graph: PoseGraph,
    pub failed_pairs: Vec<FailedPair>,
}

fn registration_or_identity(
    registrar: &dyn PairRegistrar,
    source: usize,
    target: usize,
) -> (PairwiseRegistration, Option<FailedPair>) {
    match registrar.register(source, target) {
        Ok(reg) => {
            debug!(
                "pair ({source}, {target}): fitness {:.3}, rmse {:.4e}",
                reg.fitness, reg.inlier_rmse
            );
            (reg, None)
        }
        Err(error) => {
            warn!("pair ({source}, {target}) failed to register: {error}; using a zero-weight edge");
            let fallback = PairwiseRegistration {
                transform: RigidTransform::identity(),
                information: InformationMatrix::zeros(),
                fitness: 0.0,
                inlier_rmse: 0.0,
            };
            (
                fallback,
                Some(FailedPair {
                    source,
                    target,
                    error,
                }),
            )
        }
    }
}

/// Registers every pair `i < j` of `n` clouds and assembles the pose graph.
///
/// Sequential pairs `(i, i + 1)` become odometry edges and are registered
/// first, in order; their chained product seeds the node poses. All other
/// pairs become loop closures and are registered in parallel. Edges are
/// stored in `(i, j)` order either way.
pub fn build_pose_graph(n: usize, registrar: &dyn PairRegistrar) -> BuildReport {
    let odometry: Vec<_> = (0..n.saturating_sub(1))
        .map(|i| registration_or_identity(registrar, i, i + 1))
        .collect();

    let loop_pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (i + 2..n).map(move |j| (i, j)))
        .collect();
    let loops: Vec<_> = loop_pairs
        .par_iter()
        .map(|&(i, j)| registration_or_identity(registrar, i, j))
        .collect();

    let sequential: Vec<RigidTransform> = odometry.iter().map(|(r, _)| r.transform).collect();
    let mut graph = if n == 0 {
        PoseGraph::new()
    } else {
        PoseGraph::from_poses(chain_odometry(&sequential))
    };

    let mut failed_pairs = Vec::new();
    let mut loops = loop_pairs.iter().zip(loops).peekable();
    for (i, (reg, failure)) in odometry.into_iter().enumerate() {
        // Loop closures out of node i come after its odometry edge.
        graph.add_edge(PoseGraphEdge::odometry(i, i + 1, reg.transform, reg.information));
        failed_pairs.extend(failure);
        while let Some((&(s, t), (reg, failure))) = loops.next_if(|((s, _), _)| *s == i) {
            graph.add_edge(PoseGraphEdge::loop_closure(s, t, reg.transform, reg.information));
            failed_pairs.extend(failure);
        }
    }

    info!(
        "pose graph: {} nodes, {} edges, {} failed pairs",
        graph.num_nodes(),
        graph.num_edges(),
        failed_pairs.len()
    );
    BuildReport {
        graph,
        failed_pairs,
    }
}

/// [`build_pose_graph`] with [`IcpRegistrar`] over `clouds`.
pub fn build_from_clouds(clouds: &[PointCloud], params: PairwiseParams) -> BuildReport {
    let registrar = IcpRegistrar::new(clouds, params);
    build_pose_graph(clouds.len(), &registrar)
}
