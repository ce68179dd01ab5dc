use crate::error::{Result, Stage};
use crate::icp::{icp_point_to_plane, IcpCriteria};
use crate::information::information_matrix;
use crate::target::PreparedTarget;
use log::debug;
use multiway_core::{InformationMatrix, PointCloud, RigidTransform};
use multiway_normals::{DEFAULT_MAX_NN, DEFAULT_RADIUS};

/// Coarse distance as a multiple of the voxel size.
pub const COARSE_VOXEL_FACTOR: f64 = 15.0;
/// Fine distance as a multiple of the voxel size.
pub const FINE_VOXEL_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseParams {
    pub coarse_distance: f32,
    pub fine_distance: f32,
    pub criteria: IcpCriteria,
    pub normal_radius: f32,
    pub normal_max_nn: usize,
}

impl PairwiseParams {
    pub fn new(coarse_distance: f32, fine_distance: f32) -> Self {
        Self {
            coarse_distance,
            fine_distance,
            criteria: IcpCriteria::default(),
            normal_radius: DEFAULT_RADIUS,
            normal_max_nn: DEFAULT_MAX_NN,
        }
    }

    /// Distances derived from the downsampling voxel: 15x for the coarse
    /// stage, 1.5x for the fine stage.
    pub fn from_voxel_size(voxel_size: f64) -> Self {
        Self::new(
            (voxel_size * COARSE_VOXEL_FACTOR) as f32,
            (voxel_size * FINE_VOXEL_FACTOR) as f32,
        )
    }

    pub fn with_normal_search(mut self, radius: f32, max_nn: usize) -> Self {
        self.normal_radius = radius;
        self.normal_max_nn = max_nn;
        self
    }

    pub fn with_criteria(mut self, criteria: IcpCriteria) -> Self {
        self.criteria = criteria;
        self
    }
}

/// Outcome of aligning one ordered pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseRegistration {
    /// Maps source coordinates into the target frame.
    pub transform: RigidTransform,
    pub information: InformationMatrix,
    pub fitness: f64,
    pub inlier_rmse: f64,
}

/// Coarse-to-fine point-to-plane alignment of `source` onto a prepared
/// target, followed by the fine-stage information matrix.
pub fn register_pair(
    source: &PointCloud,
    target: &PreparedTarget,
    params: &PairwiseParams,
    init: &RigidTransform,
) -> Result<PairwiseRegistration> {
    let coarse = icp_point_to_plane(
        source,
        target,
        init,
        params.coarse_distance,
        &params.criteria,
        Stage::Coarse,
    )?;
    let fine = icp_point_to_plane(
        source,
        target,
        &coarse.transform,
        params.fine_distance,
        &params.criteria,
        Stage::Fine,
    )?;
    debug!(
        "pairwise: coarse {} iters (fitness {:.3}), fine {} iters (fitness {:.3}, rmse {:.4e})",
        coarse.num_iterations, coarse.fitness, fine.num_iterations, fine.fitness, fine.inlier_rmse
    );

    let information = information_matrix(source, target, params.fine_distance, &fine.transform);
    Ok(PairwiseRegistration {
        transform: fine.transform,
        information,
        fitness: fine.fitness,
        inlier_rmse: fine.inlier_rmse,
    })
}

/// [`register_pair`] for a raw target cloud; normals are estimated if absent.
pub fn register_clouds(
    source: &PointCloud,
    target: &PointCloud,
    params: &PairwiseParams,
    init: &RigidTransform,
) -> Result<PairwiseRegistration> {
    let prepared = PreparedTarget::new(target, params.normal_radius, params.normal_max_nn);
    register_pair(source, &prepared, params, init)
}
