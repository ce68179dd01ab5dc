use crate::correspondence::{find_correspondences, Correspondence};
use crate::error::{RegistrationError, Result, Stage};
use crate::reduce::tree_sum;
use crate::target::PreparedTarget;
use log::debug;
use multiway_core::{PointCloud, RigidTransform, Twist};
use nalgebra::{Matrix6, Vector3, Vector6};
use std::ops::Add;

/// Stopping rule for one ICP stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpCriteria {
    pub max_iterations: usize,
    /// Stop once `|cost_prev - cost| / cost_prev` falls below this.
    pub relative_cost_tolerance: f64,
}

impl Default for IcpCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            relative_cost_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcpResult {
    /// Maps source coordinates into the target frame.
    pub transform: RigidTransform,
    /// Inlier count over source size at the final transform.
    pub fitness: f64,
    /// RMS point-to-point distance of the final inliers.
    pub inlier_rmse: f64,
    pub converged: bool,
    pub num_iterations: usize,
    pub num_correspondences: usize,
}

/// Gauss-Newton normal equations for the point-to-plane cost, plus the cost
/// itself. Summed with [`tree_sum`] so the totals do not depend on threading.
#[derive(Debug, Clone, Copy)]
struct NormalEquations {
    jtj: Matrix6<f64>,
    jtr: Vector6<f64>,
    cost: f64,
}

impl Default for NormalEquations {
    fn default() -> Self {
        Self {
            jtj: Matrix6::zeros(),
            jtr: Vector6::zeros(),
            cost: 0.0,
        }
    }
}

impl Add for NormalEquations {
    type Output = NormalEquations;

    fn add(self, rhs: NormalEquations) -> NormalEquations {
        NormalEquations {
            jtj: self.jtj + rhs.jtj,
            jtr: self.jtr + rhs.jtr,
            cost: self.cost + rhs.cost,
        }
    }
}

/// Point-to-plane ICP of `source` onto `target`, starting from `init`.
///
/// Each iteration linearises the residual `(T p - q) · n` around the current
/// transform with a left perturbation `T ← exp(ξ) T`, so the Jacobian row of a
/// correspondence is `[p' × n, n]` with `p' = T p`.
///
/// # Errors
///
/// [`RegistrationError::NoCorrespondences`] if any iteration finds no pair
/// within `max_distance`.
pub fn icp_point_to_plane(
    source: &PointCloud,
    target: &PreparedTarget,
    init: &RigidTransform,
    max_distance: f32,
    criteria: &IcpCriteria,
    stage: Stage,
) -> Result<IcpResult> {
    let no_match = RegistrationError::NoCorrespondences { stage, max_distance };
    let mut transform = *init;
    let mut prev_cost: Option<f64> = None;
    let mut converged = false;
    let mut num_iterations = 0;

    for iter in 0..criteria.max_iterations {
        let corrs = find_correspondences(source, &transform, target.tree(), max_distance);
        if corrs.is_empty() {
            return Err(no_match);
        }

        let eq = tree_sum(&corrs, &|c: &Correspondence| plane_row(target, c));
        debug!(
            "{stage} icp iter {iter}: {} correspondences, cost {:.6e}",
            corrs.len(),
            eq.cost
        );

        if let Some(prev) = prev_cost {
            let change = (prev - eq.cost).abs() / prev.max(f64::MIN_POSITIVE);
            if change < criteria.relative_cost_tolerance {
                converged = true;
                break;
            }
        }
        prev_cost = Some(eq.cost);

        let xi = solve_regularized(eq.jtj, &eq.jtr);
        transform = RigidTransform::exp(&xi).compose(&transform);
        num_iterations = iter + 1;
    }

    let corrs = find_correspondences(source, &transform, target.tree(), max_distance);
    if corrs.is_empty() {
        return Err(no_match);
    }
    let sq_dist: f64 = tree_sum(&corrs, &|c: &Correspondence| (c.distance as f64).powi(2));

    Ok(IcpResult {
        transform,
        fitness: corrs.len() as f64 / source.len() as f64,
        inlier_rmse: (sq_dist / corrs.len() as f64).sqrt(),
        converged,
        num_iterations,
        num_correspondences: corrs.len(),
    })
}

fn plane_row(target: &PreparedTarget, c: &Correspondence) -> NormalEquations {
    let p = c.source_vector();
    let q = Vector3::from(target.point(c.target_index));
    let n = Vector3::from(target.normal(c.target_index));
    let r = (p - q).dot(&n);
    let pxn = p.cross(&n);
    let j = Vector6::new(pxn.x, pxn.y, pxn.z, n.x, n.y, n.z);
    NormalEquations {
        jtj: j * j.transpose(),
        jtr: j * -r,
        cost: r * r,
    }
}

/// Solves `(JᵀJ + λI) ξ = -Jᵀr` with a small Tikhonov term so directions the
/// correspondences do not constrain (e.g. sliding along a plane) stay put.
/// Falls back to LU, then to a zero step.
fn solve_regularized(mut jtj: Matrix6<f64>, rhs: &Vector6<f64>) -> Twist {
    let diag_max = (0..6).map(|i| jtj[(i, i)].abs()).fold(0.0_f64, f64::max);
    let lambda = 1e-6 * diag_max.max(1e-12);
    for i in 0..6 {
        jtj[(i, i)] += lambda;
    }
    match jtj.cholesky() {
        Some(chol) => chol.solve(rhs),
        None => jtj.lu().solve(rhs).unwrap_or_else(Twist::zeros),
    }
}
