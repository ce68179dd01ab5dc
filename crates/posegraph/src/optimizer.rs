use crate::graph::{GraphError, PoseGraph, PoseGraphEdge};
use crate::lie::{edge_residual, linearize_edge};
use log::{debug, info, warn};
use multiway_core::{RigidTransform, Twist};
use nalgebra::{DMatrix, DVector, Matrix6, Vector6};
use std::time::{Duration, Instant};

/// Stopping rules for the Levenberg-Marquardt loop and the prune loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergenceCriteria {
    pub max_iterations: usize,
    /// Rejected steps allowed within one iteration before giving up.
    pub max_damping_retries: usize,
    /// Stop when `|Δx| < min_relative_step · (|x| + min_relative_step)`.
    pub min_relative_step: f64,
    /// Stop when an accepted step lowers the cost by less than this fraction.
    pub min_relative_cost_decrease: f64,
    /// Stop when the largest gradient entry falls below this.
    pub min_gradient: f64,
    /// Stop when the cost itself falls below this.
    pub min_cost: f64,
    pub max_prune_rounds: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_damping_retries: 20,
            min_relative_step: 1e-6,
            min_relative_cost_decrease: 1e-6,
            min_gradient: 1e-6,
            min_cost: 1e-12,
            max_prune_rounds: 5,
        }
    }
}

/// What makes an uncertain edge prunable after the inner loop converges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PruneRule {
    /// Chi-square `rᵀ Ω r` above the threshold.
    #[default]
    ChiSquare,
    /// Robust confidence `μ / (μ + χ²)` below the threshold.
    LineProcess,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerOptions {
    pub max_correspondence_distance: f64,
    pub edge_prune_threshold: f64,
    pub prune_rule: PruneRule,
    /// Node whose pose is held fixed.
    pub reference_node: usize,
    /// Scales the robust kernel width on loop closures.
    pub preference_loop_closure: f64,
    /// Down-weight uncertain edges with a Geman-McClure kernel.
    pub robust_loop_closures: bool,
    /// `τ` in `λ₀ = τ · max diag(H)`.
    pub initial_damping: f64,
    /// Damping beyond this counts as numerical breakdown.
    pub max_damping: f64,
    pub criteria: ConvergenceCriteria,
    /// Wall-clock budget for the whole call, checked between iterations.
    pub time_budget: Option<Duration>,
}

impl OptimizerOptions {
    pub fn new(max_correspondence_distance: f64, edge_prune_threshold: f64, reference_node: usize) -> Self {
        Self {
            max_correspondence_distance,
            edge_prune_threshold,
            reference_node,
            ..Self::default()
        }
    }
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_correspondence_distance: 0.03,
            edge_prune_threshold: 0.25,
            prune_rule: PruneRule::default(),
            reference_node: 0,
            preference_loop_closure: 1.0,
            robust_loop_closures: true,
            initial_damping: 1e-5,
            max_damping: 1e32,
            criteria: ConvergenceCriteria::default(),
            time_budget: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerStatus {
    Converged,
    MaxIterations,
    /// Damping blew up while the cost kept rising; the best poses were kept.
    Diverged,
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    pub graph: PoseGraph,
    /// Indices into the input edge list, in removal order.
    pub pruned_edges: Vec<usize>,
    /// Inner solves performed (at least one).
    pub prune_rounds: usize,
    /// Status of the last inner solve.
    pub status: InnerStatus,
    /// True if any inner solve diverged.
    pub diverged: bool,
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Accepted steps summed over all inner solves.
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizeError {
    #[error(transparent)]
    InvalidGraph(#[from] GraphError),

    #[error("reference node {reference} is out of range for {nodes} nodes")]
    ReferenceOutOfRange { reference: usize, nodes: usize },
}

/// Nielsen's Levenberg-Marquardt damping schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damping {
    lambda: f64,
    nu: f64,
}

impl Damping {
    pub fn new(tau: f64, max_diagonal: f64) -> Self {
        Self {
            lambda: (tau * max_diagonal).max(f64::MIN_POSITIVE),
            nu: 2.0,
        }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Shrinks after a step with gain ratio `rho > 0`.
    pub fn accept(&mut self, rho: f64) {
        let f = 1.0 - (2.0 * rho - 1.0).powi(3);
        self.lambda *= f.max(1.0 / 3.0);
        self.nu = 2.0;
    }

    pub fn reject(&mut self) {
        self.lambda *= self.nu;
        self.nu *= 2.0;
    }

    pub fn is_broken(&self, max_damping: f64) -> bool {
        !self.lambda.is_finite() || self.lambda > max_damping
    }
}

/// Robust kernel `ρ(s) = μ s / (μ + s)` on loop-closure chi-squares.
#[derive(Debug, Clone, Copy)]
struct Kernel {
    mu: Option<f64>,
}

impl Kernel {
    fn cost(&self, chi2: f64, uncertain: bool) -> f64 {
        match self.mu {
            Some(mu) if uncertain => mu * chi2 / (mu + chi2),
            _ => chi2,
        }
    }

    /// `ρ'(s)`, the IRLS weight.
    fn weight(&self, chi2: f64, uncertain: bool) -> f64 {
        match self.mu {
            Some(mu) if uncertain => (mu / (mu + chi2)).powi(2),
            _ => 1.0,
        }
    }

    fn confidence(&self, chi2: f64) -> f64 {
        match self.mu {
            Some(mu) => mu / (mu + chi2),
            None => 1.0,
        }
    }
}

fn kernel_for(edges: &[PoseGraphEdge], options: &OptimizerOptions) -> Kernel {
    if !options.robust_loop_closures || edges.is_empty() {
        return Kernel { mu: None };
    }
    let mean_info = edges.iter().map(|e| e.information.get(5, 5)).sum::<f64>() / edges.len() as f64;
    let mu = options.preference_loop_closure * options.max_correspondence_distance.powi(2) * mean_info;
    Kernel {
        mu: (mu.is_finite() && mu > 0.0).then_some(mu),
    }
}

fn edge_chi2(poses: &[RigidTransform], e: &PoseGraphEdge) -> f64 {
    let r = edge_residual(&poses[e.source], &poses[e.target], &e.transform);
    e.information.chi_square(&r)
}

fn total_cost(poses: &[RigidTransform], edges: &[PoseGraphEdge], kernel: &Kernel) -> f64 {
    edges
        .iter()
        .map(|e| kernel.cost(edge_chi2(poses, e), e.uncertain))
        .sum()
}

/// Maps node indices to block offsets in the reduced system, skipping the
/// reference node.
fn block_index(num_nodes: usize, reference: usize) -> Vec<Option<usize>> {
    let mut next = 0;
    (0..num_nodes)
        .map(|i| {
            if i == reference {
                None
            } else {
                next += 1;
                Some(6 * (next - 1))
            }
        })
        .collect()
}

fn assemble(
    poses: &[RigidTransform],
    edges: &[PoseGraphEdge],
    kernel: &Kernel,
    blocks: &[Option<usize>],
    dim: usize,
) -> (DMatrix<f64>, DVector<f64>) {
    let mut h = DMatrix::<f64>::zeros(dim, dim);
    let mut g = DVector::<f64>::zeros(dim);

    for e in edges {
        if e.information.is_zero() {
            continue;
        }
        let lin = linearize_edge(&poses[e.source], &poses[e.target], &e.transform);
        let omega: &Matrix6<f64> = e.information.as_matrix();
        let w = kernel.weight(e.information.chi_square(&lin.residual), e.uncertain);
        let wr: Vector6<f64> = omega * lin.residual * w;
        let parts = [(blocks[e.source], lin.jac_source), (blocks[e.target], lin.jac_target)];

        for (bi, ji) in parts.iter() {
            let Some(bi) = *bi else { continue };
            let jt_omega = ji.transpose() * omega * w;
            let mut gi = g.fixed_rows_mut::<6>(bi);
            gi += ji.transpose() * wr;
            for (bj, jj) in parts.iter() {
                let Some(bj) = *bj else { continue };
                let mut hij = h.fixed_view_mut::<6, 6>(bi, bj);
                hij += jt_omega * jj;
            }
        }
    }
    (h, g)
}

fn retract(poses: &[RigidTransform], step: &DVector<f64>, blocks: &[Option<usize>]) -> Vec<RigidTransform> {
    poses
        .iter()
        .zip(blocks)
        .map(|(pose, b)| match b {
            Some(b) => {
                let xi: Twist = step.fixed_rows::<6>(*b).into_owned();
                RigidTransform::exp(&xi).compose(pose)
            }
            None => *pose,
        })
        .collect()
}

fn state_norm(poses: &[RigidTransform], blocks: &[Option<usize>]) -> f64 {
    poses
        .iter()
        .zip(blocks)
        .filter(|(_, b)| b.is_some())
        .map(|(p, _)| p.log().norm_squared())
        .sum::<f64>()
        .sqrt()
}

struct InnerOutcome {
    status: InnerStatus,
    iterations: usize,
    initial_cost: f64,
    final_cost: f64,
}

/// Levenberg-Marquardt over all non-reference poses. Only cost-decreasing
/// steps are accepted, so `poses` always holds the best state seen.
fn levenberg_marquardt(
    poses: &mut Vec<RigidTransform>,
    edges: &[PoseGraphEdge],
    options: &OptimizerOptions,
    deadline: Option<Instant>,
) -> InnerOutcome {
    let criteria = &options.criteria;
    let kernel = kernel_for(edges, options);
    let blocks = block_index(poses.len(), options.reference_node);
    let dim = 6 * blocks.iter().filter(|b| b.is_some()).count();

    let initial_cost = total_cost(poses, edges, &kernel);
    let mut cost = initial_cost;
    let outcome = |status, iterations, final_cost| InnerOutcome {
        status,
        iterations,
        initial_cost,
        final_cost,
    };
    if dim == 0 || cost < criteria.min_cost {
        return outcome(InnerStatus::Converged, 0, cost);
    }

    let (mut h, mut g) = assemble(poses, edges, &kernel, &blocks, dim);
    let max_diag = (0..dim).map(|i| h[(i, i)]).fold(0.0f64, f64::max);
    let mut damping = Damping::new(options.initial_damping, max_diag);

    for iter in 0..criteria.max_iterations {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return outcome(InnerStatus::BudgetExhausted, iter, cost);
        }
        if g.amax() < criteria.min_gradient {
            return outcome(InnerStatus::Converged, iter, cost);
        }

        let mut accepted = false;
        for _ in 0..=criteria.max_damping_retries {
            let mut damped = h.clone();
            for i in 0..dim {
                damped[(i, i)] += damping.lambda();
            }
            let Some(chol) = damped.cholesky() else {
                damping.reject();
                if damping.is_broken(options.max_damping) {
                    break;
                }
                continue;
            };
            let step = chol.solve(&(-&g));

            let x_norm = state_norm(poses, &blocks);
            if step.norm() < criteria.min_relative_step * (x_norm + criteria.min_relative_step) {
                debug!("lm iter {iter}: step below tolerance, cost {cost:.6e}");
                return outcome(InnerStatus::Converged, iter, cost);
            }

            let candidate = retract(poses, &step, &blocks);
            let new_cost = total_cost(&candidate, edges, &kernel);
            let predicted = step.dot(&(damping.lambda() * &step - &g));
            let rho = (cost - new_cost) / predicted;

            if new_cost.is_finite() && predicted > 0.0 && rho > 0.0 {
                let decrease = (cost - new_cost) / cost;
                debug!(
                    "lm iter {iter}: cost {cost:.6e} -> {new_cost:.6e}, lambda {:.3e}",
                    damping.lambda()
                );
                *poses = candidate;
                cost = new_cost;
                damping.accept(rho);
                accepted = true;
                if cost < criteria.min_cost || decrease < criteria.min_relative_cost_decrease {
                    return outcome(InnerStatus::Converged, iter + 1, cost);
                }
                break;
            }

            damping.reject();
            if damping.is_broken(options.max_damping) {
                break;
            }
        }

        if !accepted {
            warn!(
                "pose graph optimisation diverged at iteration {iter}: lambda {:.3e}, cost {cost:.6e}",
                damping.lambda()
            );
            return outcome(InnerStatus::Diverged, iter, cost);
        }
        (h, g) = assemble(poses, edges, &kernel, &blocks, dim);
    }
    outcome(InnerStatus::MaxIterations, criteria.max_iterations, cost)
}

/// Optimises node poses, then repeatedly prunes uncertain edges that still
/// disagree with the solution and re-solves on the reduced graph.
///
/// The graph is consumed and handed back in the report. The reference
/// node's pose is never modified.
///
/// # Errors
///
/// Fails only on a malformed graph or an out-of-range reference node.
/// Divergence is reported through [`OptimizationReport::status`].
pub fn optimize(mut graph: PoseGraph, options: &OptimizerOptions) -> Result<OptimizationReport, OptimizeError> {
    graph.validate()?;
    let nodes = graph.num_nodes();
    if options.reference_node >= nodes && nodes > 0 {
        return Err(OptimizeError::ReferenceOutOfRange {
            reference: options.reference_node,
            nodes,
        });
    }

    let deadline = options.time_budget.map(|b| Instant::now() + b);
    let mut poses = graph.poses();
    // Pair each live edge with its position in the input list.
    let mut live: Vec<(usize, PoseGraphEdge)> = graph.edges.iter().copied().enumerate().collect();
    let mut pruned_edges = Vec::new();
    let mut rounds = 0;
    let mut iterations = 0;
    let mut diverged = false;
    let mut initial_cost = None;

    let (status, final_cost) = loop {
        let edges: Vec<PoseGraphEdge> = live.iter().map(|(_, e)| *e).collect();
        let inner = levenberg_marquardt(&mut poses, &edges, options, deadline);
        rounds += 1;
        iterations += inner.iterations;
        diverged |= inner.status == InnerStatus::Diverged;
        initial_cost.get_or_insert(inner.initial_cost);
        info!(
            "pose graph round {rounds}: {:?} after {} iterations, cost {:.6e} -> {:.6e}",
            inner.status, inner.iterations, inner.initial_cost, inner.final_cost
        );

        if inner.status == InnerStatus::BudgetExhausted || rounds > options.criteria.max_prune_rounds {
            break (inner.status, inner.final_cost);
        }

        let kernel = kernel_for(&edges, options);
        let before = live.len();
        live.retain(|(id, e)| {
            let chi2 = edge_chi2(&poses, e);
            let prune = e.uncertain
                && match options.prune_rule {
                    PruneRule::ChiSquare => chi2 > options.edge_prune_threshold,
                    PruneRule::LineProcess => kernel.confidence(chi2) < options.edge_prune_threshold,
                };
            if prune {
                debug!("pruning edge {id} ({} -> {}), chi2 {chi2:.4e}", e.source, e.target);
                pruned_edges.push(*id);
            }
            !prune
        });
        if live.len() == before {
            break (inner.status, inner.final_cost);
        }
        info!("pruned {} loop closure(s)", before - live.len());
    };

    for (node, pose) in graph.nodes.iter_mut().zip(poses) {
        node.pose = pose;
    }
    graph.edges = live.into_iter().map(|(_, e)| e).collect();

    Ok(OptimizationReport {
        graph,
        pruned_edges,
        prune_rounds: rounds,
        status,
        diverged,
        initial_cost: initial_cost.unwrap_or(0.0),
        final_cost,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PoseGraphEdge;
    use approx::assert_relative_eq;
    use multiway_core::InformationMatrix;
    use nalgebra::Vector3;

    fn truth(i: usize) -> RigidTransform {
        let f = i as f64;
        RigidTransform::exp(&Twist::new(0.0, 0.0, 0.2 * f, f, 0.3 * f, 0.0))
    }

    fn measurement(s: usize, t: usize) -> RigidTransform {
        truth(t).inverse().compose(&truth(s))
    }

    /// Four nodes, exact odometry and loop closures, poses perturbed away
    /// from the truth.
    fn consistent_graph() -> PoseGraph {
        let info = InformationMatrix::identity().scaled(100.0);
        let mut graph = PoseGraph::new();
        for i in 0..4 {
            let noise = if i == 0 {
                RigidTransform::identity()
            } else {
                RigidTransform::exp(&Twist::new(0.02, -0.01, 0.03, 0.1, -0.05, 0.08))
            };
            graph.add_node(noise.compose(&truth(i)));
        }
        for s in 0..4 {
            for t in s + 1..4 {
                let edge = if t == s + 1 {
                    PoseGraphEdge::odometry(s, t, measurement(s, t), info)
                } else {
                    PoseGraphEdge::loop_closure(s, t, measurement(s, t), info)
                };
                graph.add_edge(edge);
            }
        }
        graph
    }

    fn assert_at_truth(graph: &PoseGraph, tol: f64) {
        for (i, node) in graph.nodes.iter().enumerate() {
            assert!(node.pose.approx_eq(&truth(i), tol), "node {i}: {:?}", node.pose);
        }
    }

    #[test]
    fn converges_to_truth_and_keeps_reference_fixed() {
        let graph = consistent_graph();
        let reference = graph.nodes[0].pose;
        let report = optimize(graph, &OptimizerOptions::new(0.05, 0.25, 0)).unwrap();
        assert_eq!(report.status, InnerStatus::Converged);
        assert!(report.pruned_edges.is_empty());
        assert!(report.final_cost < report.initial_cost);
        assert_eq!(report.graph.nodes[0].pose, reference);
        assert_at_truth(&report.graph, 1e-5);
    }

    #[test]
    fn reoptimising_is_idempotent() {
        let options = OptimizerOptions::new(0.05, 0.25, 0);
        let once = optimize(consistent_graph(), &options).unwrap();
        let twice = optimize(once.graph.clone(), &options).unwrap();
        for (a, b) in once.graph.nodes.iter().zip(&twice.graph.nodes) {
            assert!(a.pose.approx_eq(&b.pose, 1e-5));
        }
        assert!(twice.pruned_edges.is_empty());
    }

    #[test]
    fn corrupted_loop_closure_is_pruned() {
        let mut graph = consistent_graph();
        let bad = graph
            .edges
            .iter()
            .position(|e| e.source == 0 && e.target == 2)
            .unwrap();
        graph.edges[bad].transform = RigidTransform::from_axis_angle(
            &Vector3::new(1.0, 1.0, 0.0),
            1.0,
            Vector3::new(5.0, -3.0, 2.0),
        )
        .compose(&graph.edges[bad].transform);

        let report = optimize(graph, &OptimizerOptions::new(0.05, 1e-3, 0)).unwrap();
        assert_eq!(report.pruned_edges, vec![bad]);
        assert_eq!(report.graph.edges.iter().filter(|e| !e.uncertain).count(), 3);
        assert_eq!(report.graph.num_edges(), 5);
        assert!(report.prune_rounds >= 2);
        assert_at_truth(&report.graph, 1e-4);
    }

    #[test]
    fn odometry_edges_are_never_pruned() {
        let mut graph = consistent_graph();
        graph.edges.retain(|e| !e.uncertain);
        graph.edges[1].transform = RigidTransform::from_translation(Vector3::new(3.0, 0.0, 0.0));
        let report = optimize(graph, &OptimizerOptions::new(0.05, 1e-6, 0)).unwrap();
        assert!(report.pruned_edges.is_empty());
        assert_eq!(report.graph.num_edges(), 3);
    }

    #[test]
    fn line_process_rule_prunes_low_confidence() {
        let mut graph = consistent_graph();
        let bad = graph.edges.iter().position(|e| e.uncertain).unwrap();
        graph.edges[bad].transform =
            RigidTransform::from_translation(Vector3::new(4.0, 4.0, 0.0)).compose(&graph.edges[bad].transform);
        let options = OptimizerOptions {
            prune_rule: PruneRule::LineProcess,
            ..OptimizerOptions::new(0.05, 0.25, 0)
        };
        let report = optimize(graph, &options).unwrap();
        assert_eq!(report.pruned_edges, vec![bad]);
    }

    #[test]
    fn zero_information_edges_do_not_move_nodes() {
        let mut graph = PoseGraph::from_poses([RigidTransform::identity(), truth(1)]);
        graph.add_edge(PoseGraphEdge::odometry(
            0,
            1,
            RigidTransform::identity(),
            InformationMatrix::zeros(),
        ));
        let report = optimize(graph, &OptimizerOptions::default()).unwrap();
        assert_eq!(report.status, InnerStatus::Converged);
        assert_eq!(report.graph.nodes[1].pose, truth(1));
    }

    #[test]
    fn other_reference_node_is_respected() {
        let graph = consistent_graph();
        let anchor = graph.nodes[2].pose;
        let report = optimize(graph, &OptimizerOptions::new(0.05, 0.25, 2)).unwrap();
        assert_eq!(report.graph.nodes[2].pose, anchor);
        let g = &report.graph;
        for e in &g.edges {
            assert!(g.implied_transform(e).approx_eq(&e.transform, 1e-5));
        }
    }

    #[test]
    fn invalid_inputs_are_errors() {
        let graph = consistent_graph();
        assert_eq!(
            optimize(graph, &OptimizerOptions::new(0.05, 0.25, 9)).unwrap_err(),
            OptimizeError::ReferenceOutOfRange { reference: 9, nodes: 4 }
        );
        let mut bad = consistent_graph();
        bad.edges[0].target = 0;
        assert!(matches!(
            optimize(bad, &OptimizerOptions::default()),
            Err(OptimizeError::InvalidGraph(GraphError::SelfLoop { .. }))
        ));
    }

    #[test]
    fn zero_budget_stops_immediately() {
        let graph = consistent_graph();
        let before = graph.poses();
        let options = OptimizerOptions {
            time_budget: Some(Duration::ZERO),
            ..OptimizerOptions::default()
        };
        let report = optimize(graph, &options).unwrap();
        assert_eq!(report.status, InnerStatus::BudgetExhausted);
        assert_eq!(report.graph.poses(), before);
    }

    #[test]
    fn overshooting_step_with_no_retries_diverges_and_keeps_poses() {
        // All nodes start at the origin; metre-scale lever arms with
        // rotations near a radian make the first linearised step overshoot.
        let info = InformationMatrix::identity();
        let mut graph = PoseGraph::from_poses([RigidTransform::identity(); 3]);
        graph.add_edge(PoseGraphEdge::odometry(
            0,
            1,
            RigidTransform::exp(&Twist::new(0.6, -0.2, -0.7, 10.0, -7.0, -2.0)),
            info,
        ));
        graph.add_edge(PoseGraphEdge::odometry(
            1,
            2,
            RigidTransform::exp(&Twist::new(-0.7, -0.3, -1.1, 2.0, 3.0, -3.0)),
            info,
        ));
        graph.add_edge(PoseGraphEdge::loop_closure(
            0,
            2,
            RigidTransform::exp(&Twist::new(0.0, 0.3, -0.1, -6.0, -2.0, 9.0)),
            info,
        ));
        let before = graph.poses();

        let options = OptimizerOptions {
            robust_loop_closures: false,
            max_damping: 1e-30,
            criteria: ConvergenceCriteria {
                max_damping_retries: 0,
                max_prune_rounds: 0,
                ..ConvergenceCriteria::default()
            },
            ..OptimizerOptions::default()
        };
        let report = optimize(graph, &options).unwrap();

        assert_eq!(report.status, InnerStatus::Diverged);
        assert!(report.diverged);
        assert_eq!(report.graph.poses(), before);
        assert!(report.initial_cost > 0.0);
        assert!(report.final_cost <= report.initial_cost);
        assert!(report.pruned_edges.is_empty());
    }

    #[test]
    fn empty_graph_is_trivially_converged() {
        let report = optimize(PoseGraph::new(), &OptimizerOptions::default()).unwrap();
        assert_eq!(report.status, InnerStatus::Converged);
        assert!(report.graph.nodes.is_empty());
    }

    #[test]
    fn damping_grows_on_rejection_and_shrinks_on_success() {
        let mut d = Damping::new(1e-3, 100.0);
        assert_relative_eq!(d.lambda(), 0.1, epsilon = 1e-15);
        d.reject();
        assert_relative_eq!(d.lambda(), 0.2, epsilon = 1e-15);
        d.reject();
        assert_relative_eq!(d.lambda(), 0.8, epsilon = 1e-15);
        // A perfect gain ratio shrinks by the maximum factor of three.
        d.accept(1.0);
        assert_relative_eq!(d.lambda(), 0.8 / 3.0, epsilon = 1e-15);
        // A poor one grows it, but by less than a rejection would.
        let before = d.lambda();
        d.accept(0.01);
        assert!(d.lambda() > before && d.lambda() < 2.0 * before);
    }

    #[test]
    fn damping_breaks_down_eventually() {
        let mut d = Damping::new(1e-5, 1.0);
        let mut steps = 0;
        while !d.is_broken(1e32) {
            d.reject();
            steps += 1;
        }
        assert!(steps < 20);
    }
}
