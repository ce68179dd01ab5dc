#![forbid(unsafe_code)]

pub mod builder;
pub mod graph;
pub mod lie;
pub mod odometry;
pub mod optimizer;

pub use builder::{build_from_clouds, build_pose_graph, BuildReport, FailedPair, IcpRegistrar, PairRegistrar};
pub use graph::{GraphError, PoseGraph, PoseGraphEdge, PoseGraphNode};
pub use lie::{adjoint, edge_residual, linearize_edge, small_adjoint, EdgeLinearization};
pub use odometry::chain_odometry;
pub use optimizer::{
    optimize, ConvergenceCriteria, Damping, InnerStatus, OptimizationReport, OptimizeError,
    OptimizerOptions, PruneRule,
};
