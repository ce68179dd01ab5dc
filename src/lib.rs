//! Multiway registration of overlapping point-cloud scans.
//!
//! Scans are aligned pairwise with two-stage point-to-plane ICP, filtered
//! down to the largest mutually combinable subset, tied together in a pose
//! graph and optimized globally with Levenberg-Marquardt, pruning loop
//! closures that disagree with the solution. Each stage lives in its own
//! crate; this crate re-exports them.

#![forbid(unsafe_code)]

pub use multiway_combinability as combinability;
pub use multiway_core as core;
pub use multiway_filters as filters;
pub use multiway_io as io;
pub use multiway_normals as normals;
pub use multiway_pipeline as pipeline;
pub use multiway_posegraph as posegraph;
pub use multiway_registration as registration;
pub use multiway_spatial as spatial;

pub use multiway_core::{InformationMatrix, PointCloud, RigidTransform};
pub use multiway_pipeline::{run, PipelineConfig, PipelineOutcome};
