use multiway_core::PointCloud;
use multiway_posegraph::PoseGraph;

/// Observation points for previews or diagnostics. Both methods default to
/// doing nothing; the pipeline never depends on what they do.
pub trait PipelineHooks {
    /// Called with the preprocessed clouds, before the combinability filter.
    fn after_preprocessing(&self, _clouds: &[PointCloud]) {}

    /// Called with the selected clouds and their optimized pose graph,
    /// before export.
    fn after_optimization(&self, _clouds: &[PointCloud], _graph: &PoseGraph) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PipelineHooks for NoopHooks {}
