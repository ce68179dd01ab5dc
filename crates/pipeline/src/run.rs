use crate::config::{OutlierParams, PipelineConfig};
use crate::export::{export, merge_clouds, ExportError};
use crate::hooks::PipelineHooks;
use crate::preprocess::preprocess_all;
use log::{info, warn};
use multiway_combinability::select;
use multiway_core::{PointCloud, RigidTransform};
use multiway_io::{load_cloud_directory, CloudIoError};
use multiway_posegraph::{
    build_pose_graph, optimize, IcpRegistrar, InnerStatus, OptimizeError, OptimizerOptions,
};
use multiway_registration::PairwiseParams;
use std::path::PathBuf;

/// Everything a run needs once the clouds are in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub voxel_size: f64,
    pub outliers: Option<OutlierParams>,
    pub combinability_threshold: f64,
    pub pairwise: PairwiseParams,
    pub optimizer: OptimizerOptions,
    /// Where to write the merged cloud; `None` keeps it in memory only.
    pub output: Option<PathBuf>,
}

impl PipelineSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            voxel_size: config.voxel_size,
            outliers: Some(config.remove_outliers_params),
            combinability_threshold: config.combinability_threshold,
            pairwise: config.pairwise_params(),
            optimizer: config.optimizer_options(),
            output: Some(config.output_file.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationSummary {
    pub status: InnerStatus,
    pub diverged: bool,
    /// Edge indices in the built graph, which enumerates pairs `(i, j)`
    /// with `i < j` in order.
    pub pruned_edges: Vec<usize>,
    pub prune_rounds: usize,
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub failed_pairs: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Clouds were registered and merged.
    Merged {
        points: usize,
        output: Option<PathBuf>,
    },
    /// Fewer than two clouds are mutually combinable; nothing was
    /// registered or written.
    InsufficientData { combinable: usize, loaded: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub loaded: usize,
    /// Input indices of the clouds that were registered, in input order.
    pub selected: Vec<usize>,
    /// Optimized global pose of each selected cloud.
    pub poses: Vec<RigidTransform>,
    pub optimization: Option<OptimizationSummary>,
    pub outcome: PipelineOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no point clouds were loaded{}", .input.as_ref().map(|p| format!(" from {}", p.display())).unwrap_or_default())]
    NoCloudsLoaded { input: Option<PathBuf> },

    #[error("every cloud is empty after preprocessing")]
    NoPointsAfterPreprocessing,

    #[error(transparent)]
    Io(#[from] CloudIoError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Loads `config.input_path` and runs [`run_on_clouds`] on it.
pub fn run(config: &PipelineConfig, hooks: &dyn PipelineHooks) -> Result<PipelineReport, PipelineError> {
    let Some(input) = config.input_path.as_ref() else {
        return Err(PipelineError::NoCloudsLoaded { input: None });
    };
    let loaded = load_cloud_directory(input)?;
    if loaded.is_empty() {
        return Err(PipelineError::NoCloudsLoaded {
            input: Some(input.clone()),
        });
    }
    info!("loaded {} clouds from {}", loaded.len(), input.display());
    let clouds: Vec<PointCloud> = loaded.into_iter().map(|l| l.cloud).collect();
    run_on_clouds(&clouds, &PipelineSettings::from_config(config), hooks)
}

/// Preprocess, select, register, optimize and merge in-memory clouds.
///
/// # Errors
///
/// Only systemic failures are errors: no input, nothing left after
/// preprocessing, or a failed write. Too few combinable clouds is the
/// [`PipelineOutcome::InsufficientData`] outcome.
pub fn run_on_clouds(
    clouds: &[PointCloud],
    settings: &PipelineSettings,
    hooks: &dyn PipelineHooks,
) -> Result<PipelineReport, PipelineError> {
    if clouds.is_empty() {
        return Err(PipelineError::NoCloudsLoaded { input: None });
    }

    let processed = preprocess_all(clouds, settings.voxel_size, settings.outliers.as_ref());
    if processed.iter().all(PointCloud::is_empty) {
        return Err(PipelineError::NoPointsAfterPreprocessing);
    }
    info!(
        "preprocessed {} clouds: {} -> {} points",
        clouds.len(),
        clouds.iter().map(PointCloud::len).sum::<usize>(),
        processed.iter().map(PointCloud::len).sum::<usize>()
    );
    hooks.after_preprocessing(&processed);

    let selected = select(&processed, settings.combinability_threshold);
    if selected.len() < 2 {
        warn!(
            "only {} of {} clouds are combinable; skipping registration",
            selected.len(),
            clouds.len()
        );
        return Ok(PipelineReport {
            loaded: clouds.len(),
            selected: selected.clone(),
            poses: Vec::new(),
            optimization: None,
            outcome: PipelineOutcome::InsufficientData {
                combinable: selected.len(),
                loaded: clouds.len(),
            },
        });
    }
    info!("registering clouds {selected:?}");

    let subset: Vec<PointCloud> = selected.iter().map(|&i| processed[i].clone()).collect();
    let registrar = IcpRegistrar::new(&subset, settings.pairwise);
    let built = build_pose_graph(subset.len(), &registrar);

    let mut options = settings.optimizer.clone();
    if options.reference_node >= subset.len() {
        warn!(
            "reference node {} is outside the {} selected clouds; anchoring node 0",
            options.reference_node,
            subset.len()
        );
        options.reference_node = 0;
    }
    let optimized = optimize(built.graph, &options)?;
    if optimized.diverged {
        warn!("pose graph optimisation diverged; keeping the best poses found");
    }
    hooks.after_optimization(&subset, &optimized.graph);

    let points = match settings.output.as_ref() {
        Some(path) => export(&subset, &optimized.graph, path)?,
        None => merge_clouds(&subset, &optimized.graph)?.len(),
    };

    Ok(PipelineReport {
        loaded: clouds.len(),
        poses: optimized.graph.poses(),
        optimization: Some(OptimizationSummary {
            status: optimized.status,
            diverged: optimized.diverged,
            pruned_edges: optimized.pruned_edges,
            prune_rounds: optimized.prune_rounds,
            iterations: optimized.iterations,
            initial_cost: optimized.initial_cost,
            final_cost: optimized.final_cost,
            failed_pairs: built.failed_pairs.len(),
        }),
        selected,
        outcome: PipelineOutcome::Merged {
            points,
            output: settings.output.clone(),
        },
    })
}
