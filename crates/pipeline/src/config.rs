use log::{info, warn};
use multiway_posegraph::OptimizerOptions;
use multiway_registration::PairwiseParams;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

pub const DEFAULT_VOXEL_SIZE: f64 = 0.02;
pub const DEFAULT_NB_NEIGHBORS: usize = 20;
pub const DEFAULT_STD_RATIO: f64 = 2.0;
pub const DEFAULT_COMBINABILITY_THRESHOLD: f64 = 0.5;
pub const DEFAULT_EDGE_PRUNE_THRESHOLD: f64 = 0.25;
pub const DEFAULT_OUTPUT_FILE: &str = "merged.pcd";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutlierParams {
    pub nb_neighbors: usize,
    pub std_ratio: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            nb_neighbors: DEFAULT_NB_NEIGHBORS,
            std_ratio: DEFAULT_STD_RATIO,
        }
    }
}

/// Run configuration, read from JSON.
///
/// [`PipelineConfig::load`] validates every field on its own and falls back
/// to the field's default with a warning, so a damaged file degrades to
/// defaults instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Directory of `.pcd` / `.ply` scans. No default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,
    pub output_file: PathBuf,
    pub voxel_size: f64,
    pub remove_outliers_params: OutlierParams,
    pub combinability_threshold: f64,
    pub edge_prune_threshold: f64,
    pub reference_node: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: None,
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            voxel_size: DEFAULT_VOXEL_SIZE,
            remove_outliers_params: OutlierParams::default(),
            combinability_threshold: DEFAULT_COMBINABILITY_THRESHOLD,
            edge_prune_threshold: DEFAULT_EDGE_PRUNE_THRESHOLD,
            reference_node: 0,
        }
    }
}

impl PipelineConfig {
    /// Reads `path`. Never fails: an unreadable file or broken JSON yields
    /// the defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config = Self::from_json_str(&text);
                info!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("cannot read config {}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_json_str(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                warn!("config is not valid JSON ({e}); using defaults");
                Self::default()
            }
        }
    }

    /// Builds a config from an already-parsed document.
    ///
    /// If the document has a `config_params` object, the numeric settings
    /// are read from there; paths always come from the top level.
    pub fn from_value(value: &Value) -> Self {
        let empty = Map::new();
        let Some(root) = value.as_object() else {
            warn!("config root is not an object; using defaults");
            return Self::default();
        };
        let params = match root.get("config_params") {
            Some(Value::Object(params)) => params,
            Some(_) => {
                warn!("`config_params` is not an object; using defaults for its fields");
                &empty
            }
            None => root,
        };

        let defaults = Self::default();
        let input_path = match root.get("input_path") {
            None => {
                warn!("config has no `input_path`");
                None
            }
            Some(v) => match v.as_str() {
                Some(s) => Some(PathBuf::from(s)),
                None => {
                    warn!("invalid `input_path` = {v}");
                    None
                }
            },
        };
        let output_file = field(root, "output_file", defaults.output_file, Presence::Expected, |v| {
            v.as_str().map(PathBuf::from)
        });

        let outliers = match params.get("remove_outliers_params") {
            Some(Value::Object(section)) => OutlierParams {
                nb_neighbors: field(section, "nb_neighbors", DEFAULT_NB_NEIGHBORS, Presence::Expected, positive_int),
                std_ratio: field(section, "std_ratio", DEFAULT_STD_RATIO, Presence::Expected, positive_float),
            },
            other => {
                match other {
                    None => warn!("missing `remove_outliers_params`; using {:?}", defaults.remove_outliers_params),
                    Some(v) => warn!("invalid `remove_outliers_params` = {v}; using defaults"),
                }
                defaults.remove_outliers_params
            }
        };

        Self {
            input_path,
            output_file,
            voxel_size: field(params, "voxel_size", DEFAULT_VOXEL_SIZE, Presence::Expected, positive_float),
            remove_outliers_params: outliers,
            combinability_threshold: field(
                params,
                "combinability_threshold",
                DEFAULT_COMBINABILITY_THRESHOLD,
                Presence::Expected,
                positive_float,
            ),
            edge_prune_threshold: field(
                params,
                "edge_prune_threshold",
                DEFAULT_EDGE_PRUNE_THRESHOLD,
                Presence::Optional,
                non_negative_float,
            ),
            reference_node: field(params, "reference_node", 0, Presence::Optional, |v| {
                v.as_u64().and_then(|n| usize::try_from(n).ok())
            }),
        }
    }

    /// Coarse ICP distance, 15 voxels.
    pub fn coarse_distance(&self) -> f64 {
        self.voxel_size * multiway_registration::pairwise::COARSE_VOXEL_FACTOR
    }

    /// Fine ICP distance, 1.5 voxels. Also the optimizer's correspondence
    /// distance.
    pub fn fine_distance(&self) -> f64 {
        self.voxel_size * multiway_registration::pairwise::FINE_VOXEL_FACTOR
    }

    pub fn pairwise_params(&self) -> PairwiseParams {
        PairwiseParams::from_voxel_size(self.voxel_size)
    }

    pub fn optimizer_options(&self) -> OptimizerOptions {
        OptimizerOptions::new(self.fine_distance(), self.edge_prune_threshold, self.reference_node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Expected,
    Optional,
}

fn field<T: Debug>(
    section: &Map<String, Value>,
    key: &str,
    default: T,
    presence: Presence,
    parse: impl FnOnce(&Value) -> Option<T>,
) -> T {
    match section.get(key) {
        None => {
            if presence == Presence::Expected {
                warn!("config is missing `{key}`; using {default:?}");
            }
            default
        }
        Some(v) => parse(v).unwrap_or_else(|| {
            warn!("invalid `{key}` = {v}; using {default:?}");
            default
        }),
    }
}

fn positive_float(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite() && *x > 0.0)
}

fn non_negative_float(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite() && *x >= 0.0)
}

fn positive_int(v: &Value) -> Option<usize> {
    v.as_u64().filter(|n| *n > 0).and_then(|n| usize::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn reads_flat_document() {
        let cfg = PipelineConfig::from_value(&json!({
            "input_path": "scans",
            "output_file": "out.ply",
            "voxel_size": 0.05,
            "remove_outliers_params": { "nb_neighbors": 8, "std_ratio": 1.5 },
            "combinability_threshold": 0.3,
            "edge_prune_threshold": 0.1,
            "reference_node": 2
        }));
        assert_eq!(cfg.input_path, Some(PathBuf::from("scans")));
        assert_eq!(cfg.output_file, PathBuf::from("out.ply"));
        assert_eq!(cfg.voxel_size, 0.05);
        assert_eq!(cfg.remove_outliers_params, OutlierParams { nb_neighbors: 8, std_ratio: 1.5 });
        assert_eq!(cfg.combinability_threshold, 0.3);
        assert_eq!(cfg.edge_prune_threshold, 0.1);
        assert_eq!(cfg.reference_node, 2);
    }

    #[test]
    fn reads_legacy_config_params_section() {
        let cfg = PipelineConfig::from_value(&json!({
            "input_path": "scans",
            "output_file": "out.pcd",
            "config_params": {
                "voxel_size": 0.01,
                "remove_outliers_params": { "nb_neighbors": 30, "std_ratio": 3.0 },
                "combinability_threshold": 0.8
            }
        }));
        assert_eq!(cfg.voxel_size, 0.01);
        assert_eq!(cfg.remove_outliers_params.nb_neighbors, 30);
        assert_eq!(cfg.combinability_threshold, 0.8);
        assert_eq!(cfg.output_file, PathBuf::from("out.pcd"));
    }

    #[test]
    fn invalid_fields_fall_back_one_by_one() {
        let cfg = PipelineConfig::from_value(&json!({
            "input_path": "scans",
            "voxel_size": -1.0,
            "remove_outliers_params": { "nb_neighbors": 2.5, "std_ratio": 4.0 },
            "combinability_threshold": "far"
        }));
        assert_eq!(cfg.voxel_size, DEFAULT_VOXEL_SIZE);
        assert_eq!(cfg.remove_outliers_params.nb_neighbors, DEFAULT_NB_NEIGHBORS);
        assert_eq!(cfg.remove_outliers_params.std_ratio, 4.0);
        assert_eq!(cfg.combinability_threshold, DEFAULT_COMBINABILITY_THRESHOLD);
        assert_eq!(cfg.output_file, PathBuf::from(DEFAULT_OUTPUT_FILE));
    }

    #[test]
    fn broken_input_gives_defaults() {
        assert_eq!(PipelineConfig::from_json_str("{ not json"), PipelineConfig::default());
        assert_eq!(PipelineConfig::from_json_str("[1, 2]"), PipelineConfig::default());
        assert_eq!(
            PipelineConfig::load("/definitely/not/here/config.json"),
            PipelineConfig::default()
        );
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let written = PipelineConfig {
            input_path: Some(dir.path().to_path_buf()),
            voxel_size: 0.04,
            ..PipelineConfig::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&written).unwrap()).unwrap();
        assert_eq!(PipelineConfig::load(&path), written);
    }

    #[test]
    fn derived_distances_follow_voxel_size() {
        let cfg = PipelineConfig {
            voxel_size: 0.02,
            ..PipelineConfig::default()
        };
        assert_relative_eq!(cfg.coarse_distance(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(cfg.fine_distance(), 0.03, epsilon = 1e-12);
        let opts = cfg.optimizer_options();
        assert_relative_eq!(opts.max_correspondence_distance, 0.03, epsilon = 1e-12);
        assert_eq!(opts.edge_prune_threshold, DEFAULT_EDGE_PRUNE_THRESHOLD);
        let pair = cfg.pairwise_params();
        assert_relative_eq!(pair.coarse_distance, 0.3, epsilon = 1e-6);
    }
}
