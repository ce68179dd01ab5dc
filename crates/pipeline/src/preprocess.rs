use crate::config::OutlierParams;
use log::debug;
use multiway_core::PointCloud;
use multiway_filters::{statistical_outlier_removal, voxel_downsample};
use rayon::prelude::*;

/// Voxel downsampling followed by statistical outlier removal.
///
/// A non-positive `voxel_size` skips downsampling; `None` skips outlier
/// removal.
pub fn preprocess(cloud: &PointCloud, voxel_size: f64, outliers: Option<&OutlierParams>) -> PointCloud {
    let down = voxel_downsample(cloud, voxel_size as f32);
    let out = match outliers {
        Some(p) => statistical_outlier_removal(&down, p.nb_neighbors, p.std_ratio as f32),
        None => down,
    };
    debug!("preprocess: {} -> {} points", cloud.len(), out.len());
    out
}

/// [`preprocess`] over every cloud in parallel; output order matches input.
pub fn preprocess_all(
    clouds: &[PointCloud],
    voxel_size: f64,
    outliers: Option<&OutlierParams>,
) -> Vec<PointCloud> {
    clouds
        .par_iter()
        .map(|c| preprocess(c, voxel_size, outliers))
        .collect()
}
