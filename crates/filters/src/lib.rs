#![forbid(unsafe_code)]

pub mod statistical_outlier;
pub mod voxel_downsample;

pub use statistical_outlier::statistical_outlier_removal;
pub use voxel_downsample::voxel_downsample;
