#![forbid(unsafe_code)]

pub mod estimate;

pub use estimate::{
    estimate_normals, estimate_normals_hybrid, estimate_normals_with_viewpoint,
    with_estimated_normals, DEFAULT_MAX_NN, DEFAULT_RADIUS, FALLBACK_NORMAL,
};
