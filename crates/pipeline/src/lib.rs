#![forbid(unsafe_code)]

pub mod config;
pub mod export;
pub mod hooks;
pub mod preprocess;
pub mod run;

pub use config::{OutlierParams, PipelineConfig};
pub use export::{export, merge_clouds, ExportError};
pub use hooks::{NoopHooks, PipelineHooks};
pub use preprocess::{preprocess, preprocess_all};
pub use run::{
    run, run_on_clouds, OptimizationSummary, PipelineError, PipelineOutcome, PipelineReport,
    PipelineSettings,
};
