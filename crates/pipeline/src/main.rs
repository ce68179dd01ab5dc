use clap::Parser;
use multiway_pipeline::{run, NoopHooks, PipelineConfig, PipelineOutcome};
use std::path::PathBuf;

/// Aligns a directory of overlapping scans into one merged point cloud.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file. Missing or invalid settings fall back to
    /// defaults.
    #[arg(default_value = "config.json")]
    config: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = PipelineConfig::load(&args.config);

    match run(&config, &NoopHooks) {
        Ok(report) => match report.outcome {
            PipelineOutcome::Merged { points, output } => {
                let target = output.map(|p| p.display().to_string()).unwrap_or_default();
                log::info!("merged {} clouds into {points} points {target}", report.selected.len());
            }
            PipelineOutcome::InsufficientData { combinable, loaded } => {
                log::warn!("insufficient data: {combinable} of {loaded} clouds combinable, nothing written");
            }
        },
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    }
}
