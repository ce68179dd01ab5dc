use multiway_core::{PointCloud, RigidTransform, Twist};
use multiway_pipeline::{run_on_clouds, NoopHooks, PipelineOutcome, PipelineSettings};
use multiway_posegraph::OptimizerOptions;
use multiway_registration::PairwiseParams;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Four scans of a room corner taken from poses drifting along x, plus one
/// scan of somewhere else entirely.
fn scans() -> Vec<PointCloud> {
    let mut rng = StdRng::seed_from_u64(11);
    let mut pts = Vec::new();
    for i in 0..40 {
        for j in 0..40 {
            let (a, b) = ((i as f32 + 0.5) * 0.05, (j as f32 + 0.5) * 0.05);
            // Sub-millimetre sensor noise.
            for p in [[a, b, 0.0], [0.0, a, b], [a, 0.0, b]] {
                pts.push(p.map(|v: f32| v + rng.gen_range(-5e-4..5e-4)));
            }
        }
    }
    let corner = PointCloud::from_positions(&pts);

    let mut clouds: Vec<PointCloud> = (0..4)
        .map(|k| {
            let k = k as f64;
            let pose = RigidTransform::exp(&Twist::new(0.0, 0.0, 0.01 * k, 0.04 * k, -0.02 * k, 0.0));
            corner.transformed(&pose.inverse())
        })
        .collect();
    let elsewhere = RigidTransform::from_translation(nalgebra::Vector3::new(30.0, 0.0, 0.0));
    clouds.insert(2, corner.transformed(&elsewhere));
    clouds
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let clouds = scans();
    let settings = PipelineSettings {
        voxel_size: 0.02,
        outliers: None,
        combinability_threshold: 0.5,
        pairwise: PairwiseParams::from_voxel_size(0.02),
        optimizer: OptimizerOptions::new(0.03, 0.25, 0),
        output: None,
    };

    let report = match run_on_clouds(&clouds, &settings, &NoopHooks) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("pipeline failed: {e}");
            std::process::exit(1);
        }
    };

    println!("Selected scans: {:?} of {}", report.selected, report.loaded);
    for (idx, pose) in report.selected.iter().zip(&report.poses) {
        let t = pose.translation();
        println!(
            "  scan {idx}: translation [{:.4}, {:.4}, {:.4}], angle {:.4}",
            t.x,
            t.y,
            t.z,
            pose.rotation_angle()
        );
    }
    if let Some(opt) = &report.optimization {
        println!(
            "Optimizer: {:?}, {} iterations, cost {:.3e} -> {:.3e}, pruned {:?}",
            opt.status, opt.iterations, opt.initial_cost, opt.final_cost, opt.pruned_edges
        );
    }
    match report.outcome {
        PipelineOutcome::Merged { points, .. } => println!("Merged cloud: {points} points"),
        PipelineOutcome::InsufficientData { combinable, loaded } => {
            println!("Insufficient data: {combinable} of {loaded} scans combinable")
        }
    }
}
