use multiway_core::{PointCloud, RigidTransform, Twist};
use multiway_registration::{register_clouds, PairwiseParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() {
    // Floor plus two walls, 2 m on a side, sampled every 5 cm.
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
    let target = PointCloud::from_positions(&pts);

    // The source is the same corner seen from a slightly different pose.
    let motion = RigidTransform::exp(&Twist::new(0.02, -0.01, 0.05, 0.08, -0.05, 0.03));
    let source = target.transformed(&motion.inverse());
    println!("Source: {} points, target: {} points", source.len(), target.len());

    let params = PairwiseParams::from_voxel_size(0.02);
    println!(
        "Coarse distance {:.3}, fine distance {:.3}",
        params.coarse_distance, params.fine_distance
    );

    match register_clouds(&source, &target, &params, &RigidTransform::identity()) {
        Ok(reg) => {
            let t = reg.transform.translation();
            println!("Fitness: {:.4}, inlier RMSE: {:.6}", reg.fitness, reg.inlier_rmse);
            println!("Translation: [{:.4}, {:.4}, {:.4}]", t.x, t.y, t.z);
            println!("Rotation angle: {:.5} rad", reg.transform.rotation_angle());
            println!("Recovered the applied motion: {}", reg.transform.approx_eq(&motion, 1e-3));
            println!("Information diagonal: {:?}", reg.information.as_matrix().diagonal().as_slice());
        }
        Err(e) => println!("Registration failed: {e}"),
    }
}
