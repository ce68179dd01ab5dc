use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use multiway_core::{InformationMatrix, RigidTransform, Twist};
use multiway_posegraph::{optimize, OptimizerOptions, PoseGraph, PoseGraphEdge};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A loop of `n` poses with every pair connected, measurements exact and
/// initial poses perturbed.
fn dense_graph(n: usize, seed: u64) -> PoseGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let truth: Vec<RigidTransform> = (0..n)
        .map(|i| {
            let a = i as f64 / n as f64 * std::f64::consts::TAU;
            RigidTransform::exp(&Twist::new(0.0, 0.0, a, 3.0 * a.cos(), 3.0 * a.sin(), 0.0))
        })
        .collect();
    let mut graph = PoseGraph::new();
    for (i, pose) in truth.iter().enumerate() {
        let noise = if i == 0 {
            Twist::zeros()
        } else {
            Twist::from_fn(|_, _| rng.gen_range(-0.05..0.05))
        };
        graph.add_node(RigidTransform::exp(&noise).compose(pose));
    }
    let info = InformationMatrix::identity().scaled(1000.0);
    for s in 0..n {
        for t in s + 1..n {
            let z = truth[t].inverse().compose(&truth[s]);
            let edge = if t == s + 1 {
                PoseGraphEdge::odometry(s, t, z, info)
            } else {
                PoseGraphEdge::loop_closure(s, t, z, info)
            };
            graph.add_edge(edge);
        }
    }
    graph
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("posegraph_optimize");
    let options = OptimizerOptions::new(0.03, 0.25, 0);
    for n in [10, 30] {
        let graph = dense_graph(n, 42);
        group.bench_with_input(BenchmarkId::from_parameter(n), &graph, |b, graph| {
            b.iter(|| optimize(graph.clone(), &options))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_optimize);
criterion_main!(benches);
