use multiway_core::{Normals, PointCloud};
use multiway_spatial::KdTree;
use rayon::prelude::*;

/// Search radius used when a registration target arrives without normals.
pub const DEFAULT_RADIUS: f32 = 0.1;
/// Neighbour cap paired with [`DEFAULT_RADIUS`].
pub const DEFAULT_MAX_NN: usize = 30;
/// Assigned to points whose neighbourhood is too small for a plane fit.
pub const FALLBACK_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

const MIN_NEIGHBOURS: usize = 3;

/// PCA normals from the `k` nearest neighbours, oriented toward the origin.
pub fn estimate_normals(cloud: &PointCloud, k: usize) -> Normals {
    estimate_normals_with_viewpoint(cloud, k, [0.0, 0.0, 0.0])
}

/// PCA normals from the `k` nearest neighbours, oriented toward `viewpoint`.
pub fn estimate_normals_with_viewpoint(cloud: &PointCloud, k: usize, viewpoint: [f32; 3]) -> Normals {
    if k == 0 {
        return Normals::from_vectors(&[]);
    }
    estimate_with(cloud, viewpoint, |tree, p| tree.knn_indices(p, k))
}

/// PCA normals over the neighbours within `radius`, capped at the `max_nn`
/// closest. Points with fewer than three neighbours get [`FALLBACK_NORMAL`].
pub fn estimate_normals_hybrid(cloud: &PointCloud, radius: f32, max_nn: usize) -> Normals {
    estimate_with(cloud, [0.0, 0.0, 0.0], |tree, p| {
        tree.hybrid_search(p, radius, max_nn)
    })
}

/// Returns `cloud` with normals, estimating them with the hybrid search only
/// when the cloud does not already carry a full set.
pub fn with_estimated_normals(cloud: &PointCloud, radius: f32, max_nn: usize) -> PointCloud {
    if cloud.has_normals() {
        return cloud.clone();
    }
    let normals = estimate_normals_hybrid(cloud, radius, max_nn);
    cloud.clone().with_normals(normals)
}

fn estimate_with<F>(cloud: &PointCloud, viewpoint: [f32; 3], neighbours: F) -> Normals
where
    F: Fn(&KdTree, &[f32; 3]) -> Vec<usize> + Sync,
{
    if cloud.is_empty() {
        return Normals::from_vectors(&[]);
    }

    let points: Vec<[f32; 3]> = cloud.iter_positions().collect();
    let tree = KdTree::from_positions(&points);

    let normals: Vec<[f32; 3]> = points
        .par_iter()
        .map(|p| {
            let idx = neighbours(&tree, p);
            if idx.len() < MIN_NEIGHBOURS {
                return FALLBACK_NORMAL;
            }
            let n = plane_normal(&points, &idx);
            orient_toward(n, p, &viewpoint)
        })
        .collect();

    Normals::from_vectors(&normals)
}

/// Normal of the least-squares plane through the selected points.
fn plane_normal(points: &[[f32; 3]], idx: &[usize]) -> [f32; 3] {
    let count = idx.len() as f64;
    let mut c = [0.0f64; 3];
    for &i in idx {
        for (acc, v) in c.iter_mut().zip(points[i]) {
            *acc += v as f64;
        }
    }
    for v in &mut c {
        *v /= count;
    }

    // Upper triangle: xx, xy, xz, yy, yz, zz.
    let mut cov = [0.0f64; 6];
    for &i in idx {
        let d = [
            points[i][0] as f64 - c[0],
            points[i][1] as f64 - c[1],
            points[i][2] as f64 - c[2],
        ];
        cov[0] += d[0] * d[0];
        cov[1] += d[0] * d[1];
        cov[2] += d[0] * d[2];
        cov[3] += d[1] * d[1];
        cov[4] += d[1] * d[2];
        cov[5] += d[2] * d[2];
    }

    smallest_eigenvector(&cov).unwrap_or(FALLBACK_NORMAL)
}

fn orient_toward(n: [f32; 3], p: &[f32; 3], viewpoint: &[f32; 3]) -> [f32; 3] {
    let dot: f32 = (0..3).map(|i| n[i] * (viewpoint[i] - p[i])).sum();
    if dot < 0.0 {
        [-n[0], -n[1], -n[2]]
    } else {
        n
    }
}

/// Unit eigenvector of the smallest eigenvalue of a symmetric 3x3 matrix
/// given as its upper triangle.
///
/// Eigenvalues come from the trigonometric closed form; the eigenvector is
/// the largest cross product of two rows of `A - λI`. Returns `None` when the
/// matrix is (close to) a multiple of the identity.
fn smallest_eigenvector(a: &[f64; 6]) -> Option<[f32; 3]> {
    let [a00, a01, a02, a11, a12, a22] = *a;
    let m = (a00 + a11 + a22) / 3.0;
    let (b00, b11, b22) = (a00 - m, a11 - m, a22 - m);
    let p = ((b00 * b00 + b11 * b11 + b22 * b22 + 2.0 * (a01 * a01 + a02 * a02 + a12 * a12)) / 6.0)
        .max(0.0);
    if p < 1e-30 {
        return None;
    }

    let half_det = (b00 * (b11 * b22 - a12 * a12) - a01 * (a01 * b22 - a12 * a02)
        + a02 * (a01 * a12 - b11 * a02))
        / 2.0;
    let phi = (half_det / (p * p.sqrt())).clamp(-1.0, 1.0).acos() / 3.0;
    let lambda = m + 2.0 * p.sqrt() * (phi + 2.0 * std::f64::consts::FRAC_PI_3).cos();

    let rows = [
        [a00 - lambda, a01, a02],
        [a01, a11 - lambda, a12],
        [a02, a12, a22 - lambda],
    ];
    let cross = |u: &[f64; 3], v: &[f64; 3]| {
        [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ]
    };
    let norm2 = |v: &[f64; 3]| v[0] * v[0] + v[1] * v[1] + v[2] * v[2];

    let best = [
        cross(&rows[0], &rows[1]),
        cross(&rows[0], &rows[2]),
        cross(&rows[1], &rows[2]),
    ]
    .into_iter()
    .max_by(|u, v| norm2(u).total_cmp(&norm2(v)))?;

    let len2 = norm2(&best);
    if len2 < 1e-30 {
        return None;
    }
    let inv = 1.0 / len2.sqrt();
    Some([
        (best[0] * inv) as f32,
        (best[1] * inv) as f32,
        (best[2] * inv) as f32,
    ])
}
