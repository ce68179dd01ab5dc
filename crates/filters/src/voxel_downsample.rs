use hashbrown::HashMap;
use multiway_core::{Normals, PointCloud};

#[derive(Default, Clone, Copy)]
struct VoxelAccum {
    sum: [f64; 3],
    normal_sum: [f64; 3],
    n: usize,
}

/// Replaces every occupied voxel by the centroid of its points.
///
/// Normals, when present, are averaged and re-normalised. Output voxels are
/// ordered by grid key, so the result does not depend on hash order.
/// Non-finite points are dropped. A `voxel_size` that is not a positive
/// finite number leaves the cloud unchanged.
pub fn voxel_downsample(cloud: &PointCloud, voxel_size: f32) -> PointCloud {
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return cloud.clone();
    }
    if cloud.is_empty() {
        return PointCloud::new();
    }

    let inv = 1.0 / voxel_size as f64;
    let normals = cloud.normals.as_ref().filter(|n| n.len() == cloud.len());
    let mut bins: HashMap<(i64, i64, i64), VoxelAccum> = HashMap::new();

    for (i, p) in cloud.iter_positions().enumerate() {
        if !p.iter().all(|v| v.is_finite()) {
            continue;
        }
        let key = (
            (p[0] as f64 * inv).floor() as i64,
            (p[1] as f64 * inv).floor() as i64,
            (p[2] as f64 * inv).floor() as i64,
        );

        let entry = bins.entry(key).or_default();
        for (acc, v) in entry.sum.iter_mut().zip(p) {
            *acc += v as f64;
        }
        if let Some(n) = normals {
            for (acc, v) in entry.normal_sum.iter_mut().zip(n.get(i)) {
                *acc += v as f64;
            }
        }
        entry.n += 1;
    }

    let mut cells: Vec<((i64, i64, i64), VoxelAccum)> = bins.into_iter().collect();
    cells.sort_unstable_by_key(|(key, _)| *key);

    let positions: Vec<[f32; 3]> = cells
        .iter()
        .map(|(_, a)| {
            let d = a.n as f64;
            [
                (a.sum[0] / d) as f32,
                (a.sum[1] / d) as f32,
                (a.sum[2] / d) as f32,
            ]
        })
        .collect();
    let mut out = PointCloud::from_positions(&positions);

    if normals.is_some() {
        let averaged: Vec<[f32; 3]> = cells
            .iter()
            .map(|(_, a)| {
                let [x, y, z] = a.normal_sum;
                let len = (x * x + y * y + z * z).sqrt();
                if len > 1e-12 {
                    [(x / len) as f32, (y / len) as f32, (z / len) as f32]
                } else {
                    [0.0, 0.0, 1.0]
                }
            })
            .collect();
        out.normals = Some(Normals::from_vectors(&averaged));
    }
    out
}
