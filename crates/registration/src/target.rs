use crate::error::{RegistrationError, Result};
use multiway_core::{Normals, PointCloud};
use multiway_normals::with_estimated_normals;
use multiway_spatial::KdTree;

/// A registration target: cloud, per-point normals and a kd-tree, built once
/// and reused across every pair that aligns onto this cloud.
#[derive(Debug, Clone)]
pub struct PreparedTarget {
    cloud: PointCloud,
    tree: KdTree,
}

impl PreparedTarget {
    /// Estimates normals (hybrid radius / `max_nn` search) only when `cloud`
    /// has none.
    pub fn new(cloud: &PointCloud, normal_radius: f32, normal_max_nn: usize) -> Self {
        let cloud = with_estimated_normals(cloud, normal_radius, normal_max_nn);
        let tree = KdTree::build(&cloud);
        Self { cloud, tree }
    }

    /// Uses the normals already attached to `cloud`.
    pub fn with_normals(cloud: PointCloud) -> Result<Self> {
        let normals = cloud.normals.as_ref().map_or(0, Normals::len);
        if normals != cloud.len() {
            return Err(RegistrationError::NormalsMismatch {
                normals,
                points: cloud.len(),
            });
        }
        let tree = KdTree::build(&cloud);
        Ok(Self { cloud, tree })
    }

    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    pub fn tree(&self) -> &KdTree {
        &self.tree
    }

    pub fn point(&self, i: usize) -> [f64; 3] {
        let p = self.cloud.position(i);
        [p[0] as f64, p[1] as f64, p[2] as f64]
    }

    pub fn normal(&self, i: usize) -> [f64; 3] {
        match self.cloud.normals.as_ref() {
            Some(n) => {
                let v = n.get(i);
                [v[0] as f64, v[1] as f64, v[2] as f64]
            }
            None => [0.0, 0.0, 1.0],
        }
    }

    pub fn len(&self) -> usize {
        self.cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_missing_normals() {
        let pts: Vec<[f32; 3]> = (0..25)
            .map(|i| [(i % 5) as f32 * 0.02, (i / 5) as f32 * 0.02, i as f32 * 1e-7])
            .collect();
        let target = PreparedTarget::new(&PointCloud::from_positions(&pts), 0.1, 30);
        assert!(target.cloud().has_normals());
        assert!(target.normal(12)[2].abs() > 0.99);
        assert_eq!(target.tree().len(), 25);
    }

    #[test]
    fn rejects_mismatched_normals() {
        let mut cloud = PointCloud::from_xyz(vec![0.0, 1.0], vec![0.0; 2], vec![0.0; 2]);
        assert_eq!(
            PreparedTarget::with_normals(cloud.clone()).unwrap_err(),
            RegistrationError::NormalsMismatch { normals: 0, points: 2 }
        );
        cloud.normals = Some(Normals::from_vectors(&[[0.0, 0.0, 1.0]]));
        assert!(PreparedTarget::with_normals(cloud).is_err());
    }
}
