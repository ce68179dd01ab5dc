use crate::correspondence::{find_correspondences, Correspondence};
use crate::reduce::tree_sum;
use crate::target::PreparedTarget;
use multiway_core::{InformationMatrix, PointCloud, RigidTransform};
use nalgebra::Vector6;

/// Information matrix of the alignment `transform` of `source` onto `target`.
///
/// For every inlier correspondence within `max_distance` the three rows of
/// `∂(exp(ξ) q)/∂ξ` at the matched target point `q = (x, y, z)` are added as
/// outer products:
///
/// ```text
/// [ 0,  z, -y, 1, 0, 0]
/// [-z,  0,  x, 0, 1, 0]
/// [ y, -x,  0, 0, 0, 1]
/// ```
///
/// The translation block is therefore `n·I` for `n` inliers, and the rotation
/// block grows with the spatial spread of the matched points. No inliers
/// yields the zero matrix.
pub fn information_matrix(
    source: &PointCloud,
    target: &PreparedTarget,
    max_distance: f32,
    transform: &RigidTransform,
) -> InformationMatrix {
    let corrs = find_correspondences(source, transform, target.tree(), max_distance);
    tree_sum(&corrs, &|c: &Correspondence| point_information(target.point(c.target_index)))
}

fn point_information([x, y, z]: [f64; 3]) -> InformationMatrix {
    let mut info = InformationMatrix::zeros();
    info.add_jacobian_row(&Vector6::new(0.0, z, -y, 1.0, 0.0, 0.0));
    info.add_jacobian_row(&Vector6::new(-z, 0.0, x, 0.0, 1.0, 0.0));
    info.add_jacobian_row(&Vector6::new(y, -x, 0.0, 0.0, 0.0, 1.0));
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use proptest::prelude::*;

    fn grid(n: usize, spacing: f32) -> PointCloud {
        let mut pts = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let e = ((i * 31 + j * 17) % 97) as f32 * 1e-6;
                pts.push([i as f32 * spacing, j as f32 * spacing, e]);
            }
        }
        PointCloud::from_positions(&pts)
    }

    #[test]
    fn translation_block_counts_inliers() {
        let cloud = grid(10, 0.1);
        let target = PreparedTarget::new(&cloud, 0.25, 30);
        let info = information_matrix(&cloud, &target, 0.05, &RigidTransform::identity());
        for i in 3..6 {
            assert_relative_eq!(info.get(i, i), 100.0);
        }
        assert!(info.is_positive_semidefinite(1e-9));
    }

    #[test]
    fn no_inliers_gives_zero() {
        let cloud = grid(5, 0.1);
        let target = PreparedTarget::new(&cloud, 0.25, 30);
        let far = RigidTransform::from_translation(Vector3::new(50.0, 0.0, 0.0));
        assert!(information_matrix(&cloud, &target, 0.05, &far).is_zero());
    }

    #[test]
    fn single_point_rows() {
        let info = point_information([1.0, 2.0, 3.0]);
        // (ω_x, ω_x) = z² + y²
        assert_relative_eq!(info.get(0, 0), 13.0);
        // (ω_x, ρ_y) = -z
        assert_relative_eq!(info.get(0, 4), -3.0);
        assert_relative_eq!(info.get(4, 0), -3.0);
        assert_relative_eq!(info.get(5, 5), 1.0);
    }

    proptest! {
        #[test]
        fn point_information_is_psd(x in -50.0f64..50.0, y in -50.0f64..50.0, z in -50.0f64..50.0) {
            let info = point_information([x, y, z]);
            prop_assert!(info.is_positive_semidefinite(1e-9));
            prop_assert_eq!(info.as_matrix(), &info.as_matrix().transpose());
        }
    }
}
