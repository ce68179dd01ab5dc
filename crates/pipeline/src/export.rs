use log::info;
use multiway_core::PointCloud;
use multiway_io::{write_point_cloud, CloudIoError};
use multiway_posegraph::PoseGraph;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("pose graph has {nodes} nodes but {clouds} clouds were given")]
    CountMismatch { nodes: usize, clouds: usize },

    #[error(transparent)]
    Io(#[from] CloudIoError),
}

/// Moves cloud `i` by node `i`'s pose and concatenates the results.
/// Normals are rotated along and kept only if every cloud has them.
pub fn merge_clouds(clouds: &[PointCloud], graph: &PoseGraph) -> Result<PointCloud, ExportError> {
    if clouds.len() != graph.num_nodes() {
        return Err(ExportError::CountMismatch {
            nodes: graph.num_nodes(),
            clouds: clouds.len(),
        });
    }
    let moved: Vec<PointCloud> = clouds
        .iter()
        .zip(&graph.nodes)
        .map(|(cloud, node)| cloud.transformed(&node.pose))
        .collect();
    Ok(PointCloud::concat(&moved))
}

/// [`merge_clouds`], then writes the result to `path`. Returns the number
/// of points written.
pub fn export(clouds: &[PointCloud], graph: &PoseGraph, path: impl AsRef<Path>) -> Result<usize, ExportError> {
    let path = path.as_ref();
    let merged = merge_clouds(clouds, graph)?;
    write_point_cloud(path, &merged)?;
    info!("wrote {} points to {}", merged.len(), path.display());
    Ok(merged.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use multiway_core::{Normals, RigidTransform};
    use multiway_io::read_point_cloud;
    use nalgebra::Vector3;

    fn two_clouds() -> Vec<PointCloud> {
        let a = PointCloud::from_positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]])
            .with_normals(Normals::from_vectors(&[[0.0, 0.0, 1.0], [0.0, 0.0, 1.0]]));
        let b = PointCloud::from_positions(&[[0.0, 1.0, 0.0]])
            .with_normals(Normals::from_vectors(&[[1.0, 0.0, 0.0]]));
        vec![a, b]
    }

    fn graph() -> PoseGraph {
        PoseGraph::from_poses([
            RigidTransform::identity(),
            RigidTransform::from_axis_angle(&Vector3::z(), std::f64::consts::FRAC_PI_2, Vector3::new(2.0, 0.0, 0.0)),
        ])
    }

    #[test]
    fn merge_applies_poses_and_keeps_every_point() {
        let merged = merge_clouds(&two_clouds(), &graph()).unwrap();
        assert_eq!(merged.len(), 3);
        let p = merged.position(2);
        assert_relative_eq!(p[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(p[1], 0.0, epsilon = 1e-6);
        let n = merged.normals.as_ref().unwrap().get(2);
        assert_relative_eq!(n[1], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let clouds = two_clouds();
        let err = merge_clouds(&clouds[..1], &graph()).unwrap_err();
        assert!(matches!(err, ExportError::CountMismatch { nodes: 2, clouds: 1 }));
    }

    #[test]
    fn export_writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.ply");
        let written = export(&two_clouds(), &graph(), &path).unwrap();
        assert_eq!(written, 3);
        let back = read_point_cloud(&path).unwrap();
        assert_eq!(back.len(), 3);
        assert!(back.has_normals());
    }

    #[test]
    fn unknown_extension_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = export(&two_clouds(), &graph(), dir.path().join("merged.xyz")).unwrap_err();
        assert!(matches!(err, ExportError::Io(CloudIoError::UnsupportedExtension(_))));
    }
}
