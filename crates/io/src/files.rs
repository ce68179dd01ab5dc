use crate::error::{CloudIoError, Result};
use crate::{read_pcd, read_ply, write_pcd_binary, write_ply_binary};
use log::{debug, warn};
use multiway_core::PointCloud;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudFormat {
    Pcd,
    Ply,
}

impl CloudFormat {
    /// Format implied by the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pcd" => Some(CloudFormat::Pcd),
            "ply" => Some(CloudFormat::Ply),
            _ => None,
        }
    }
}

/// A cloud together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedCloud {
    pub path: PathBuf,
    pub cloud: PointCloud,
}

pub fn read_point_cloud(path: impl AsRef<Path>) -> Result<PointCloud> {
    let path = path.as_ref();
    let format = CloudFormat::from_path(path)
        .ok_or_else(|| CloudIoError::UnsupportedExtension(path.to_path_buf()))?;
    let result = match format {
        CloudFormat::Pcd => read_pcd(path),
        CloudFormat::Ply => read_ply(path),
    };
    result.map_err(|source| CloudIoError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `cloud` in the binary flavour of the format named by the extension.
pub fn write_point_cloud(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<()> {
    let path = path.as_ref();
    let format = CloudFormat::from_path(path)
        .ok_or_else(|| CloudIoError::UnsupportedExtension(path.to_path_buf()))?;
    let result = match format {
        CloudFormat::Pcd => write_pcd_binary(path, cloud),
        CloudFormat::Ply => write_ply_binary(path, cloud),
    };
    result.map_err(|source| CloudIoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads every `.pcd` / `.ply` file directly inside `dir`, ordered by file
/// name.
///
/// Files that fail to parse are logged and skipped. Only a directory that
/// cannot be listed is an error; an empty result is left to the caller.
pub fn load_cloud_directory(dir: impl AsRef<Path>) -> Result<Vec<LoadedCloud>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|source| CloudIoError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && CloudFormat::from_path(p).is_some())
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut clouds = Vec::with_capacity(paths.len());
    for path in paths {
        match read_point_cloud(&path) {
            Ok(cloud) => {
                debug!("loaded {} ({} points)", path.display(), cloud.len());
                clouds.push(LoadedCloud { path, cloud });
            }
            Err(e) => warn!("skipping unreadable cloud: {e}"),
        }
    }
    Ok(clouds)
}
