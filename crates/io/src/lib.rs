#![forbid(unsafe_code)]

pub mod error;
pub mod files;
pub mod pcd;
pub mod ply;
mod scalar;

pub use error::{CloudIoError, Result};
pub use files::{load_cloud_directory, read_point_cloud, write_point_cloud, CloudFormat, LoadedCloud};
pub use pcd::{read_pcd, write_pcd, write_pcd_binary};
pub use ply::{read_ply, write_ply, write_ply_binary};
