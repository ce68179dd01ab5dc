#![forbid(unsafe_code)]

pub mod correspondence;
pub mod error;
pub mod icp;
pub mod information;
pub mod pairwise;
pub mod reduce;
pub mod target;

pub use correspondence::{find_correspondences, Correspondence};
pub use error::{RegistrationError, Result, Stage};
pub use icp::{icp_point_to_plane, IcpCriteria, IcpResult};
pub use information::information_matrix;
pub use pairwise::{register_clouds, register_pair, PairwiseParams, PairwiseRegistration};
pub use reduce::tree_sum;
pub use target::PreparedTarget;
