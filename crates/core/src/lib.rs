#![forbid(unsafe_code)]

pub mod cloud;
pub mod information;
pub mod point;
pub mod transform;

pub use cloud::{Normals, PointCloud};
pub use information::InformationMatrix;
pub use point::Point;
pub use transform::{skew, RigidTransform, Twist};
