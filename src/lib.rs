//! Conversions between TSDF voxel maps and the messages of robotics middleware
//! and point-cloud libraries.
//!
//! * Transform messages into rigid [`transform::Transform`]s.
//! * Layer evaluation statistics into [`msg::VoxelEvaluationDetails`].
//! * TSDF layers into colored, normal-annotated [`pointcloud::SurfelCloud`]s,
//!   via a [`mesh::MeshGenerator`].

pub mod config;
pub mod conversions;
pub mod error;
pub mod io;
pub mod mesh;
pub mod metrics;
pub mod msg;
pub mod pointcloud;
pub mod transform;
pub mod tsdf;


pub use error::Error;
