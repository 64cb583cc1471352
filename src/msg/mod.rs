//! Message types exchanged with the robotics middleware.
//!
//! These mirror the wire layout of the middleware's geometry and evaluation
//! messages: double precision, plain fields, no invariants. Conversions to and
//! from the library-side types live in [`crate::conversions`].

mod evaluation;
mod geometry;

pub use evaluation::VoxelEvaluationDetails;
pub use geometry::{Quaternion, Transform, Vector3};
