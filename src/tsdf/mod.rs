//! Containers for TSDF voxel grids.
//!
//! The grid is stored as a sparse set of cubic blocks, each holding
//! `voxels_per_side^3` voxels. This is only the data layout shared with the
//! mesh generator and the evaluator; integrating depth into the grid is done
//! elsewhere.

mod layer;
mod voxel;

pub use layer::{Block, BlockIndex, GlobalIndex, Layer, LocalIndex};
pub use voxel::{Color, TsdfVoxel, MIN_OBSERVED_WEIGHT};

/// Layer of truncated signed distance voxels.
pub type TsdfLayer = Layer<TsdfVoxel>;
