use serde_derive::{Deserialize, Serialize};

/// Statistics of comparing a reconstructed voxel grid against a reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoxelEvaluationDetails {
    pub rmse: f64,
    pub max_error: f64,
    pub min_error: f64,
    pub num_evaluated_voxels: u64,
    pub num_ignored_voxels: u64,
    pub num_overlapping_voxels: u64,
    pub num_non_overlapping_voxels: u64,
}
