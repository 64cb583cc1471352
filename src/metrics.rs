use log::debug;
use serde_derive::{Deserialize, Serialize};

use crate::{
    config::ConversionConfig,
    error::Error,
    tsdf::{TsdfLayer, TsdfVoxel},
};

/// Statistics of comparing a test voxel layer against a ground truth layer.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelEvaluationDetails {
    /// Root mean squared distance error over the evaluated voxels.
    pub rmse: f32,
    pub max_error: f32,
    pub min_error: f32,
    pub num_evaluated_voxels: usize,
    pub num_ignored_voxels: usize,
    /// Voxels observed in both layers, evaluated or ignored.
    pub num_overlapping_voxels: usize,
    /// Ground truth voxels without an observed counterpart.
    pub num_non_overlapping_voxels: usize,
}

impl Default for VoxelEvaluationDetails {
    fn default() -> Self {
        Self {
            rmse: 0.0,
            max_error: 0.0,
            min_error: 0.0,
            num_evaluated_voxels: 0,
            num_ignored_voxels: 0,
            num_overlapping_voxels: 0,
            num_non_overlapping_voxels: 0,
        }
    }
}

impl std::fmt::Display for VoxelEvaluationDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rmse: {:.5}, error: [{:.5}, {:.5}], evaluated: {}, ignored: {}, overlapping: {}, non-overlapping: {}",
            self.rmse,
            self.min_error,
            self.max_error,
            self.num_evaluated_voxels,
            self.num_ignored_voxels,
            self.num_overlapping_voxels,
            self.num_non_overlapping_voxels
        )
    }
}

/// Which overlapping voxels contribute to the error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvaluationMode {
    /// Every overlapping voxel.
    #[default]
    Evaluate,
    /// Skip voxels behind the test layer's surface.
    IgnoreErrorBehindTestSurface,
    /// Skip voxels behind the ground truth surface.
    IgnoreErrorBehindGtSurface,
    /// Skip voxels behind either surface.
    IgnoreErrorBehindAllSurfaces,
}

enum VoxelEvaluation {
    Evaluated(f32),
    Ignored,
    NoOverlap,
}

fn evaluate_voxel(gt: &TsdfVoxel, test: &TsdfVoxel, mode: EvaluationMode) -> VoxelEvaluation {
    if !gt.is_observed() || !test.is_observed() {
        return VoxelEvaluation::NoOverlap;
    }

    let ignored = match mode {
        EvaluationMode::Evaluate => false,
        EvaluationMode::IgnoreErrorBehindTestSurface => test.distance < 0.0,
        EvaluationMode::IgnoreErrorBehindGtSurface => gt.distance < 0.0,
        EvaluationMode::IgnoreErrorBehindAllSurfaces => test.distance < 0.0 || gt.distance < 0.0,
    };
    if ignored {
        VoxelEvaluation::Ignored
    } else {
        VoxelEvaluation::Evaluated(test.distance - gt.distance)
    }
}

/// Compares the signed distances of `test` against `gt`, voxel by voxel.
///
/// Every voxel of every allocated ground truth block is looked up in the test
/// layer at the same global index. Missing or unobserved voxels on either side
/// count as non-overlapping.
///
/// # Arguments
///
/// * `gt` - The reference layer.
/// * `test` - The layer under evaluation, must share `gt`'s voxel layout.
/// * `mode` - Which overlapping voxels are ignored.
pub fn evaluate_layers(
    gt: &TsdfLayer,
    test: &TsdfLayer,
    mode: EvaluationMode,
) -> Result<VoxelEvaluationDetails, Error> {
    if !gt.has_same_geometry(test) {
        return Err(Error::invalid_parameter(format!(
            "Layers differ: voxel size {} vs {}, voxels per side {} vs {}",
            gt.voxel_size(),
            test.voxel_size(),
            gt.voxels_per_side(),
            test.voxels_per_side()
        )));
    }

    let mut details = VoxelEvaluationDetails {
        max_error: f32::MIN,
        min_error: f32::MAX,
        ..Default::default()
    };
    let mut total_squared_error = 0.0f64;

    for (block_index, block) in gt.blocks() {
        let test_block = test.block(block_index);
        for (local, gt_voxel) in block.iter() {
            let evaluation = match test_block {
                Some(test_block) => evaluate_voxel(gt_voxel, test_block.voxel(&local), mode),
                None => VoxelEvaluation::NoOverlap,
            };

            match evaluation {
                VoxelEvaluation::Evaluated(error) => {
                    total_squared_error += (error as f64) * (error as f64);
                    details.max_error = details.max_error.max(error);
                    details.min_error = details.min_error.min(error);
                    details.num_evaluated_voxels += 1;
                    details.num_overlapping_voxels += 1;
                }
                VoxelEvaluation::Ignored => {
                    details.num_ignored_voxels += 1;
                    details.num_overlapping_voxels += 1;
                }
                VoxelEvaluation::NoOverlap => {
                    details.num_non_overlapping_voxels += 1;
                }
            }
        }
    }

    if details.num_evaluated_voxels > 0 {
        details.rmse = (total_squared_error / details.num_evaluated_voxels as f64).sqrt() as f32;
    } else {
        details.max_error = 0.0;
        details.min_error = 0.0;
    }

    debug!("Layer evaluation: {details}");
    Ok(details)
}

/// [`evaluate_layers`] with the evaluation mode of a loaded configuration.
pub fn evaluate_layers_with_config(
    gt: &TsdfLayer,
    test: &TsdfLayer,
    config: &ConversionConfig,
) -> Result<VoxelEvaluationDetails, Error> {
    evaluate_layers(gt, test, config.evaluation_mode)
}
