use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::{error::Error, mesh::MeshIntegratorConfig, metrics::EvaluationMode};

/// Options for flattening a mesh into a surfel cloud.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfelCloudConfig {
    /// Compute vertex normals from the triangles when the mesh has none,
    /// instead of failing.
    pub recompute_missing_normals: bool,
}

/// Settings of all conversions, every field is optional in the JSON form.
///
/// ```json
/// {
///     "mesh": { "use_color": true, "min_weight": 0.0001 },
///     "surfel": { "recompute_missing_normals": false },
///     "evaluation_mode": "IgnoreErrorBehindTestSurface"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub mesh: MeshIntegratorConfig,
    pub surfel: SurfelCloudConfig,
    /// Read by [`crate::metrics::evaluate_layers_with_config`].
    pub evaluation_mode: EvaluationMode,
}

impl ConversionConfig {
    /// Loads the configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let buffer = std::io::BufReader::new(std::fs::File::open(path)?);
        Ok(serde_json::from_reader(buffer)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}
