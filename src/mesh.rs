use std::collections::HashMap;

use log::warn;
use nalgebra::Vector3;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde_derive::{Deserialize, Serialize};

use crate::{
    error::Error,
    tsdf::{BlockIndex, Color, TsdfLayer},
};

/// Triangle mesh with optional per-vertex attributes.
///
/// Attributes are either empty or have one entry per vertex. `indices` holds
/// three vertex indices per triangle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub colors: Vec<Color>,
    pub indices: Vec<usize>,
}

impl Mesh {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    pub fn has_triangles(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Replaces the normals by the ones computed from the triangles.
    pub fn compute_vertex_normals(&mut self) -> Result<(), Error> {
        if self.indices.len() % 3 != 0 {
            return Err(Error::invalid_parameter(format!(
                "Triangle indices must come in triples, got {}",
                self.indices.len()
            )));
        }
        if let Some(index) = self.indices.iter().find(|i| **i >= self.vertices.len()) {
            return Err(Error::invalid_parameter(format!(
                "Triangle index {index} out of {} vertices",
                self.vertices.len()
            )));
        }

        let faces = ArrayView2::from_shape((self.indices.len() / 3, 3), &self.indices)
            .map_err(|err| Error::invalid_parameter(err.to_string()))?;
        self.normals = compute_normals(&ArrayView1::from(&self.vertices[..]), &faces).to_vec();
        Ok(())
    }
}

/// Per vertex normals, the normalized average of the adjacent face normals.
/// Vertices without faces get a zero normal.
pub fn compute_normals(
    points: &ArrayView1<Vector3<f32>>,
    faces: &ArrayView2<usize>,
) -> Array1<Vector3<f32>> {
    let face_normals = faces
        .axis_iter(Axis(0))
        .map(|face| {
            let p0 = points[face[0]];
            let v0 = points[face[1]] - p0;
            let v1 = points[face[2]] - p0;

            let mut normal = v0.cross(&v1);
            let mag = normal.magnitude();
            if mag > 0.0 {
                normal /= mag;
            }

            normal
        })
        .collect::<Vec<_>>();

    let mut vertex_normals = Array1::<Vector3<f32>>::zeros(points.len());
    faces
        .axis_iter(Axis(0))
        .zip(face_normals)
        .for_each(|(face, face_normal)| {
            for f in [face[0], face[1], face[2]] {
                vertex_normals[f] += face_normal;
            }
        });

    vertex_normals.iter_mut().for_each(|normal| {
        let mag = normal.magnitude();
        if mag > 0.0 {
            *normal /= mag;
        }
    });

    vertex_normals
}

/// Meshes of a voxel layer, one per block.
#[derive(Debug, Clone)]
pub struct MeshLayer {
    block_size: f32,
    meshes: HashMap<BlockIndex, Mesh>,
}

impl MeshLayer {
    pub fn new(block_size: f32) -> Self {
        Self {
            block_size,
            meshes: HashMap::new(),
        }
    }

    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    pub fn num_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Gets the mesh of a block, creating an empty one if missing.
    pub fn allocate_mesh(&mut self, index: &BlockIndex) -> &mut Mesh {
        self.meshes.entry(*index).or_default()
    }

    pub fn mesh(&self, index: &BlockIndex) -> Option<&Mesh> {
        self.meshes.get(index)
    }

    pub fn remove_mesh(&mut self, index: &BlockIndex) -> Option<Mesh> {
        self.meshes.remove(index)
    }

    /// Concatenates all block meshes, in block index order, into a single mesh.
    ///
    /// Triangle indices are offset to the combined vertex array. An attribute is
    /// kept only if every non-empty block mesh carries exactly one entry per
    /// vertex, otherwise it would be paired with another block's vertices.
    pub fn combine_mesh(&self) -> Mesh {
        let mut indices: Vec<&BlockIndex> = self.meshes.keys().collect();
        indices.sort_by_key(|index| (index[0], index[1], index[2]));

        let parts: Vec<&Mesh> = indices
            .into_iter()
            .map(|index| &self.meshes[index])
            .filter(|mesh| !mesh.is_empty())
            .collect();

        let with_normals = parts
            .iter()
            .all(|mesh| mesh.normals.len() == mesh.vertices.len());
        let with_colors = parts
            .iter()
            .all(|mesh| mesh.colors.len() == mesh.vertices.len());
        if !with_normals && parts.iter().any(|mesh| mesh.has_normals()) {
            warn!("Dropping normals: not every block mesh has one per vertex");
        }
        if !with_colors && parts.iter().any(|mesh| mesh.has_colors()) {
            warn!("Dropping colors: not every block mesh has one per vertex");
        }

        let mut combined = Mesh::default();
        for mesh in parts {
            let offset = combined.vertices.len();
            combined.vertices.extend_from_slice(&mesh.vertices);
            if with_normals {
                combined.normals.extend_from_slice(&mesh.normals);
            }
            if with_colors {
                combined.colors.extend_from_slice(&mesh.colors);
            }
            combined
                .indices
                .extend(mesh.indices.iter().map(|index| index + offset));
        }

        combined
    }
}

/// Parameters handed to the mesh generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshIntegratorConfig {
    /// Copy voxel colors to the mesh vertices.
    pub use_color: bool,
    /// Voxels with less weight are treated as unknown.
    pub min_weight: f32,
}

impl Default for MeshIntegratorConfig {
    fn default() -> Self {
        Self {
            use_color: true,
            min_weight: 1e-4,
        }
    }
}

/// Surface extraction from a TSDF layer (e.g. marching cubes).
pub trait MeshGenerator {
    /// Extracts the surface of `layer` into `mesh_layer`.
    ///
    /// # Arguments
    ///
    /// * `layer` - The voxel grid.
    /// * `config` - Extraction parameters.
    /// * `only_updated_blocks` - Mesh only blocks flagged as updated.
    /// * `mesh_layer` - Receives one mesh per meshed block.
    fn generate_mesh(
        &self,
        layer: &TsdfLayer,
        config: &MeshIntegratorConfig,
        only_updated_blocks: bool,
        mesh_layer: &mut MeshLayer,
    ) -> Result<(), Error>;
}

impl<F> MeshGenerator for F
where
    F: Fn(&TsdfLayer, &MeshIntegratorConfig, bool, &mut MeshLayer) -> Result<(), Error>,
{
    fn generate_mesh(
        &self,
        layer: &TsdfLayer,
        config: &MeshIntegratorConfig,
        only_updated_blocks: bool,
        mesh_layer: &mut MeshLayer,
    ) -> Result<(), Error> {
        self(layer, config, only_updated_blocks, mesh_layer)
    }
}
