use ndarray::prelude::*;

use crate::{
    error::{check_attribute_len, Error},
    mesh::Mesh,
};

/// Generic representation of attributes found in 3D model/object/geometry files.
pub struct Geometry {
    /// The 3D points. Shape is (Nx3).
    pub points: Array2<f32>,
    /// The RGB colors. Shape is (Nx3).
    pub colors: Option<Array2<u8>>,
    /// Per vertices normals. Shape is (Nx3)
    pub normals: Option<Array2<f32>>,
    /// The indices to conect vertices that make faces in the geometry.
    /// Shape is (Nx3), we always convert to triangles.
    pub faces: Option<Array2<usize>>,
}

impl Geometry {
    pub fn len_vertices(&self) -> usize {
        self.points.nrows()
    }

    pub fn len_faces(&self) -> usize {
        self.faces.as_ref().map_or(0, |faces| faces.nrows())
    }
}

impl TryFrom<&Mesh> for Geometry {
    type Error = Error;

    /// Fails with `AttributeMismatch` when normals or colors are present but
    /// not one per vertex.
    fn try_from(mesh: &Mesh) -> Result<Geometry, Error> {
        let len = mesh.len();
        if mesh.has_normals() {
            check_attribute_len("normals", len, mesh.normals.len())?;
        }
        if mesh.has_colors() {
            check_attribute_len("colors", len, mesh.colors.len())?;
        }

        Ok(Geometry {
            points: Array2::from_shape_fn((len, 3), |(i, c)| mesh.vertices[i][c]),
            normals: mesh
                .has_normals()
                .then(|| Array2::from_shape_fn((len, 3), |(i, c)| mesh.normals[i][c])),
            colors: mesh.has_colors().then(|| {
                Array2::from_shape_fn((len, 3), |(i, c)| {
                    let color = &mesh.colors[i];
                    [color.r, color.g, color.b][c]
                })
            }),
            faces: mesh.has_triangles().then(|| {
                Array2::from_shape_fn((mesh.indices.len() / 3, 3), |(i, c)| {
                    mesh.indices[i * 3 + c]
                })
            }),
        })
    }
}
