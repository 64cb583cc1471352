use nalgebra::Vector3;
use ndarray::Array2;

use crate::error::{check_attribute_len, Error};
use crate::io::Geometry;
use crate::transform::Transform;

/// Point with color and surface normal, laid out like the point-cloud
/// library's surfel point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfelPoint {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
    pub radius: f32,
    pub confidence: f32,
    pub curvature: f32,
}

impl Default for SurfelPoint {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            normal: Vector3::zeros(),
            r: 0,
            g: 0,
            b: 0,
            a: 255,
            radius: 0.0,
            confidence: 0.0,
            curvature: 0.0,
        }
    }
}

impl SurfelPoint {
    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Point cloud of surfels, organized as `height` rows of `width` points.
/// Unorganized clouds have `height == 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfelCloud {
    pub points: Vec<SurfelPoint>,
    pub width: u32,
    pub height: u32,
    /// True when no point holds non-finite values.
    pub is_dense: bool,
}

impl Default for SurfelCloud {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            width: 0,
            height: 1,
            is_dense: true,
        }
    }
}

/// Width of an unorganized cloud holding `len` points.
pub(crate) fn unorganized_width(len: usize) -> Result<u32, Error> {
    u32::try_from(len).map_err(|_| {
        Error::invalid_parameter(format!(
            "Cloud of {len} points does not fit a single row of at most {} points",
            u32::MAX
        ))
    })
}

impl SurfelCloud {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Appends a point, keeping the cloud unorganized.
    pub fn push(&mut self, point: SurfelPoint) -> Result<(), Error> {
        self.width = unorganized_width(self.points.len() + 1)?;
        self.height = 1;
        self.points.push(point);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SurfelPoint> {
        self.points.iter()
    }

    /// Builds an unorganized cloud from the geometry points and their
    /// optional normals and colors.
    pub fn from_geometry(geometry: &Geometry) -> Result<Self, Error> {
        let len = geometry.len_vertices();
        if let Some(normals) = &geometry.normals {
            check_attribute_len("normals", len, normals.nrows())?;
        }
        if let Some(colors) = &geometry.colors {
            check_attribute_len("colors", len, colors.nrows())?;
        }

        let mut cloud = Self::with_capacity(len);
        for i in 0..len {
            let mut point = SurfelPoint {
                position: Vector3::new(
                    geometry.points[(i, 0)],
                    geometry.points[(i, 1)],
                    geometry.points[(i, 2)],
                ),
                ..Default::default()
            };
            if let Some(normals) = &geometry.normals {
                point.normal = Vector3::new(normals[(i, 0)], normals[(i, 1)], normals[(i, 2)]);
            }
            if let Some(colors) = &geometry.colors {
                point.r = colors[(i, 0)];
                point.g = colors[(i, 1)];
                point.b = colors[(i, 2)];
            }
            cloud.push(point)?;
        }

        cloud.is_dense = cloud
            .iter()
            .all(|p| p.position.iter().chain(p.normal.iter()).all(|v| v.is_finite()));
        Ok(cloud)
    }
}

impl<'a> IntoIterator for &'a SurfelCloud {
    type Item = &'a SurfelPoint;
    type IntoIter = std::slice::Iter<'a, SurfelPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl std::ops::Mul<&SurfelCloud> for &Transform {
    type Output = SurfelCloud;
    fn mul(self, rhs: &SurfelCloud) -> SurfelCloud {
        SurfelCloud {
            points: rhs
                .iter()
                .map(|point| SurfelPoint {
                    position: self.transform_vector(&point.position),
                    normal: self.transform_normal(&point.normal),
                    ..*point
                })
                .collect(),
            width: rhs.width,
            height: rhs.height,
            is_dense: rhs.is_dense,
        }
    }
}

impl From<&SurfelCloud> for Geometry {
    fn from(cloud: &SurfelCloud) -> Geometry {
        let len = cloud.len();
        Geometry {
            points: Array2::from_shape_fn((len, 3), |(i, c)| cloud.points[i].position[c]),
            normals: Some(Array2::from_shape_fn((len, 3), |(i, c)| {
                cloud.points[i].normal[c]
            })),
            colors: Some(Array2::from_shape_fn((len, 3), |(i, c)| {
                cloud.points[i].rgb()[c]
            })),
            faces: None,
        }
    }
}
