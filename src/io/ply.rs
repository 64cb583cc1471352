use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{debug, warn};
use ndarray::{Array2, Axis};
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use ply_rs::{parser, ply};

use super::Geometry;
use crate::error::{check_attribute_len, Error};

struct Vertex {
    point: [f32; 3],
    normal: [f32; 3],
    color: [u8; 3],
}

struct Face {
    vertex_index: Vec<usize>,
}

impl ply::PropertyAccess for Vertex {
    fn new() -> Self {
        Vertex {
            point: [0f32; 3],
            normal: [0f32; 3],
            color: [0u8; 3],
        }
    }
    fn set_property(&mut self, key: String, property: ply::Property) {
        match (key.as_ref(), property) {
            ("x", ply::Property::Float(v)) => self.point[0] = v,
            ("y", ply::Property::Float(v)) => self.point[1] = v,
            ("z", ply::Property::Float(v)) => self.point[2] = v,
            ("nx", ply::Property::Float(v)) => self.normal[0] = v,
            ("ny", ply::Property::Float(v)) => self.normal[1] = v,
            ("nz", ply::Property::Float(v)) => self.normal[2] = v,
            ("red", ply::Property::UChar(v)) => self.color[0] = v,
            ("green", ply::Property::UChar(v)) => self.color[1] = v,
            ("blue", ply::Property::UChar(v)) => self.color[2] = v,
            (key, _) => debug!("Ignoring vertex property `{key}`"),
        }
    }
}

impl ply::PropertyAccess for Face {
    fn new() -> Self {
        Face {
            vertex_index: Vec::new(),
        }
    }
    fn set_property(&mut self, key: String, property: ply::Property) {
        match (key.as_ref(), property) {
            ("vertex_index" | "vertex_indices", ply::Property::ListInt(vec)) => {
                self.vertex_index = vec.into_iter().map(|i| i as usize).collect()
            }
            ("vertex_index" | "vertex_indices", ply::Property::ListUInt(vec)) => {
                self.vertex_index = vec.into_iter().map(|i| i as usize).collect()
            }
            (key, _) => debug!("Ignoring face property `{key}`"),
        }
    }
}

/// Reads points, and when present normals, colors and triangles, from a PLY file.
pub fn read_ply<P>(filepath: P) -> Result<Geometry, Error>
where
    P: AsRef<Path>,
{
    let mut f = BufReader::new(File::open(filepath)?);

    let vertex_parser = parser::Parser::<Vertex>::new();
    let header = vertex_parser.read_header(&mut f)?;

    let mut point_array = None;
    let mut normal_array = None;
    let mut color_array = None;
    let mut face_array = None;
    for (_ignore_key, element) in &header.elements {
        match element.name.as_ref() {
            "vertex" => {
                let vertex_vec = vertex_parser.read_payload_for_element(&mut f, element, &header)?;

                point_array = Some(Array2::<f32>::from_shape_fn(
                    (vertex_vec.len(), 3),
                    |(i, c)| vertex_vec[i].point[c],
                ));

                if ["nx", "ny", "nz"]
                    .iter()
                    .all(|k| element.properties.contains_key(*k))
                {
                    normal_array = Some(Array2::<f32>::from_shape_fn(
                        (vertex_vec.len(), 3),
                        |(i, c)| vertex_vec[i].normal[c],
                    ));
                }

                if ["red", "green", "blue"]
                    .iter()
                    .all(|k| element.properties.contains_key(*k))
                {
                    color_array = Some(Array2::<u8>::from_shape_fn(
                        (vertex_vec.len(), 3),
                        |(i, c)| vertex_vec[i].color[c],
                    ));
                }
            }
            "face" => {
                let face_parser = parser::Parser::<Face>::new();
                let face_vec = face_parser.read_payload_for_element(&mut f, element, &header)?;
                if let Some(face) = face_vec.iter().find(|face| face.vertex_index.len() != 3) {
                    return Err(Error::Parser(format!(
                        "Only triangles are supported, got a face with {} vertices",
                        face.vertex_index.len()
                    )));
                }
                face_array = Some(Array2::<usize>::from_shape_fn(
                    (face_vec.len(), 3),
                    |(i, c)| face_vec[i].vertex_index[c],
                ));
            }
            name => warn!("Skipping unexpected PLY element `{name}`"),
        }
    }

    Ok(Geometry {
        points: point_array.ok_or_else(|| Error::Parser("PLY has no vertex element".into()))?,
        colors: color_array,
        normals: normal_array,
        faces: face_array,
    })
}

/// Writes a geometry as an ASCII PLY file.
pub fn write_ply<P>(filepath: P, geom: &Geometry) -> Result<(), Error>
where
    P: AsRef<Path>,
{
    let len = geom.len_vertices();
    if let Some(normals) = &geom.normals {
        check_attribute_len("normals", len, normals.nrows())?;
    }
    if let Some(colors) = &geom.colors {
        check_attribute_len("colors", len, colors.nrows())?;
    }

    let mut ply = Ply::<DefaultElement>::new();
    let mut vertex_element = ElementDef::new("vertex".to_string());
    ["x", "y", "z"].iter().for_each(|key| {
        vertex_element.properties.add(PropertyDef::new(
            key.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    });

    let mut vertex_array: Vec<DefaultElement> = geom
        .points
        .axis_iter(Axis(0))
        .map(|point| {
            let mut elem = DefaultElement::new();
            elem.insert("x".to_string(), Property::Float(point[0]));
            elem.insert("y".to_string(), Property::Float(point[1]));
            elem.insert("z".to_string(), Property::Float(point[2]));
            elem
        })
        .collect();

    if let Some(normals) = &geom.normals {
        ["nx", "ny", "nz"].iter().for_each(|key| {
            vertex_element.properties.add(PropertyDef::new(
                key.to_string(),
                PropertyType::Scalar(ScalarType::Float),
            ));
        });

        normals
            .axis_iter(Axis(0))
            .zip(vertex_array.iter_mut())
            .for_each(|(normal, vertex)| {
                vertex.insert("nx".to_string(), Property::Float(normal[0]));
                vertex.insert("ny".to_string(), Property::Float(normal[1]));
                vertex.insert("nz".to_string(), Property::Float(normal[2]));
            });
    }

    if let Some(colors) = &geom.colors {
        ["red", "green", "blue"].iter().for_each(|key| {
            vertex_element.properties.add(PropertyDef::new(
                key.to_string(),
                PropertyType::Scalar(ScalarType::UChar),
            ));
        });

        colors
            .axis_iter(Axis(0))
            .zip(vertex_array.iter_mut())
            .for_each(|(color, vertex)| {
                vertex.insert("red".to_string(), Property::UChar(color[0]));
                vertex.insert("green".to_string(), Property::UChar(color[1]));
                vertex.insert("blue".to_string(), Property::UChar(color[2]));
            });
    }

    ply.header.elements.add(vertex_element);
    ply.payload.insert("vertex".to_string(), vertex_array);

    if let Some(faces) = &geom.faces {
        let mut face_element = ElementDef::new("face".to_string());
        face_element.properties.add(PropertyDef::new(
            "vertex_indices".to_string(),
            PropertyType::List(ScalarType::UChar, ScalarType::Int),
        ));
        let face_array: Vec<DefaultElement> = faces
            .axis_iter(Axis(0))
            .map(|face| {
                let mut elem = DefaultElement::new();
                elem.insert(
                    "vertex_indices".to_string(),
                    Property::ListInt(face.iter().map(|f| *f as i32).collect()),
                );
                elem
            })
            .collect();

        ply.header.elements.add(face_element);
        ply.payload.insert("face".to_string(), face_array);
    }

    ply.make_consistent()
        .map_err(|err| Error::Parser(format!("{err:?}")))?;
    ply.header.encoding = Encoding::Ascii;

    let mut buf = BufWriter::new(File::create(filepath)?);
    Writer::new().write_ply(&mut buf, &mut ply)?;

    Ok(())
}
