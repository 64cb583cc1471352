//! Conversions between the voxel map types and the middleware/point-cloud types.

use itertools::izip;
use log::{debug, warn};
use nalgebra::{Quaternion, Vector3};

use crate::{
    config::ConversionConfig,
    error::{check_attribute_len, Error},
    mesh::{Mesh, MeshGenerator, MeshLayer},
    metrics::VoxelEvaluationDetails,
    msg,
    pointcloud::{unorganized_width, SurfelCloud, SurfelPoint},
    transform::Transform,
    tsdf::TsdfLayer,
};

/// Quaternions farther than this from unit norm are reported before normalizing.
const UNIT_NORM_TOLERANCE: f64 = 1e-3;

/// Converts a single transform message.
///
/// The rotation is normalized in `f64` before narrowing to `f32`, so any
/// finite, non-zero quaternion gives a rigid transform. Fails with
/// `InvalidParameter` when the rotation has zero norm or non-finite components.
pub fn transform_from_msg(transform: &msg::Transform) -> Result<Transform, Error> {
    let rotation = &transform.rotation;
    let components = [rotation.w, rotation.x, rotation.y, rotation.z];
    if components.iter().any(|c| !c.is_finite()) {
        return Err(Error::invalid_parameter(format!(
            "Rotation quaternion has non-finite components {components:?}"
        )));
    }

    // Divided by the largest magnitude first, so squaring cannot overflow.
    let scale = components.iter().fold(0.0_f64, |acc, c| acc.max(c.abs()));
    let scaled_norm = if scale > 0.0 {
        components
            .iter()
            .map(|c| (c / scale).powi(2))
            .sum::<f64>()
            .sqrt()
    } else {
        0.0
    };
    let norm = scale * scaled_norm;
    if norm <= f64::EPSILON {
        return Err(Error::invalid_parameter(format!(
            "Rotation quaternion has invalid norm {norm}"
        )));
    }
    if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
        warn!("Normalizing rotation quaternion with norm {norm}");
    }

    let [w, x, y, z] = components.map(|c| (c / scale / scaled_norm) as f32);
    let translation = &transform.translation;
    Ok(Transform::new(
        &Vector3::new(
            translation.x as f32,
            translation.y as f32,
            translation.z as f32,
        ),
        &Quaternion::new(w, x, y, z),
    ))
}

/// Appends one transform per message to `transforms`, keeping message order.
///
/// `transforms` is not cleared. On error, the transforms converted before the
/// offending message stay appended.
///
/// # Arguments
///
/// * `msgs` - Transform messages.
/// * `transforms` - Output, extended in place.
pub fn transforms_from_msgs(
    msgs: &[msg::Transform],
    transforms: &mut Vec<Transform>,
) -> Result<(), Error> {
    transforms.reserve(msgs.len());
    for (i, transform_msg) in msgs.iter().enumerate() {
        let transform = transform_from_msg(transform_msg).map_err(|err| match err {
            Error::InvalidParameter(reason) => {
                Error::InvalidParameter(format!("Transform message {i}: {reason}"))
            }
            err => err,
        })?;
        transforms.push(transform);
    }

    debug!("Converted {} transform messages", msgs.len());
    Ok(())
}

impl From<&Transform> for msg::Transform {
    fn from(transform: &Transform) -> Self {
        let translation = transform.translation();
        let rotation = transform.rotation();
        msg::Transform {
            translation: msg::Vector3::new(
                translation[0] as f64,
                translation[1] as f64,
                translation[2] as f64,
            ),
            rotation: msg::Quaternion::new(
                rotation.i as f64,
                rotation.j as f64,
                rotation.k as f64,
                rotation.w as f64,
            ),
        }
    }
}

pub fn transforms_to_msgs(transforms: &[Transform]) -> Vec<msg::Transform> {
    transforms.iter().map(msg::Transform::from).collect()
}

impl From<&VoxelEvaluationDetails> for msg::VoxelEvaluationDetails {
    fn from(details: &VoxelEvaluationDetails) -> Self {
        Self {
            rmse: details.rmse as f64,
            max_error: details.max_error as f64,
            min_error: details.min_error as f64,
            num_evaluated_voxels: details.num_evaluated_voxels as u64,
            num_ignored_voxels: details.num_ignored_voxels as u64,
            num_overlapping_voxels: details.num_overlapping_voxels as u64,
            num_non_overlapping_voxels: details.num_non_overlapping_voxels as u64,
        }
    }
}

impl From<&msg::VoxelEvaluationDetails> for VoxelEvaluationDetails {
    fn from(details: &msg::VoxelEvaluationDetails) -> Self {
        Self {
            rmse: details.rmse as f32,
            max_error: details.max_error as f32,
            min_error: details.min_error as f32,
            num_evaluated_voxels: details.num_evaluated_voxels as usize,
            num_ignored_voxels: details.num_ignored_voxels as usize,
            num_overlapping_voxels: details.num_overlapping_voxels as usize,
            num_non_overlapping_voxels: details.num_non_overlapping_voxels as usize,
        }
    }
}

/// Replaces the content of `msgs` by one message per evaluation result, in order.
pub fn evaluation_details_to_msgs(
    details: &[VoxelEvaluationDetails],
    msgs: &mut Vec<msg::VoxelEvaluationDetails>,
) {
    msgs.clear();
    msgs.extend(details.iter().map(msg::VoxelEvaluationDetails::from));
}

/// Appends one surfel per mesh vertex to `cloud`.
///
/// Positions and normals are copied, colors too when the mesh has them.
/// The cloud is left unorganized and dense. A mesh with vertices but no
/// normals fails with `MissingNormals` and leaves `cloud` untouched, as do
/// misaligned attributes and clouds too large for a `u32` width.
pub fn mesh_to_surfel_cloud(mesh: &Mesh, cloud: &mut SurfelCloud) -> Result<(), Error> {
    let num_vertices = mesh.len();
    if num_vertices > 0 && !mesh.has_normals() {
        return Err(Error::MissingNormals(num_vertices));
    }
    check_attribute_len("normals", num_vertices, mesh.normals.len())?;
    if mesh.has_colors() {
        check_attribute_len("colors", num_vertices, mesh.colors.len())?;
    } else if num_vertices > 0 {
        warn!("Mesh has no colors, surfels keep the default color");
    }
    let width = unorganized_width(cloud.len() + num_vertices)?;

    cloud.points.reserve(num_vertices);
    for (vertex, normal) in izip!(mesh.vertices.iter(), mesh.normals.iter()) {
        cloud.points.push(SurfelPoint {
            position: *vertex,
            normal: *normal,
            ..Default::default()
        });
    }
    if mesh.has_colors() {
        let first = cloud.points.len() - num_vertices;
        for (point, color) in izip!(cloud.points[first..].iter_mut(), mesh.colors.iter()) {
            point.r = color.r;
            point.g = color.g;
            point.b = color.b;
        }
    }

    cloud.is_dense = true;
    cloud.width = width;
    cloud.height = 1;
    Ok(())
}

/// Meshes a TSDF layer and appends the mesh vertices to `cloud` as surfels.
///
/// The whole layer is meshed (not only updated blocks) and the updated flags
/// are left as they are. The block meshes are combined into one mesh before
/// flattening, see [`mesh_to_surfel_cloud`].
///
/// # Arguments
///
/// * `layer` - The voxel grid.
/// * `generator` - Surface extraction routine.
/// * `config` - Mesh and surfel options.
/// * `cloud` - Output, extended in place.
pub fn tsdf_to_surfel_cloud<G>(
    layer: &TsdfLayer,
    generator: &G,
    config: &ConversionConfig,
    cloud: &mut SurfelCloud,
) -> Result<(), Error>
where
    G: MeshGenerator + ?Sized,
{
    const ONLY_MESH_UPDATED_BLOCKS: bool = false;

    let mut mesh_layer = MeshLayer::new(layer.block_size());
    generator.generate_mesh(layer, &config.mesh, ONLY_MESH_UPDATED_BLOCKS, &mut mesh_layer)?;

    let mut mesh = mesh_layer.combine_mesh();
    debug!(
        "Meshed {} blocks into {} vertices",
        mesh_layer.num_meshes(),
        mesh.len()
    );

    if !mesh.is_empty() && !mesh.has_normals() && config.surfel.recompute_missing_normals {
        debug!("Computing missing vertex normals");
        mesh.compute_vertex_normals()?;
    }

    mesh_to_surfel_cloud(&mesh, cloud)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use itertools::izip;
    use nalgebra::{UnitQuaternion, Vector3};
    use rstest::rstest;

    use super::*;
    use crate::{
        mesh::MeshIntegratorConfig,
        unit_test::{sample_plane_layer, sample_quad_mesh, voxel_point_generator},
    };

    fn transform_msg(translation: [f64; 3], rotation: [f64; 4]) -> msg::Transform {
        msg::Transform {
            translation: msg::Vector3::new(translation[0], translation[1], translation[2]),
            rotation: msg::Quaternion::new(rotation[0], rotation[1], rotation[2], rotation[3]),
        }
    }

    #[test]
    fn test_transforms_from_msgs() {
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let msgs = vec![
            transform_msg([1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0]),
            transform_msg([0.0, 0.0, 0.0], [0.0, 0.0, half, half]),
        ];

        let mut transforms = vec![Transform::eye()];
        transforms_from_msgs(&msgs, &mut transforms).unwrap();

        assert_eq!(transforms.len(), 3);
        assert_eq!(transforms[1].translation(), Vector3::new(1.0, 2.0, 3.0));
        assert_abs_diff_eq!(transforms[1].angle(), 0.0);
        assert_abs_diff_eq!(
            &transforms[2] * &Vector3::x(),
            Vector3::y(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_transforms_from_msgs_empty() {
        let mut transforms = Vec::new();
        transforms_from_msgs(&[], &mut transforms).unwrap();
        assert!(transforms.is_empty());
    }

    #[test]
    fn test_zero_quaternion_is_rejected() {
        let msgs = vec![
            transform_msg([1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]),
            transform_msg([1.0, 0.0, 0.0], [0.0, 0.0, 0.0, 0.0]),
        ];
        let mut transforms = Vec::new();
        let result = transforms_from_msgs(&msgs, &mut transforms);

        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert_eq!(transforms.len(), 1);
    }

    #[rstest]
    #[case([0.0, 0.0, 0.0, f64::NAN])]
    #[case([f64::INFINITY, 0.0, 0.0, 1.0])]
    #[case([0.0, 0.0, 1e-17, 0.0])]
    fn test_invalid_quaternion_is_rejected(#[case] rotation: [f64; 4]) {
        assert!(matches!(
            transform_from_msg(&transform_msg([0.0; 3], rotation)),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[rstest]
    #[case([0.0, 0.0, 0.0, 1e20], 0.0)]
    #[case([1e200, 0.0, 0.0, 1e200], std::f32::consts::FRAC_PI_2)]
    #[case([0.0, 0.0, 1e-10, 0.0], std::f32::consts::PI)]
    #[case([0.0, 0.0, 0.0, 2.0], 0.0)]
    fn test_non_unit_quaternion_is_normalized(#[case] rotation: [f64; 4], #[case] angle: f32) {
        let transform = transform_from_msg(&transform_msg([1.0, 2.0, 3.0], rotation)).unwrap();

        assert_abs_diff_eq!(transform.rotation().norm(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(transform.angle(), angle, epsilon = 1e-5);
        assert_abs_diff_eq!(
            transform.translation(),
            Vector3::new(1.0, 2.0, 3.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_rejected_message_names_its_index() {
        let msgs = vec![
            transform_msg([0.0; 3], [0.0, 0.0, 0.0, 1.0]),
            transform_msg([0.0; 3], [0.0, 0.0, 0.0, 0.0]),
        ];
        let err = transforms_from_msgs(&msgs, &mut Vec::new()).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Parameter error: Transform message 1: Rotation quaternion has invalid norm 0"
        );
    }

    #[test]
    fn test_transform_msg_roundtrip() {
        let rotation = UnitQuaternion::from_euler_angles(0.1, -0.4, 1.2);
        let transform = Transform::new(&Vector3::new(0.5, -1.0, 2.0), rotation.quaternion());

        let back = transform_from_msg(&msg::Transform::from(&transform)).unwrap();
        assert_abs_diff_eq!(back.translation(), transform.translation(), epsilon = 1e-6);
        assert_abs_diff_eq!(
            (&back.inverse() * &transform).angle(),
            0.0,
            epsilon = 1e-3
        );
        assert_eq!(transforms_to_msgs(&[transform]).len(), 1);
    }

    #[test]
    fn test_evaluation_details_to_msgs() {
        let details = vec![
            VoxelEvaluationDetails {
                rmse: 0.5,
                max_error: 1.0,
                min_error: -0.25,
                num_evaluated_voxels: 10,
                num_ignored_voxels: 2,
                num_overlapping_voxels: 12,
                num_non_overlapping_voxels: 3,
            },
            VoxelEvaluationDetails::default(),
        ];
        let mut msgs = vec![msg::VoxelEvaluationDetails::default(); 5];
        evaluation_details_to_msgs(&details, &mut msgs);

        assert_eq!(msgs.len(), 2);
        assert_eq!(
            msgs[0],
            msg::VoxelEvaluationDetails {
                rmse: 0.5,
                max_error: 1.0,
                min_error: -0.25,
                num_evaluated_voxels: 10,
                num_ignored_voxels: 2,
                num_overlapping_voxels: 12,
                num_non_overlapping_voxels: 3,
            }
        );
        assert_eq!(VoxelEvaluationDetails::from(&msgs[0]), details[0]);
        assert_eq!(msgs[1], msg::VoxelEvaluationDetails::default());

        evaluation_details_to_msgs(&[], &mut msgs);
        assert!(msgs.is_empty());
    }

    #[rstest]
    fn test_mesh_to_surfel_cloud(sample_quad_mesh: Mesh) {
        let mut cloud = SurfelCloud::default();
        mesh_to_surfel_cloud(&sample_quad_mesh, &mut cloud).unwrap();

        assert_eq!(cloud.len(), sample_quad_mesh.len());
        assert_eq!(cloud.width as usize, cloud.len());
        assert_eq!(cloud.height, 1);
        assert!(cloud.is_dense);
        for (point, vertex, normal, color) in izip!(
            cloud.iter(),
            sample_quad_mesh.vertices.iter(),
            sample_quad_mesh.normals.iter(),
            sample_quad_mesh.colors.iter()
        ) {
            assert_eq!(point.position, *vertex);
            assert_eq!(point.normal, *normal);
            assert_eq!(point.rgb(), [color.r, color.g, color.b]);
        }
    }

    #[rstest]
    fn test_mesh_without_colors(sample_quad_mesh: Mesh) {
        let mut mesh = sample_quad_mesh;
        mesh.colors.clear();
        let mut cloud = SurfelCloud::default();
        mesh_to_surfel_cloud(&mesh, &mut cloud).unwrap();

        assert_eq!(cloud.len(), mesh.len());
        assert!(cloud.iter().all(|p| p.rgb() == [0, 0, 0] && p.a == 255));
    }

    #[rstest]
    fn test_mesh_without_normals(sample_quad_mesh: Mesh) {
        let mut mesh = sample_quad_mesh;
        mesh.normals.clear();
        let mut cloud = SurfelCloud::default();

        assert!(matches!(
            mesh_to_surfel_cloud(&mesh, &mut cloud),
            Err(Error::MissingNormals(4))
        ));
        assert!(cloud.is_empty());
    }

    #[rstest]
    fn test_short_attribute(sample_quad_mesh: Mesh) {
        let mut mesh = sample_quad_mesh;
        mesh.colors.pop();
        let mut cloud = SurfelCloud::default();

        assert!(matches!(
            mesh_to_surfel_cloud(&mesh, &mut cloud),
            Err(Error::AttributeMismatch {
                attribute: "colors",
                expected: 4,
                found: 3
            })
        ));
    }

    #[rstest]
    fn test_long_attribute(sample_quad_mesh: Mesh) {
        let mut mesh = sample_quad_mesh;
        mesh.normals.push(Vector3::x());
        let mut cloud = SurfelCloud::default();

        assert!(matches!(
            mesh_to_surfel_cloud(&mesh, &mut cloud),
            Err(Error::AttributeMismatch {
                attribute: "normals",
                expected: 4,
                found: 5
            })
        ));
        assert!(cloud.is_empty());
    }

    #[rstest]
    fn test_appends_to_cloud(sample_quad_mesh: Mesh) {
        let mut cloud = SurfelCloud::default();
        mesh_to_surfel_cloud(&sample_quad_mesh, &mut cloud).unwrap();
        mesh_to_surfel_cloud(&sample_quad_mesh, &mut cloud).unwrap();

        assert_eq!(cloud.len(), 2 * sample_quad_mesh.len());
        assert_eq!(cloud.width as usize, cloud.len());
        assert_eq!(cloud.points[4].rgb(), cloud.points[0].rgb());
    }

    #[rstest]
    fn test_tsdf_to_surfel_cloud(sample_plane_layer: TsdfLayer) {
        let mut cloud = SurfelCloud::default();
        tsdf_to_surfel_cloud(
            &sample_plane_layer,
            &voxel_point_generator,
            &ConversionConfig::default(),
            &mut cloud,
        )
        .unwrap();

        assert!(!cloud.is_empty());
        assert_eq!(cloud.width as usize, cloud.len());
        assert_eq!(cloud.height, 1);
        assert!(cloud.is_dense);
        for point in cloud.iter() {
            assert_eq!(point.normal, Vector3::z());
            assert_eq!(point.rgb(), [200, 100, 50]);
        }
    }

    #[rstest]
    fn test_tsdf_to_surfel_cloud_without_color(sample_plane_layer: TsdfLayer) {
        let config = ConversionConfig {
            mesh: MeshIntegratorConfig {
                use_color: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut cloud = SurfelCloud::default();
        tsdf_to_surfel_cloud(&sample_plane_layer, &voxel_point_generator, &config, &mut cloud)
            .unwrap();

        assert!(cloud.iter().all(|p| p.rgb() == [0, 0, 0]));
    }

    #[rstest]
    fn test_tsdf_without_normals(sample_plane_layer: TsdfLayer, sample_quad_mesh: Mesh) {
        let quad = sample_quad_mesh;
        let generator = move |_: &TsdfLayer,
                              _: &MeshIntegratorConfig,
                              _: bool,
                              mesh_layer: &mut MeshLayer|
              -> Result<(), Error> {
            let mesh = mesh_layer.allocate_mesh(&Vector3::zeros());
            *mesh = quad.clone();
            mesh.normals.clear();
            Ok(())
        };

        let mut cloud = SurfelCloud::default();
        let result = tsdf_to_surfel_cloud(
            &sample_plane_layer,
            &generator,
            &ConversionConfig::default(),
            &mut cloud,
        );
        assert!(matches!(result, Err(Error::MissingNormals(_))));

        let mut config = ConversionConfig::default();
        config.surfel.recompute_missing_normals = true;
        tsdf_to_surfel_cloud(&sample_plane_layer, &generator, &config, &mut cloud).unwrap();
        assert_eq!(cloud.len(), 4);
        for point in cloud.iter() {
            assert_abs_diff_eq!(point.normal, Vector3::z(), epsilon = 1e-6);
        }
    }

    #[rstest]
    fn test_misaligned_block_normals_are_not_paired(sample_plane_layer: TsdfLayer) {
        let generator = |_: &TsdfLayer,
                         _: &MeshIntegratorConfig,
                         _: bool,
                         mesh_layer: &mut MeshLayer|
         -> Result<(), Error> {
            let short = mesh_layer.allocate_mesh(&Vector3::new(0, 0, 0));
            short.vertices = vec![Vector3::zeros(), Vector3::x()];
            short.normals = vec![Vector3::x()];
            let long = mesh_layer.allocate_mesh(&Vector3::new(1, 0, 0));
            long.vertices = vec![Vector3::y(), Vector3::z()];
            long.normals = vec![Vector3::y(), Vector3::y(), Vector3::z()];
            Ok(())
        };

        let mut cloud = SurfelCloud::default();
        assert!(matches!(
            tsdf_to_surfel_cloud(
                &sample_plane_layer,
                &generator,
                &ConversionConfig::default(),
                &mut cloud
            ),
            Err(Error::MissingNormals(4))
        ));
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_empty_layer() {
        let layer = TsdfLayer::new(0.1, 8).unwrap();
        let mut cloud = SurfelCloud::default();
        tsdf_to_surfel_cloud(
            &layer,
            &voxel_point_generator,
            &ConversionConfig::default(),
            &mut cloud,
        )
        .unwrap();

        assert!(cloud.is_empty());
        assert_eq!(cloud.width, 0);
        assert_eq!(cloud.height, 1);
        assert!(cloud.is_dense);
    }

    #[test]
    fn test_generator_error_is_forwarded() {
        let failing = |_: &TsdfLayer,
                       _: &MeshIntegratorConfig,
                       _: bool,
                       _: &mut MeshLayer|
         -> Result<(), Error> { Err(Error::MeshGeneration("no surface".into())) };

        let layer = TsdfLayer::new(0.1, 8).unwrap();
        let mut cloud = SurfelCloud::default();
        assert!(matches!(
            tsdf_to_surfel_cloud(&layer, &failing, &ConversionConfig::default(), &mut cloud),
            Err(Error::MeshGeneration(_))
        ));
    }
}
