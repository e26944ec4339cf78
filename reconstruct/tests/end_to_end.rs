use common::config::{IntensityConvention, ReconstructionParameters};
use nalgebra::Vector3;

use reconstruct::{mesh::Mesh, reconstruct, volume::Volume, Pos, ReconstructError};

/// A sphere of signed distances, positive inside, in a voxel grid.
fn sphere(dimensions: Vector3<usize>, spacing: Pos, center: Pos, radius: f32) -> Volume {
    Volume::from_fn(dimensions, spacing, |i, j, k| {
        let point = Pos::new(i as f32, j as f32, k as f32).component_mul(&spacing);
        radius - (point - center).magnitude()
    })
    .unwrap()
}

fn ball() -> Volume {
    sphere(Vector3::repeat(64), Pos::repeat(1.0), Pos::repeat(32.0), 20.0)
}

fn radii(mesh: &Mesh, center: Pos) -> (f32, f32) {
    mesh.vertices()
        .iter()
        .map(|x| (x - center).magnitude())
        .fold((f32::MAX, f32::MIN), |(min, max), x| (min.min(x), max.max(x)))
}

/// Share of vertices whose normal points away from `center`.
fn outward_vertex_fraction(mesh: &Mesh, center: Pos) -> f32 {
    let normals = mesh.normals().unwrap();
    let outward = mesh
        .vertices()
        .iter()
        .zip(normals)
        .filter(|(vertex, normal)| normal.dot(&(*vertex - center)) > 0.0)
        .count();
    outward as f32 / mesh.vertex_count() as f32
}

fn outward_fraction(mesh: &Mesh, center: Pos) -> f32 {
    let outward = (0..mesh.face_count())
        .filter(|&face| {
            let [a, b, c] = mesh.face_verts(face);
            mesh.face_normal(face).dot(&((a + b + c) / 3.0 - center)) > 0.0
        })
        .count();
    outward as f32 / mesh.face_count() as f32
}

#[test]
fn sphere_with_threshold_convention() {
    let params = ReconstructionParameters {
        convention: IntensityConvention::Threshold { level: 0.0 },
        ..Default::default()
    };
    let mesh = reconstruct(&ball(), &params, None).unwrap();

    assert!(mesh.face_count() > 0);
    assert!(mesh.is_valid());

    let (min, max) = radii(&mesh, Pos::zeros());
    assert!(min >= 19.5 && max <= 20.5, "radii in [{min}, {max}]");
    assert!(outward_vertex_fraction(&mesh, Pos::zeros()) > 0.95);
    assert!(outward_fraction(&mesh, Pos::zeros()) > 0.95);
}

#[test]
fn sphere_with_default_convention() {
    let mesh = reconstruct(&ball(), &ReconstructionParameters::default(), None).unwrap();
    assert!(mesh.face_count() > 0);
    assert!(mesh.is_valid());

    // Background voxels clamp to zero, so the surface sits up to one voxel
    // diagonal further out.
    let (min, max) = radii(&mesh, Pos::zeros());
    assert!(min >= 19.0 && max <= 21.8, "radii in [{min}, {max}]");
    assert!(outward_fraction(&mesh, Pos::zeros()) > 0.95);

    let normals = mesh.normals().unwrap();
    assert_eq!(normals.len(), mesh.vertex_count());
}

#[test]
fn anisotropic_volume_is_resampled() {
    let spacing = Pos::new(1.0, 1.0, 2.0);
    let volume = sphere(Vector3::new(64, 64, 32), spacing, Pos::repeat(32.0), 20.0);
    let params = ReconstructionParameters {
        convention: IntensityConvention::Threshold { level: 0.0 },
        ..Default::default()
    };

    let mesh = reconstruct(&volume, &params, None).unwrap();
    let (min, max) = radii(&mesh, Pos::zeros());
    assert!(min >= 19.4 && max <= 20.6, "radii in [{min}, {max}]");
}

#[test]
fn output_is_centered_and_flipped() {
    // Off center by (8, 0, -8) in voxel space, z is mirrored on output.
    let center = Pos::new(40.0, 32.0, 24.0);
    let volume = sphere(Vector3::repeat(64), Pos::repeat(1.0), center, 12.0);
    let params = ReconstructionParameters {
        convention: IntensityConvention::Threshold { level: 0.0 },
        ..Default::default()
    };

    let mesh = reconstruct(&volume, &params, None).unwrap();
    let centroid = mesh.centroid();
    assert!((centroid - Pos::new(8.0, 0.0, 8.0)).magnitude() < 0.2, "{centroid:?}");
    assert!(mesh.volume() > 0.0);
}

#[test]
fn empty_volume_gives_empty_mesh() {
    let voxels = vec![0.0; 16 * 16 * 16];
    let volume = Volume::new(Vector3::repeat(16), Pos::repeat(1.0), voxels).unwrap();
    let mesh = reconstruct(&volume, &ReconstructionParameters::default(), None).unwrap();
    assert!(mesh.is_empty());
    assert_eq!(mesh.face_count(), 0);
}

#[test]
fn invalid_volume_is_rejected() {
    let result = Volume::new(Vector3::new(4, 0, 4), Pos::repeat(1.0), Vec::new());
    assert!(matches!(result, Err(ReconstructError::InvalidVolume { .. })));
}

#[test]
fn remesh_and_decimate() {
    let params = ReconstructionParameters {
        convention: IntensityConvention::Threshold { level: 0.0 },
        remesh_passes: 2,
        edge_length_multiplier: 2.0,
        reduced_triangle_count: 1_000,
        ..Default::default()
    };

    let mesh = reconstruct(&ball(), &params, None).unwrap();
    assert!(mesh.face_count() <= 1_000);
    assert!(mesh.face_count() > 500);
    assert!(mesh.is_valid());
    assert!(mesh.is_manifold());
    assert!(outward_fraction(&mesh, Pos::zeros()) > 0.95);

    let (min, max) = radii(&mesh, Pos::zeros());
    assert!(min >= 19.0 && max <= 21.0, "radii in [{min}, {max}]");
}

#[test]
fn panicking_callback_is_ignored() {
    let mut calls = 0;
    let mut callback = |_: f32, _: &str| {
        calls += 1;
        panic!("callback failure");
    };

    let volume = sphere(Vector3::repeat(16), Pos::repeat(1.0), Pos::repeat(8.0), 5.0);
    let mesh = reconstruct(&volume, &ReconstructionParameters::default(), Some(&mut callback));

    assert!(mesh.unwrap().face_count() > 0);
    assert!(calls >= 5);
}
