//! Procedural sample model for `pack`: an apple lathed from a profile
//! curve, with a stem and a single flat leaf.

use glam::{Quat, Vec3};
use model_viewer_core::asset::{DecodedScene, MaterialParams, MeshData, NodeEntry};

const BODY_SEGMENTS: usize = 24;
const STEM_SEGMENTS: usize = 8;

/// Radius/height pairs swept around the Y axis, bottom to top. The final
/// zero-radius row sits below the rim and forms the stem well.
const BODY_PROFILE: [[f32; 2]; 9] = [
    [0.00, -0.95],
    [0.45, -0.90],
    [0.80, -0.60],
    [0.98, -0.15],
    [1.00, 0.20],
    [0.88, 0.55],
    [0.62, 0.80],
    [0.30, 0.92],
    [0.00, 0.88],
];

const STEM_PROFILE: [[f32; 2]; 4] = [
    [0.00, 0.00],
    [0.05, 0.02],
    [0.035, 0.35],
    [0.00, 0.35],
];

/// Builds the demo scene: three meshes under one root group.
pub fn sample_scene() -> DecodedScene {
    let body = lathe(
        "body",
        &BODY_PROFILE,
        BODY_SEGMENTS,
        MaterialParams {
            base_color: [0.78, 0.12, 0.10],
            roughness: 0.35,
            metalness: 0.0,
            clearcoat: 0.6,
        },
    );
    let stem = lathe(
        "stem",
        &STEM_PROFILE,
        STEM_SEGMENTS,
        MaterialParams {
            base_color: [0.35, 0.22, 0.08],
            roughness: 0.8,
            metalness: 0.0,
            clearcoat: 0.0,
        },
    );
    let leaf = leaf_mesh();

    let mut root = NodeEntry::group("apple");
    root.children = vec![1, 2, 3];
    let mut body_node = NodeEntry::group("body");
    body_node.mesh = Some(0);
    let mut stem_node = NodeEntry::group("stem");
    stem_node.mesh = Some(1);
    stem_node.translation = [0.0, 0.82, 0.0];
    stem_node.rotation = Quat::from_rotation_z(0.18).to_array();
    let mut leaf_node = NodeEntry::group("leaf");
    leaf_node.mesh = Some(2);
    leaf_node.translation = [0.10, 1.02, 0.0];
    leaf_node.rotation = (Quat::from_rotation_y(0.6) * Quat::from_rotation_x(-0.9)).to_array();

    DecodedScene {
        meshes: vec![body, stem, leaf],
        nodes: vec![root, body_node, stem_node, leaf_node],
        roots: vec![0],
    }
}

/// Sweeps a radius/height profile around the Y axis. Zero-radius rows
/// collapse their quad strip into a triangle fan.
fn lathe(name: &str, profile: &[[f32; 2]], segments: usize, material: MaterialParams) -> MeshData {
    let mut positions = Vec::with_capacity(profile.len() * segments);
    for [radius, height] in profile {
        for segment in 0..segments {
            let angle = segment as f32 / segments as f32 * std::f32::consts::TAU;
            positions.push([radius * angle.cos(), *height, radius * angle.sin()]);
        }
    }

    let mut indices = Vec::new();
    for ring in 0..profile.len() - 1 {
        let lower = ring * segments;
        let upper = lower + segments;
        for segment in 0..segments {
            let next = (segment + 1) % segments;
            let (a, b) = ((lower + segment) as u32, (lower + next) as u32);
            let (c, d) = ((upper + segment) as u32, (upper + next) as u32);
            if profile[ring + 1][0] > 0.0 {
                indices.extend([a, c, d]);
            }
            if profile[ring][0] > 0.0 {
                indices.extend([a, d, b]);
            }
        }
    }

    let normals = smooth_normals(&positions, &indices);
    MeshData {
        name: name.to_string(),
        positions,
        normals,
        indices,
        material,
    }
}

fn leaf_mesh() -> MeshData {
    let positions = vec![
        [0.00, 0.00, 0.00],
        [0.25, 0.02, 0.08],
        [0.50, 0.00, 0.00],
        [0.25, 0.02, -0.08],
    ];
    let indices = vec![0, 1, 2, 0, 2, 3];
    let normals = smooth_normals(&positions, &indices);
    MeshData {
        name: "leaf".to_string(),
        positions,
        normals,
        indices,
        material: MaterialParams {
            base_color: [0.20, 0.55, 0.15],
            roughness: 0.5,
            metalness: 0.0,
            clearcoat: 0.3,
        },
    }
}

/// Area-weighted vertex normals from accumulated face normals.
fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accumulated = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let (a, b, c) = (
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        );
        let edge1 = Vec3::from_array(positions[b]) - Vec3::from_array(positions[a]);
        let edge2 = Vec3::from_array(positions[c]) - Vec3::from_array(positions[a]);
        let face = edge1.cross(edge2);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[c] += face;
    }
    accumulated
        .into_iter()
        .map(|normal| normal.normalize_or_zero().to_array())
        .collect()
}
