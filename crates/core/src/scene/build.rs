//! Deterministic scene construction: the fixed lighting stage and the
//! instantiation of decoded assets, both tuned by the capability tier.

use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::asset::{DecodedScene, MeshData};
use crate::capability::{CapabilityTier, SHADOW_MAP_SIZE};

use super::resources::{ResourceKind, ResourceLedger};
use super::{
    Color, Geometry, Light, LightKind, Mesh, NodeKind, SceneGraph, SceneNode, StandardMaterial,
};

/// Name of the node the loaded model is mounted under.
pub const MODEL_SLOT: &str = "model";

const MODEL_SCALE: f32 = 5.0;
const MODEL_Y_OFFSET: f32 = -2.0;

const ROUGHNESS_HIGH: f32 = 0.2;
const ROUGHNESS_STANDARD: f32 = 0.3;
const METALNESS: f32 = 0.05;
const ENV_MAP_INTENSITY_HIGH: f32 = 1.5;
const ENV_MAP_INTENSITY_STANDARD: f32 = 1.2;

const WHITE: Color = [1.0, 1.0, 1.0];
const KEY_COLOR: Color = [1.0, 250.0 / 255.0, 240.0 / 255.0];
const FILL_COLOR: Color = [1.0, 215.0 / 255.0, 0.0];
const ACCENT_COLOR: Color = [1.0, 107.0 / 255.0, 107.0 / 255.0];

const AMBIENT_INTENSITY_HIGH: f32 = 0.8;
const AMBIENT_INTENSITY_STANDARD: f32 = 0.9;
const KEY_INTENSITY_HIGH: f32 = 1.5;
const KEY_INTENSITY_STANDARD: f32 = 1.2;
const FILL_INTENSITY_HIGH: f32 = 0.9;
const FILL_INTENSITY_STANDARD: f32 = 0.7;
const RIM_INTENSITY: f32 = 0.6;
const ACCENT_INTENSITY: f32 = 0.8;
const ACCENT_RANGE: f32 = 25.0;

const KEY_POSITION: Vec3 = Vec3::new(15.0, 25.0, 15.0);
const FILL_POSITION: Vec3 = Vec3::new(-10.0, 10.0, -15.0);
const RIM_POSITION: Vec3 = Vec3::new(0.0, 15.0, -20.0);
const ACCENT_POSITION: Vec3 = Vec3::new(10.0, 5.0, 10.0);

/// Builds the fixed stage: the lighting rig the model is presented under.
///
/// The standard tier carries ambient, key, and fill lights with nothing
/// casting shadows. The high tier raises the key and fill, lowers the
/// ambient, lets the key cast shadows, and adds a rim light and a warm
/// accent point light.
pub fn build_stage(tier: CapabilityTier) -> SceneGraph {
    let high = tier == CapabilityTier::High;
    let mut root = SceneNode::group("stage");

    root.children.push(SceneNode::light(
        "ambient",
        Light {
            kind: LightKind::Ambient,
            color: WHITE,
            intensity: if high {
                AMBIENT_INTENSITY_HIGH
            } else {
                AMBIENT_INTENSITY_STANDARD
            },
        },
    ));
    root.children.push(directional(
        "key",
        KEY_POSITION,
        KEY_COLOR,
        if high {
            KEY_INTENSITY_HIGH
        } else {
            KEY_INTENSITY_STANDARD
        },
        high,
    ));
    root.children.push(directional(
        "fill",
        FILL_POSITION,
        FILL_COLOR,
        if high {
            FILL_INTENSITY_HIGH
        } else {
            FILL_INTENSITY_STANDARD
        },
        false,
    ));

    if high {
        root.children
            .push(directional("rim", RIM_POSITION, WHITE, RIM_INTENSITY, false));
        let mut accent = SceneNode::light(
            "accent",
            Light {
                kind: LightKind::Point {
                    range: ACCENT_RANGE,
                },
                color: ACCENT_COLOR,
                intensity: ACCENT_INTENSITY,
            },
        );
        accent.transform.translation = ACCENT_POSITION;
        root.children.push(accent);
    }

    SceneGraph::new(root)
}

/// Instantiates a decoded asset as a mountable subtree.
///
/// Every mesh instance acquires its own geometry and material tickets, so
/// the ledger counts what a renderer would actually upload. Material
/// parameters from the container are retuned for presentation: the tier
/// fixes roughness, metalness, and environment intensity, and clearcoat
/// survives only on the high tier. The subtree root carries the uniform
/// presentation scale and vertical offset.
pub fn build_model(
    scene: &DecodedScene,
    tier: CapabilityTier,
    ledger: &Arc<ResourceLedger>,
) -> SceneNode {
    let mut wrapper = SceneNode::group(MODEL_SLOT);
    wrapper.transform.scale = Vec3::splat(MODEL_SCALE);
    wrapper.transform.translation = Vec3::new(0.0, MODEL_Y_OFFSET, 0.0);
    for &root in &scene.roots {
        wrapper.children.push(instantiate(scene, root, tier, ledger));
    }
    wrapper
}

fn instantiate(
    scene: &DecodedScene,
    index: usize,
    tier: CapabilityTier,
    ledger: &Arc<ResourceLedger>,
) -> SceneNode {
    let entry = &scene.nodes[index];
    let kind = match entry.mesh {
        Some(mesh) => NodeKind::Mesh(instantiate_mesh(&scene.meshes[mesh], tier, ledger)),
        None => NodeKind::Group,
    };

    let mut node = SceneNode {
        name: entry.name.clone(),
        transform: super::Transform {
            translation: Vec3::from_array(entry.translation),
            rotation: Quat::from_array(entry.rotation),
            scale: Vec3::from_array(entry.scale),
        },
        kind,
        children: Vec::with_capacity(entry.children.len()),
    };
    for &child in &entry.children {
        node.children.push(instantiate(scene, child, tier, ledger));
    }
    node
}

fn instantiate_mesh(data: &MeshData, tier: CapabilityTier, ledger: &Arc<ResourceLedger>) -> Mesh {
    let high = tier == CapabilityTier::High;
    let geometry = Geometry::new(
        data.positions.clone(),
        data.normals.clone(),
        data.indices.clone(),
        ledger.acquire(ResourceKind::Geometry),
    );
    let material = StandardMaterial::new(
        data.material.base_color,
        if high {
            ROUGHNESS_HIGH
        } else {
            ROUGHNESS_STANDARD
        },
        METALNESS,
        if high {
            ENV_MAP_INTENSITY_HIGH
        } else {
            ENV_MAP_INTENSITY_STANDARD
        },
        if high { data.material.clearcoat } else { 0.0 },
        ledger.acquire(ResourceKind::Material),
    );
    Mesh {
        geometry,
        material,
        cast_shadow: high,
        receive_shadow: high,
    }
}

fn directional(
    name: &str,
    position: Vec3,
    color: Color,
    intensity: f32,
    cast_shadow: bool,
) -> SceneNode {
    let mut node = SceneNode::light(
        name,
        Light {
            kind: LightKind::Directional {
                cast_shadow,
                shadow_map_size: SHADOW_MAP_SIZE,
            },
            color,
            intensity,
        },
    );
    node.transform.translation = position;
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{MaterialParams, NodeEntry};

    fn decoded_fixture() -> DecodedScene {
        let mut body = NodeEntry::group("body");
        body.mesh = Some(0);
        body.children.push(1);
        let mut stem = NodeEntry::group("stem");
        stem.mesh = Some(0);
        stem.translation = [0.0, 0.5, 0.0];
        DecodedScene {
            meshes: vec![MeshData {
                name: "shared".to_string(),
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                normals: vec![[0.0, 0.0, 1.0]; 3],
                indices: vec![0, 1, 2],
                material: MaterialParams {
                    base_color: [0.9, 0.2, 0.2],
                    roughness: 0.5,
                    metalness: 0.4,
                    clearcoat: 0.6,
                },
            }],
            nodes: vec![body, stem],
            roots: vec![0],
        }
    }

    fn light_names(graph: &SceneGraph) -> Vec<String> {
        let mut names = Vec::new();
        graph.root.traverse(&mut |node| {
            if matches!(node.kind, NodeKind::Light(_)) {
                names.push(node.name.clone());
            }
        });
        names
    }

    fn find_light(graph: &SceneGraph, name: &str) -> Light {
        let mut found = None;
        graph.root.traverse(&mut |node| {
            if node.name == name {
                if let NodeKind::Light(light) = &node.kind {
                    found = Some(light.clone());
                }
            }
        });
        found.unwrap()
    }

    #[test]
    fn standard_stage_keeps_the_minimal_rig() {
        let stage = build_stage(CapabilityTier::Standard);
        assert_eq!(light_names(&stage), ["ambient", "key", "fill"]);

        assert_eq!(find_light(&stage, "ambient").intensity, 0.9);
        let key = find_light(&stage, "key");
        assert_eq!(key.intensity, 1.2);
        assert!(matches!(
            key.kind,
            LightKind::Directional {
                cast_shadow: false,
                ..
            }
        ));
        assert_eq!(find_light(&stage, "fill").intensity, 0.7);
    }

    #[test]
    fn high_stage_adds_rim_and_accent() {
        let stage = build_stage(CapabilityTier::High);
        assert_eq!(light_names(&stage), ["ambient", "key", "fill", "rim", "accent"]);

        assert_eq!(find_light(&stage, "ambient").intensity, 0.8);
        let key = find_light(&stage, "key");
        assert_eq!(key.intensity, 1.5);
        assert!(matches!(
            key.kind,
            LightKind::Directional {
                cast_shadow: true,
                shadow_map_size: SHADOW_MAP_SIZE,
            }
        ));

        let accent = find_light(&stage, "accent");
        assert_eq!(accent.intensity, 0.8);
        assert!(matches!(accent.kind, LightKind::Point { range } if range == 25.0));
    }

    #[test]
    fn model_root_carries_the_presentation_transform() {
        let ledger = ResourceLedger::new();
        let model = build_model(&decoded_fixture(), CapabilityTier::Standard, &ledger);
        assert_eq!(model.name, MODEL_SLOT);
        assert_eq!(model.transform.scale, Vec3::splat(5.0));
        assert_eq!(model.transform.translation, Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(model.children.len(), 1);
        assert_eq!(model.children[0].name, "body");
        assert_eq!(model.children[0].children[0].name, "stem");
    }

    #[test]
    fn high_tier_materials_keep_clearcoat_and_cast_shadows() {
        let ledger = ResourceLedger::new();
        let model = build_model(&decoded_fixture(), CapabilityTier::High, &ledger);
        model.traverse(&mut |node| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                assert_eq!(mesh.material.base_color, [0.9, 0.2, 0.2]);
                assert_eq!(mesh.material.roughness, ROUGHNESS_HIGH);
                assert_eq!(mesh.material.metalness, METALNESS);
                assert_eq!(mesh.material.env_map_intensity, ENV_MAP_INTENSITY_HIGH);
                assert_eq!(mesh.material.clearcoat, 0.6);
                assert!(mesh.cast_shadow);
                assert!(mesh.receive_shadow);
            }
        });
    }

    #[test]
    fn standard_tier_materials_drop_clearcoat_and_shadows() {
        let ledger = ResourceLedger::new();
        let model = build_model(&decoded_fixture(), CapabilityTier::Standard, &ledger);
        model.traverse(&mut |node| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                assert_eq!(mesh.material.roughness, ROUGHNESS_STANDARD);
                assert_eq!(mesh.material.env_map_intensity, ENV_MAP_INTENSITY_STANDARD);
                assert_eq!(mesh.material.clearcoat, 0.0);
                assert!(!mesh.cast_shadow);
                assert!(!mesh.receive_shadow);
            }
        });
    }

    #[test]
    fn every_mesh_instance_gets_its_own_tickets() {
        let ledger = ResourceLedger::new();
        let mut model = build_model(&decoded_fixture(), CapabilityTier::High, &ledger);
        // Two nodes share one mesh table entry, so two instances exist.
        assert_eq!(ledger.live(ResourceKind::Geometry), 2);
        assert_eq!(ledger.live(ResourceKind::Material), 2);

        model.dispose();
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn building_twice_yields_identical_structure() {
        let ledger = ResourceLedger::new();
        let scene = decoded_fixture();
        let first = build_model(&scene, CapabilityTier::High, &ledger);
        let second = build_model(&scene, CapabilityTier::High, &ledger);

        let describe = |model: &SceneNode| {
            let mut parts = Vec::new();
            model.traverse(&mut |node| {
                parts.push((node.name.clone(), node.transform, node.children.len()));
            });
            parts
        };
        assert_eq!(describe(&first), describe(&second));
    }
}
