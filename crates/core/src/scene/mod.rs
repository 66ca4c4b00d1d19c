//! Scene graph primitives and the builders that assemble them.
//!
//! Nodes form a plain ownership tree: groups, meshes, and lights under a
//! single root. There is no reference counting; whoever owns the root owns
//! every GPU-visible resource beneath it and must run `dispose` before
//! letting the tree go.

pub mod build;
pub mod resources;

use glam::{Mat4, Quat, Vec3};

use resources::ResourceTicket;

/// Linear RGB triple.
pub type Color = [f32; 3];

/// Local transform of a node, composed as scale, then rotation, then
/// translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Physically based material parameters plus the ledger ticket for the GPU
/// copy.
#[derive(Debug)]
pub struct StandardMaterial {
    pub base_color: Color,
    pub roughness: f32,
    pub metalness: f32,
    pub env_map_intensity: f32,
    pub clearcoat: f32,
    ticket: ResourceTicket,
}

impl StandardMaterial {
    pub fn new(
        base_color: Color,
        roughness: f32,
        metalness: f32,
        env_map_intensity: f32,
        clearcoat: f32,
        ticket: ResourceTicket,
    ) -> Self {
        Self {
            base_color,
            roughness,
            metalness,
            env_map_intensity,
            clearcoat,
            ticket,
        }
    }

    fn dispose(&mut self) {
        self.ticket.release();
    }
}

/// Vertex and index buffers for one mesh, with the ticket for their GPU
/// copies.
#[derive(Debug)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    ticket: ResourceTicket,
}

impl Geometry {
    pub fn new(
        positions: Vec<[f32; 3]>,
        normals: Vec<[f32; 3]>,
        indices: Vec<u32>,
        ticket: ResourceTicket,
    ) -> Self {
        Self {
            positions,
            normals,
            indices,
            ticket,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn dispose(&mut self) {
        self.ticket.release();
    }
}

/// A drawable: geometry plus material plus shadow participation flags.
#[derive(Debug)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: StandardMaterial,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    fn dispose(&mut self) {
        self.geometry.dispose();
        self.material.dispose();
    }
}

/// Light flavours carried by light nodes. Position comes from the node
/// transform.
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional {
        cast_shadow: bool,
        shadow_map_size: u32,
    },
    Point {
        range: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

/// What a node contributes to the scene beyond its transform.
#[derive(Debug)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
}

/// One node of the ownership tree.
#[derive(Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh<T: Into<String>>(name: T, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind: NodeKind::Mesh(mesh),
            children: Vec::new(),
        }
    }

    pub fn light<T: Into<String>>(name: T, light: Light) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind: NodeKind::Light(light),
            children: Vec::new(),
        }
    }

    /// Pre-order walk over the subtree.
    pub fn traverse(&self, visit: &mut dyn FnMut(&SceneNode)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    /// Pre-order walk with mutable access.
    pub fn traverse_mut(&mut self, visit: &mut dyn FnMut(&mut SceneNode)) {
        visit(self);
        for child in &mut self.children {
            child.traverse_mut(visit);
        }
    }

    /// Releases every GPU-visible resource in the subtree. Safe to call
    /// more than once.
    pub fn dispose(&mut self) {
        self.traverse_mut(&mut |node| {
            if let NodeKind::Mesh(mesh) = &mut node.kind {
                mesh.dispose();
            }
        });
    }
}

/// A complete scene: the root group and everything beneath it.
#[derive(Debug)]
pub struct SceneGraph {
    pub root: SceneNode,
}

impl SceneGraph {
    pub fn new(root: SceneNode) -> Self {
        Self { root }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.root.traverse(&mut |node| {
            if matches!(node.kind, NodeKind::Mesh(_)) {
                count += 1;
            }
        });
        count
    }

    pub fn light_count(&self) -> usize {
        let mut count = 0;
        self.root.traverse(&mut |node| {
            if matches!(node.kind, NodeKind::Light(_)) {
                count += 1;
            }
        });
        count
    }

    pub fn dispose(&mut self) {
        self.root.dispose();
    }
}
