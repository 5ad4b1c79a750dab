//! Retained scene graph.
//!
//! A [`Scene`] is the root container: renderable nodes are added once and
//! then mutated in place every frame through their [`NodeId`]. The renderer
//! walks the scene, uploads whatever is flagged dirty and draws every node.

use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::buffer::AttributeBuffer;
use crate::geometry::Geometry;

/// Convert a `0xRRGGBB` color to linear-ish RGB in `0.0..=1.0`.
pub fn color_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// Handle to a node inside a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Position, Euler rotation (XYZ order, radians) and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Material for point clouds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointsMaterial {
    /// Uniform color, used when `vertex_colors` is off.
    pub color: Vec3,
    /// Default point size, used when the cloud has no size attribute.
    pub size: f32,
    /// Read per-point colors from the cloud's color attribute.
    pub vertex_colors: bool,
    /// Sizes are world units shrinking with distance; otherwise pixels.
    pub size_attenuation: bool,
    pub opacity: f32,
}

impl Default for PointsMaterial {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            size: 1.0,
            vertex_colors: false,
            size_attenuation: true,
            opacity: 1.0,
        }
    }
}

/// A set of points sharing one material.
#[derive(Debug, Clone)]
pub struct PointCloud {
    /// `item_size` 3.
    pub positions: AttributeBuffer,
    /// Optional per-point RGB, `item_size` 3.
    pub colors: Option<AttributeBuffer>,
    /// Optional per-point size, `item_size` 1.
    pub sizes: Option<AttributeBuffer>,
    pub material: PointsMaterial,
}

impl PointCloud {
    pub fn new(positions: AttributeBuffer, material: PointsMaterial) -> Self {
        Self {
            positions,
            colors: None,
            sizes: None,
            material,
        }
    }

    pub fn with_colors(mut self, colors: AttributeBuffer) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn with_sizes(mut self, sizes: AttributeBuffer) -> Self {
        self.sizes = Some(sizes);
        self
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.positions.count()
    }
}

/// Surface material for meshes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshMaterial {
    pub color: Vec3,
    pub opacity: f32,
    /// Shade with the scene lights; otherwise the flat color is used.
    pub lit: bool,
    pub double_sided: bool,
}

impl MeshMaterial {
    /// Flat, unlit color.
    pub fn basic(color: Vec3) -> Self {
        Self {
            color,
            opacity: 1.0,
            lit: false,
            double_sided: false,
        }
    }

    /// Color shaded by the scene lights.
    pub fn lit(color: Vec3) -> Self {
        Self {
            lit: true,
            ..Self::basic(color)
        }
    }
}

/// Triangle geometry placed in the world.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: MeshMaterial,
    pub transform: Transform,
}

impl Mesh {
    pub fn new(geometry: Arc<Geometry>, material: MeshMaterial) -> Self {
        Self {
            geometry,
            material,
            transform: Transform::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Points(PointCloud),
    Mesh(Mesh),
}

/// Directional light shining along `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// Scene graph root.
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: Vec3,
    pub ambient_light: Vec3,
    pub sun: Option<DirectionalLight>,
    nodes: Vec<Node>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            background: Vec3::ZERO,
            ambient_light: Vec3::splat(1.0),
            sun: None,
            nodes: Vec::new(),
        }
    }

    /// Attach a node to the root.
    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_points(&mut self, points: PointCloud) -> NodeId {
        self.add(Node::Points(points))
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> NodeId {
        self.add(Node::Mesh(mesh))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn points(&self, id: NodeId) -> Option<&PointCloud> {
        match self.nodes.get(id.0) {
            Some(Node::Points(points)) => Some(points),
            _ => None,
        }
    }

    pub fn points_mut(&mut self, id: NodeId) -> Option<&mut PointCloud> {
        match self.nodes.get_mut(id.0) {
            Some(Node::Points(points)) => Some(points),
            _ => None,
        }
    }

    pub fn mesh(&self, id: NodeId) -> Option<&Mesh> {
        match self.nodes.get(id.0) {
            Some(Node::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut Mesh> {
        match self.nodes.get_mut(id.0) {
            Some(Node::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node)> {
        self.nodes.iter_mut().enumerate().map(|(i, node)| (NodeId(i), node))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex() {
        assert_eq!(color_hex(0x0000ff), Vec3::new(0.0, 0.0, 1.0));
        let water = color_hex(0x00aaff);
        assert_eq!(water.x, 0.0);
        assert!((water.y - 170.0 / 255.0).abs() < 1e-6);
        assert_eq!(water.z, 1.0);
    }

    #[test]
    fn test_typed_node_access() {
        let mut scene = Scene::new();
        let cloud = scene.add_points(PointCloud::new(AttributeBuffer::new(3, 3), PointsMaterial::default()));
        let plane = scene.add_mesh(Mesh::new(Arc::new(Geometry::plane(1.0, 1.0)), MeshMaterial::basic(Vec3::ONE)));

        assert_eq!(scene.len(), 2);
        assert_eq!(scene.points(cloud).map(PointCloud::count), Some(3));
        assert!(scene.mesh(cloud).is_none());
        assert!(scene.points_mut(plane).is_none());

        scene.mesh_mut(plane).unwrap().transform.rotation.y = 1.0;
        assert_eq!(scene.mesh(plane).unwrap().transform.rotation.y, 1.0);
    }

    #[test]
    fn test_transform_rotates_plane_flat() {
        let transform = Transform {
            rotation: Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0),
            ..Transform::default()
        };
        let up = transform.matrix().transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!(up.y.abs() < 1e-6);
        assert!((up.z + 1.0).abs() < 1e-6);
    }
}
