//! Scene graph (spec §3.5).
//!
//! A sibling-ordered forest of nodes plus animations and skins. Plain
//! `u32` slot indices into `SceneGraph::nodes` replace the owning
//! `parent` back-references `hedron::data::{DataSet, Node, NodeParent}`
//! used, per spec §9's note that cyclic ownership in the source must
//! become index-based here.

use nalgebra::Vector3;

/// Translation / XYZ-Euler-degrees rotation / scale, spec §3.5's local
/// transform representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f32>,
    /// Euler angles in degrees, XYZ intrinsic convention (spec §9).
    pub rotation_euler_deg: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation_euler_deg: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn to_matrix(self) -> nalgebra::Matrix4<f32> {
        let t = nalgebra::Translation3::from(self.translation).to_homogeneous();
        let r = self.rotation_matrix().to_homogeneous();
        let s = nalgebra::Matrix4::new_nonuniform_scaling(&self.scale);
        t * r * s
    }

    pub fn rotation_matrix(self) -> nalgebra::Rotation3<f32> {
        let rad = self.rotation_euler_deg.map(f32::to_radians);
        nalgebra::Rotation3::from_euler_angles(rad.x, rad.y, rad.z)
    }
}

/// A node in the scene forest.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: Option<String>,
    pub parent: Option<u32>,
    /// Indices into the flat mesh-primitive list (spec §3.5).
    pub submeshes: Vec<u32>,
    pub transform: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetProperty {
    Translation,
    Rotation,
    Scale,
    Weights,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub sampler_index: u32,
    pub target_node: u32,
    pub target_property: TargetProperty,
}

#[derive(Debug, Clone)]
pub struct Animation {
    pub name: String,
    pub channels: Vec<Channel>,
    /// Sampler name (`<animName>.ch<samplerIndex>`) -> sampler index,
    /// spec §4.3.1 step 2.
    pub sampler_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Skin {
    pub name: String,
    /// The first scene node whose `skin` field equals this skin's own
    /// index (spec §4.3.1 step 2).
    pub peer_node: Option<u32>,
    pub joint_nodes: Vec<u32>,
}

/// A sibling-ordered forest of [`Node`]s plus animations and skins.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub nodes: Vec<Node>,
    pub animations: Vec<Animation>,
    pub skins: Vec<Skin>,
}

impl SceneGraph {
    /// World transform of `node_index`, folding every ancestor's local
    /// transform (spec §4.3.1 "Baking mode").
    pub fn world_transform(&self, node_index: u32) -> nalgebra::Matrix4<f32> {
        let mut chain = Vec::new();
        let mut cursor = Some(node_index);
        while let Some(idx) = cursor {
            let node = &self.nodes[idx as usize];
            chain.push(node.transform);
            cursor = node.parent;
        }
        chain
            .into_iter()
            .rev()
            .fold(nalgebra::Matrix4::identity(), |acc, t| acc * t.to_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_is_identity_matrix() {
        assert_eq!(Transform::default().to_matrix(), nalgebra::Matrix4::identity());
    }

    #[test]
    fn world_transform_composes_ancestors() {
        let mut graph = SceneGraph::default();
        graph.nodes.push(Node {
            transform: Transform {
                translation: Vector3::new(1.0, 0.0, 0.0),
                ..Default::default()
            },
            ..Default::default()
        });
        graph.nodes.push(Node {
            parent: Some(0),
            transform: Transform {
                translation: Vector3::new(0.0, 2.0, 0.0),
                ..Default::default()
            },
            ..Default::default()
        });
        let world = graph.world_transform(1);
        let p = world.transform_point(&nalgebra::Point3::origin());
        assert_eq!(p, nalgebra::Point3::new(1.0, 2.0, 0.0));
    }
}
