//! Node-tree/animation/skin import (spec §4.3.1 step 2).

use gltf::Document;
use nalgebra::{Quaternion, Rotation3, UnitQuaternion, Vector3};

use crate::scene::{Animation, Channel, Node, SceneGraph, Skin, TargetProperty, Transform};

use super::FlatPrimitiveRef;

pub struct Built {
    pub scene_graph: SceneGraph,
    pub primitives: Vec<FlatPrimitiveRef>,
}

pub fn build(document: &Document) -> Built {
    let (primitives, mesh_first_primitive) = flatten_primitives(document);
    let nodes = build_nodes(document, &mesh_first_primitive);
    let animations = build_animations(document);
    let skins = build_skins(document);
    Built {
        scene_graph: SceneGraph {
            nodes,
            animations,
            skins,
        },
        primitives,
    }
}

/// Flatten `meshes[].primitives[]` into one ordered list (spec §4.3.1 step
/// 2), plus a mesh-index -> first-flat-index prefix sum.
fn flatten_primitives(document: &Document) -> (Vec<FlatPrimitiveRef>, Vec<usize>) {
    let mut primitives = Vec::new();
    let mut mesh_first_primitive = Vec::with_capacity(document.meshes().count());

    for mesh in document.meshes() {
        mesh_first_primitive.push(primitives.len());
        for (primitive_index, _) in mesh.primitives().enumerate() {
            primitives.push(FlatPrimitiveRef {
                mesh_index: mesh.index(),
                primitive_index,
            });
        }
    }

    (primitives, mesh_first_primitive)
}

/// Name a flattened primitive the way spec §4.3.1 step 2 describes:
/// `<meshName>.<primitiveIndex>` when a mesh has more than one primitive,
/// else `<meshName>`, else `mesh_<i>` for unnamed meshes. Exposed for
/// diagnostics/metadata; not load-bearing for indexing (flat index is).
pub fn primitive_name(document: &Document, mesh_index: usize, primitive_index: usize) -> String {
    let Some(mesh) = document.meshes().nth(mesh_index) else {
        return format!("mesh_{mesh_index}");
    };
    let count = mesh.primitives().count();
    match mesh.name() {
        Some(name) if count > 1 => format!("{name}.{primitive_index}"),
        Some(name) => name.to_string(),
        None => format!("mesh_{mesh_index}"),
    }
}

fn build_nodes(document: &Document, mesh_first_primitive: &[usize]) -> Vec<Node> {
    let num_nodes = document.nodes().count();
    let mut parent = vec![None; num_nodes];
    for node in document.nodes() {
        for child in node.children() {
            parent[child.index()] = Some(node.index() as u32);
        }
    }

    document
        .nodes()
        .enumerate()
        .map(|(i, node)| {
            let name = Some(
                node.name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("nodes_{i}")),
            );
            let submeshes = node
                .mesh()
                .map(|mesh| {
                    let first = mesh_first_primitive[mesh.index()];
                    let count = mesh.primitives().count();
                    (first as u32..(first + count) as u32).collect()
                })
                .unwrap_or_default();
            Node {
                name,
                parent: parent[i],
                submeshes,
                transform: convert_transform(node.transform()),
            }
        })
        .collect()
}

fn convert_transform(transform: gltf::scene::Transform) -> Transform {
    match transform {
        gltf::scene::Transform::Matrix { matrix } => decompose_matrix(matrix),
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => Transform {
            translation: Vector3::from(translation),
            rotation_euler_deg: quaternion_to_euler_deg(rotation),
            scale: Vector3::from(scale),
        },
    }
}

/// Polar-decompose a column-major 4x4 matrix into T/R/S (spec §4.3.1 step
/// 2's "decompose it into T/R/S using polar decomposition").
fn decompose_matrix(raw: [[f32; 4]; 4]) -> Transform {
    let m = nalgebra::Matrix4::from(raw);
    let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);

    let mut m3 = nalgebra::Matrix3::new(
        m[(0, 0)],
        m[(0, 1)],
        m[(0, 2)],
        m[(1, 0)],
        m[(1, 1)],
        m[(1, 2)],
        m[(2, 0)],
        m[(2, 1)],
        m[(2, 2)],
    );

    let mut sx = m3.column(0).norm();
    let sy = m3.column(1).norm();
    let sz = m3.column(2).norm();
    // a negative determinant means the matrix includes a reflection; fold
    // that into one scale axis so the remaining columns are a pure rotation
    if m3.determinant() < 0.0 {
        sx = -sx;
    }
    if sx.abs() > f32::EPSILON {
        let c = m3.column(0) / sx;
        m3.set_column(0, &c);
    }
    if sy.abs() > f32::EPSILON {
        let c = m3.column(1) / sy;
        m3.set_column(1, &c);
    }
    if sz.abs() > f32::EPSILON {
        let c = m3.column(2) / sz;
        m3.set_column(2, &c);
    }

    let rotation = Rotation3::from_matrix_unchecked(m3);
    let (rx, ry, rz) = rotation.euler_angles();
    Transform {
        translation,
        rotation_euler_deg: Vector3::new(rx.to_degrees(), ry.to_degrees(), rz.to_degrees()),
        scale: Vector3::new(sx, sy, sz),
    }
}

/// Quaternion (glTF's `[x, y, z, w]` order) -> XYZ intrinsic Euler degrees
/// (spec §9's convention).
fn quaternion_to_euler_deg(rotation: [f32; 4]) -> Vector3<f32> {
    let q = UnitQuaternion::from_quaternion(Quaternion::new(
        rotation[3],
        rotation[0],
        rotation[1],
        rotation[2],
    ));
    let (rx, ry, rz) = q.euler_angles();
    Vector3::new(rx.to_degrees(), ry.to_degrees(), rz.to_degrees())
}

fn build_animations(document: &Document) -> Vec<Animation> {
    document
        .animations()
        .enumerate()
        .map(|(i, animation)| {
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{i}"));
            let sampler_names = (0..animation.samplers().count())
                .map(|s| format!("{name}.ch{s}"))
                .collect();
            let channels = animation
                .channels()
                .map(|channel| Channel {
                    sampler_index: channel.sampler().index() as u32,
                    target_node: channel.target().node().index() as u32,
                    target_property: match channel.target().property() {
                        gltf::animation::Property::Translation => TargetProperty::Translation,
                        gltf::animation::Property::Rotation => TargetProperty::Rotation,
                        gltf::animation::Property::Scale => TargetProperty::Scale,
                        gltf::animation::Property::MorphTargetWeights => TargetProperty::Weights,
                    },
                })
                .collect();
            Animation {
                name,
                channels,
                sampler_names,
            }
        })
        .collect()
}

fn build_skins(document: &Document) -> Vec<Skin> {
    document
        .skins()
        .enumerate()
        .map(|(i, skin)| {
            let name = skin
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("skin_{i}"));
            let joint_nodes = skin.joints().map(|j| j.index() as u32).collect();
            let peer_node = document
                .nodes()
                .find(|n| n.skin().map(|s| s.index()) == Some(i))
                .map(|n| n.index() as u32);
            Skin {
                name,
                peer_node,
                joint_nodes,
            }
        })
        .collect()
}
