//! Per-primitive attribute extraction (spec §4.3.1 "Primitive loading").

use std::collections::HashMap;

use gltf::buffer;
use gltf::mesh::util::{ReadColors, ReadJoints, ReadWeights};
use gltf::Document;
use nalgebra::Vector3;

use crate::error::{PipelineError, PipelineResult};
use crate::mesh::attribute::{Handedness, Tangent};
use crate::mesh::{Attribute, AttributeKind, AttributeName, Mesh, SubmeshRange};

use super::ParsedGltf;

/// A decoded primitive, attributes un-transformed and still in local space.
pub struct RawPrimitive {
    pub attributes: Vec<Attribute>,
    pub indices: Vec<u32>,
}

impl RawPrimitive {
    pub fn vertex_count(&self) -> usize {
        self.attribute(&AttributeName::Position)
            .map(|a| a.element_count())
            .unwrap_or(0)
    }

    pub fn attribute(&self, name: &AttributeName) -> Option<&Attribute> {
        self.attributes.iter().find(|a| &a.name == name)
    }
}

/// Read one primitive's vertex streams. Returns `None` if it has no
/// `POSITION` accessor (spec §4.3.1 "Primitive without POSITION: skip with
/// error, produce no mesh").
pub fn load_raw(
    document: &Document,
    buffers: &[buffer::Data],
    mesh_index: usize,
    primitive_index: usize,
) -> Option<RawPrimitive> {
    let mesh = document.meshes().nth(mesh_index)?;
    let prim = mesh.primitives().nth(primitive_index)?;
    let reader = prim.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));

    let positions: Vec<f32> = reader.read_positions()?.flatten().collect();
    let vertex_count = positions.len() / 3;
    let mut attributes = vec![Attribute::new(
        AttributeName::Position,
        AttributeKind::Vec3f,
        positions,
    )];

    let normals: Option<Vec<f32>> = reader.read_normals().map(|it| it.flatten().collect());
    let tangents: Option<Vec<[f32; 4]>> = reader.read_tangents().map(|it| it.collect());

    match (normals, tangents) {
        (Some(normals), Some(tangents))
            if normals.len() / 3 == vertex_count && tangents.len() == vertex_count =>
        {
            push_normal_tangent_bitangent(&mut attributes, &normals, &tangents, vertex_count);
        }
        (Some(normals), Some(_)) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                expected = vertex_count,
                "normal/tangent vertex count mismatch, dropping both"
            );
            if normals.len() / 3 == vertex_count {
                attributes.push(Attribute::new(AttributeName::Normal, AttributeKind::Vec3f, normals));
            }
        }
        (Some(normals), None) if normals.len() / 3 == vertex_count => {
            attributes.push(Attribute::new(AttributeName::Normal, AttributeKind::Vec3f, normals));
        }
        (Some(_), None) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("normal vertex count mismatch, dropping");
        }
        (None, _) => {}
    }

    for (k, target) in reader.read_morph_targets().enumerate() {
        let (target_positions, target_normals, _target_tangents) = target;
        if let Some(iter) = target_positions {
            let vals: Vec<f32> = iter.flatten().collect();
            if vals.len() / 3 == vertex_count {
                attributes.push(Attribute::new(
                    AttributeName::Morph(Box::new(AttributeName::Position), k as u32),
                    AttributeKind::Vec3f,
                    vals,
                ));
            } else {
                #[cfg(feature = "tracing")]
                tracing::warn!(target = k, "morph position vertex count mismatch, dropping");
            }
        }
        if let Some(iter) = target_normals {
            let vals: Vec<f32> = iter.flatten().collect();
            if vals.len() / 3 == vertex_count {
                attributes.push(Attribute::new(
                    AttributeName::Morph(Box::new(AttributeName::Normal), k as u32),
                    AttributeKind::Vec3f,
                    vals,
                ));
            } else {
                #[cfg(feature = "tracing")]
                tracing::warn!(target = k, "morph normal vertex count mismatch, dropping");
            }
        }
    }

    for set in 0u32.. {
        match reader.read_tex_coords(set) {
            Some(tc) => {
                let vals: Vec<f32> = tc.into_f32().flatten().collect();
                if vals.len() / 2 == vertex_count {
                    attributes.push(Attribute::new(
                        AttributeName::TextureCoordinate(set),
                        AttributeKind::Vec2f,
                        vals,
                    ));
                }
            }
            None => break,
        }
    }

    for set in 0u32.. {
        match reader.read_colors(set) {
            Some(colors) => {
                let (kind, vals) = colors_to_f32(colors);
                if vals.len() / kind.components() == vertex_count {
                    attributes.push(Attribute::new(AttributeName::Color(set), kind, vals));
                }
            }
            None => break,
        }
    }

    for set in 0u32.. {
        match reader.read_joints(set) {
            Some(joints) => {
                let vals = joints_to_f32(joints);
                if vals.len() / 4 == vertex_count {
                    attributes.push(Attribute::new(
                        AttributeName::Joints(set),
                        AttributeKind::Vec4f,
                        vals,
                    ));
                }
            }
            None => break,
        }
    }

    for set in 0u32.. {
        match reader.read_weights(set) {
            Some(weights) => {
                let vals = weights_to_f32(weights);
                if vals.len() / 4 == vertex_count {
                    attributes.push(Attribute::new(
                        AttributeName::Weights(set),
                        AttributeKind::Vec4f,
                        vals,
                    ));
                }
            }
            None => break,
        }
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(idx) => idx.into_u32().collect(),
        None => (0..vertex_count as u32).collect(),
    };

    Some(RawPrimitive { attributes, indices })
}

fn push_normal_tangent_bitangent(
    attributes: &mut Vec<Attribute>,
    normals: &[f32],
    tangents: &[[f32; 4]],
    vertex_count: usize,
) {
    attributes.push(Attribute::new(
        AttributeName::Normal,
        AttributeKind::Vec3f,
        normals.to_vec(),
    ));

    let mut tangent_vals = Vec::with_capacity(vertex_count * 3);
    let mut bitangent_vals = Vec::with_capacity(vertex_count * 3);
    for (v, t) in tangents.iter().enumerate() {
        let tangent = Tangent(Vector3::new(t[0], t[1], t[2]), Handedness::from_sign(t[3]));
        let normal = Vector3::new(normals[v * 3], normals[v * 3 + 1], normals[v * 3 + 2]);
        let bitangent = tangent.bitangent(normal);
        tangent_vals.extend_from_slice(&[tangent.0.x, tangent.0.y, tangent.0.z]);
        bitangent_vals.extend_from_slice(&[bitangent.x, bitangent.y, bitangent.z]);
    }
    attributes.push(Attribute::new(
        AttributeName::Tangent,
        AttributeKind::Vec3f,
        tangent_vals,
    ));
    attributes.push(Attribute::new(
        AttributeName::Bitangent,
        AttributeKind::Vec3f,
        bitangent_vals,
    ));
}

fn colors_to_f32(colors: ReadColors) -> (AttributeKind, Vec<f32>) {
    match colors {
        ReadColors::RgbU8(it) => (
            AttributeKind::Vec3f,
            it.flat_map(|c| c.into_iter().map(|v| v as f32 / 255.0)).collect(),
        ),
        ReadColors::RgbU16(it) => (
            AttributeKind::Vec3f,
            it.flat_map(|c| c.into_iter().map(|v| v as f32 / 65535.0)).collect(),
        ),
        ReadColors::RgbF32(it) => (AttributeKind::Vec3f, it.flatten().collect()),
        ReadColors::RgbaU8(it) => (
            AttributeKind::Vec4f,
            it.flat_map(|c| c.into_iter().map(|v| v as f32 / 255.0)).collect(),
        ),
        ReadColors::RgbaU16(it) => (
            AttributeKind::Vec4f,
            it.flat_map(|c| c.into_iter().map(|v| v as f32 / 65535.0)).collect(),
        ),
        ReadColors::RgbaF32(it) => (AttributeKind::Vec4f, it.flatten().collect()),
    }
}

/// Joint indices are never normalized (spec §4.3.1) -- cast straight to `f32`.
fn joints_to_f32(joints: ReadJoints) -> Vec<f32> {
    match joints {
        ReadJoints::U8(it) => it.flat_map(|j| j.into_iter().map(|v| v as f32)).collect(),
        ReadJoints::U16(it) => it.flat_map(|j| j.into_iter().map(|v| v as f32)).collect(),
    }
}

fn weights_to_f32(weights: ReadWeights) -> Vec<f32> {
    match weights {
        ReadWeights::U8(it) => it
            .flat_map(|w| w.into_iter().map(|v| v as f32 / 255.0))
            .collect(),
        ReadWeights::U16(it) => it
            .flat_map(|w| w.into_iter().map(|v| v as f32 / 65535.0))
            .collect(),
        ReadWeights::F32(it) => it.flatten().collect(),
    }
}

/// Materialize an un-transformed primitive for `submesh_index` (spec §3.8's
/// "otherwise returns exactly the primitive at submeshIndex with its vertex
/// attributes un-transformed").
pub fn load_single(parsed: &ParsedGltf, submesh_index: u32) -> PipelineResult<Mesh> {
    let total = parsed.primitives.len();
    if total == 0 || submesh_index as usize >= total {
        return Err(PipelineError::SubmeshOutOfRange {
            max: total.saturating_sub(1) as u32,
        });
    }
    let primitive_ref = &parsed.primitives[submesh_index as usize];
    let raw = load_raw(
        &parsed.document,
        &parsed.buffers,
        primitive_ref.mesh_index,
        primitive_ref.primitive_index,
    )
    .ok_or_else(|| PipelineError::Parse("primitive has no POSITION attribute".to_string()))?;
    Ok(materialize(raw, vec!["material".to_string()]))
}

/// Build the final [`Mesh`] from a single flattened attribute/index set:
/// one sub-mesh spanning the whole index buffer plus the triangle buffer
/// used by the picker (spec §4.3.1 "Triangle buffer").
pub fn materialize(raw: RawPrimitive, materials: Vec<String>) -> Mesh {
    let index_count = raw.indices.len();
    let triangles = triangle_buffer(&raw);
    Mesh {
        attributes: raw.attributes,
        indices: raw.indices,
        submeshes: vec![SubmeshRange {
            start: 0,
            count: index_count as u32,
        }],
        materials,
        metadata: HashMap::new(),
        triangles,
    }
}

fn triangle_buffer(raw: &RawPrimitive) -> Vec<f32> {
    let Some(positions) = raw.attribute(&AttributeName::Position) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(raw.indices.len() * 3);
    for &i in &raw.indices {
        let v = positions.as_vec3(i as usize);
        out.extend_from_slice(&[v.x, v.y, v.z]);
    }
    out
}
