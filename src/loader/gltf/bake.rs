//! World-space baking (spec §4.3.1 "Baking mode").

use std::collections::HashMap;

use gltf::Document;
use nalgebra::{Matrix3, Matrix4};

use crate::error::{PipelineError, PipelineResult};
use crate::mesh::{Attribute, AttributeKind, AttributeName, Mesh};

use super::primitive::{load_raw, materialize, RawPrimitive};
use super::ParsedGltf;

struct Instance {
    raw: RawPrimitive,
    world: Matrix4<f32>,
    normal: Matrix3<f32>,
    mesh_index: usize,
}

/// Bake every node-referenced primitive into a single world-space mesh
/// (spec §3.8, §4.3.1). Fails with [`PipelineError::NoBakeableSubmeshes`]
/// if no node references any primitive.
pub fn bake_all(parsed: &ParsedGltf) -> PipelineResult<Mesh> {
    let graph = &parsed.scene_graph;
    let mut instances = Vec::new();

    for (node_index, node) in graph.nodes.iter().enumerate() {
        if node.submeshes.is_empty() {
            continue;
        }
        let world = graph.world_transform(node_index as u32);
        let normal = normal_matrix(&world);
        for &prim_idx in &node.submeshes {
            let Some(primitive_ref) = parsed.primitives.get(prim_idx as usize) else {
                continue;
            };
            if let Some(raw) = load_raw(
                &parsed.document,
                &parsed.buffers,
                primitive_ref.mesh_index,
                primitive_ref.primitive_index,
            ) {
                instances.push(Instance {
                    raw,
                    world,
                    normal,
                    mesh_index: primitive_ref.mesh_index,
                });
            }
        }
    }

    if instances.is_empty() {
        return Err(PipelineError::NoBakeableSubmeshes);
    }

    let mut names: Vec<AttributeName> = Vec::new();
    for instance in &instances {
        for attr in &instance.raw.attributes {
            if !names.contains(&attr.name) {
                names.push(attr.name.clone());
            }
        }
    }

    let total_vertices: usize = instances.iter().map(|i| i.raw.vertex_count()).sum();
    let mut buffers: HashMap<AttributeName, (AttributeKind, Vec<f32>)> = HashMap::new();
    for name in &names {
        let kind = instances
            .iter()
            .find_map(|i| i.raw.attribute(name).map(|a| a.kind))
            .expect("attribute collected from at least one instance");
        buffers.insert(name.clone(), (kind, Vec::with_capacity(total_vertices * kind.components())));
    }

    let mut indices = Vec::new();
    let mut vertex_offset = 0u32;
    let mut metadata = HashMap::new();

    for instance in &instances {
        let vcount = instance.raw.vertex_count();
        let mut renorm_factors = vec![1.0f32; vcount];

        for name in &names {
            let (kind, buf) = buffers.get_mut(name).expect("pre-populated above");
            match instance.raw.attribute(name) {
                Some(attr) => match name {
                    AttributeName::Position => append_positions(attr, &instance.world, buf),
                    AttributeName::Tangent | AttributeName::Bitangent => {
                        append_vectors(attr, &instance.world, buf)
                    }
                    AttributeName::Normal => {
                        append_normals(attr, &instance.normal, buf, &mut renorm_factors)
                    }
                    AttributeName::Morph(inner, _) if matches!(**inner, AttributeName::Position) => {
                        append_positions(attr, &instance.world, buf)
                    }
                    AttributeName::Morph(inner, _) if matches!(**inner, AttributeName::Normal) => {
                        append_morph_normals(attr, &instance.normal, buf, &renorm_factors)
                    }
                    _ => buf.extend_from_slice(&attr.values),
                },
                None => buf.extend(std::iter::repeat(0.0).take(vcount * kind.components())),
            }
        }

        for &i in &instance.raw.indices {
            indices.push(i + vertex_offset);
        }
        vertex_offset += vcount as u32;
        collect_extras(&parsed.document, instance.mesh_index, &mut metadata);
    }

    let attributes = names
        .into_iter()
        .map(|name| {
            let (kind, values) = buffers.remove(&name).expect("populated above");
            Attribute::new(name, kind, values)
        })
        .collect();

    let mut mesh = materialize(RawPrimitive { attributes, indices }, vec!["material".to_string()]);
    mesh.metadata = metadata;
    Ok(mesh)
}

fn normal_matrix(world: &Matrix4<f32>) -> Matrix3<f32> {
    let m3 = world.fixed_view::<3, 3>(0, 0).into_owned();
    m3.try_inverse().map(|inv| inv.transpose()).unwrap_or(m3)
}

fn append_positions(attr: &Attribute, world: &Matrix4<f32>, buf: &mut Vec<f32>) {
    for v in 0..attr.element_count() {
        let p = nalgebra::Point3::from(attr.as_vec3(v));
        let transformed = world.transform_point(&p);
        buf.extend_from_slice(&[transformed.x, transformed.y, transformed.z]);
    }
}

fn append_vectors(attr: &Attribute, world: &Matrix4<f32>, buf: &mut Vec<f32>) {
    for v in 0..attr.element_count() {
        let transformed = world.transform_vector(&attr.as_vec3(v));
        buf.extend_from_slice(&[transformed.x, transformed.y, transformed.z]);
    }
}

/// Transform each normal, then renormalize and record the per-vertex scale
/// factor (spec §4.3.1's "critical numerical subtlety"), so the matching
/// `_Morph_k` normal at the same vertex can be scaled identically.
fn append_normals(attr: &Attribute, normal_matrix: &Matrix3<f32>, buf: &mut Vec<f32>, factors: &mut [f32]) {
    for v in 0..attr.element_count() {
        let transformed = normal_matrix * attr.as_vec3(v);
        let len = transformed.norm();
        let factor = if len > f32::EPSILON { 1.0 / len } else { 1.0 };
        factors[v] = factor;
        let renormalized = transformed * factor;
        buf.extend_from_slice(&[renormalized.x, renormalized.y, renormalized.z]);
    }
}

fn append_morph_normals(attr: &Attribute, normal_matrix: &Matrix3<f32>, buf: &mut Vec<f32>, factors: &[f32]) {
    for v in 0..attr.element_count() {
        let transformed = (normal_matrix * attr.as_vec3(v)) * factors[v];
        buf.extend_from_slice(&[transformed.x, transformed.y, transformed.z]);
    }
}

fn collect_extras(document: &Document, mesh_index: usize, metadata: &mut HashMap<String, String>) {
    let Some(mesh) = document.meshes().nth(mesh_index) else {
        return;
    };
    let Some(extras) = mesh.extras().as_ref() else {
        return;
    };
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(extras.get())
    else {
        return;
    };
    for (key, value) in map {
        if let serde_json::Value::String(s) = value {
            metadata.insert(key, s);
        }
    }
}
