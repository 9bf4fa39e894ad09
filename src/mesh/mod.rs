//! Uniform mesh model (spec §3.4) -- the decoder output shared by every
//! format in `loader`.

pub mod attribute;

use std::collections::HashMap;

pub use attribute::{Attribute, AttributeKind, AttributeName};

/// A contiguous range of the index buffer drawn with a single material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmeshRange {
    pub start: u32,
    pub count: u32,
}

/// The decoder output shared by every format: a flat vertex-attribute set,
/// an index buffer, submesh ranges, materials, and a picking-friendly
/// triangle buffer.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub attributes: Vec<Attribute>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<SubmeshRange>,
    pub materials: Vec<String>,
    pub metadata: HashMap<String, String>,
    /// Flattened vec3 positions in triangle order, `3 * num_triangles`
    /// long; consumed by the renderer's picker (spec §4.3.1).
    pub triangles: Vec<f32>,
}

impl Mesh {
    pub fn num_vertices(&self) -> usize {
        self.attributes
            .iter()
            .find(|a| a.name == AttributeName::Position)
            .map(|a| a.element_count())
            .unwrap_or(0)
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn attribute(&self, name: &AttributeName) -> Option<&Attribute> {
        self.attributes.iter().find(|a| &a.name == name)
    }

    /// Validate the invariants in spec §3.4: every attribute matches the
    /// vertex count, the index buffer is triangle-aligned and in bounds,
    /// submeshes partition the index buffer, and every `_Morph_k`
    /// attribute has a same-length base counterpart.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.num_vertices();
        for attr in &self.attributes {
            if attr.element_count() != n {
                return Err(format!(
                    "attribute {} has {} elements, expected {n}",
                    attr.name,
                    attr.element_count()
                ));
            }
            if let Some(base) = attr.name.morph_base() {
                let base_attr = self
                    .attribute(base)
                    .ok_or_else(|| format!("morph attribute {} has no base {base}", attr.name))?;
                if base_attr.element_count() != attr.element_count() {
                    return Err(format!("morph attribute {} length mismatch with base", attr.name));
                }
            }
        }
        if self.indices.len() % 3 != 0 {
            return Err("index buffer length is not a multiple of 3".to_string());
        }
        for &i in &self.indices {
            if i as usize >= n {
                return Err(format!("index {i} out of bounds for {n} vertices"));
            }
        }
        let mut covered = 0u32;
        for range in &self.submeshes {
            if range.start != covered {
                return Err("submesh ranges do not tile the index buffer contiguously".to_string());
            }
            covered += range.count;
        }
        if covered as usize != self.indices.len() {
            return Err("submesh ranges do not cover the whole index buffer".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_attr(n: usize) -> Attribute {
        Attribute::new(AttributeName::Position, AttributeKind::Vec3f, vec![0.0; n * 3])
    }

    #[test]
    fn validate_accepts_well_formed_mesh() {
        let mesh = Mesh {
            attributes: vec![pos_attr(3)],
            indices: vec![0, 1, 2],
            submeshes: vec![SubmeshRange { start: 0, count: 3 }],
            ..Default::default()
        };
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.num_vertices(), 3);
        assert_eq!(mesh.num_triangles(), 1);
    }

    #[test]
    fn validate_rejects_out_of_bounds_index() {
        let mesh = Mesh {
            attributes: vec![pos_attr(3)],
            indices: vec![0, 1, 5],
            submeshes: vec![SubmeshRange { start: 0, count: 3 }],
            ..Default::default()
        };
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_morph_base() {
        let mut mesh = Mesh {
            attributes: vec![pos_attr(3)],
            indices: vec![0, 1, 2],
            submeshes: vec![SubmeshRange { start: 0, count: 3 }],
            ..Default::default()
        };
        mesh.attributes.push(Attribute::new(
            AttributeName::Morph(Box::new(AttributeName::Normal), 0),
            AttributeKind::Vec3f,
            vec![0.0; 9],
        ));
        assert!(mesh.validate().is_err());
    }
}
