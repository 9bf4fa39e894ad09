//! Vertex attribute model (spec §3.4, §6 "well-known attribute names").
//!
//! Generalizes `hedron::data::mesh::primitive::attribute`'s compile-time
//! typed `Attribute`/`AttributeUsage` pair into the dynamically-named,
//! densely-packed `f32` buffers the pipeline needs: hedron never got past
//! `Mesh { primitives: Vec<()> }`, so this is the part of the teacher this
//! crate actually builds out rather than merely adapts.

use std::fmt;
use std::ops::{Div, DivAssign, Mul, MulAssign};

use meshcache_common::impl_mul_div;
use nalgebra::{Vector3, Vector4};

/// The shape of an attribute's per-vertex value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Float,
    Vec2f,
    Vec3f,
    Vec4f,
}

impl AttributeKind {
    pub const fn components(self) -> usize {
        match self {
            Self::Float => 1,
            Self::Vec2f => 2,
            Self::Vec3f => 3,
            Self::Vec4f => 4,
        }
    }
}

/// A well-known attribute name (spec §6). Indexed attribute families
/// (texcoord/color/joints/weights) carry their set index; morph variants
/// wrap the base name they were derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeName {
    Position,
    Normal,
    Tangent,
    Bitangent,
    TextureCoordinate(u32),
    Color(u32),
    Joints(u32),
    Weights(u32),
    Morph(Box<AttributeName>, u32),
}

impl AttributeName {
    /// Render the attribute name the way it's emitted in mesh metadata and
    /// error messages, e.g. `a_TextureCoordinate0`, `a_Position_Morph_2`.
    pub fn base_name(&self) -> String {
        match self {
            Self::Position => "a_Position".to_string(),
            Self::Normal => "a_Normal".to_string(),
            Self::Tangent => "a_Tangent".to_string(),
            Self::Bitangent => "a_Bitangent".to_string(),
            Self::TextureCoordinate(n) => format!("a_TextureCoordinate{n}"),
            Self::Color(n) => format!("a_Color{n}"),
            Self::Joints(n) => format!("a_Joints{n}"),
            Self::Weights(n) => format!("a_Weights{n}"),
            Self::Morph(base, k) => format!("{}_Morph_{k}", base.base_name()),
        }
    }

    /// The un-suffixed base attribute a `_Morph_k` variant was derived
    /// from, per spec §3.4's invariant that the base attribute must exist.
    pub fn morph_base(&self) -> Option<&AttributeName> {
        match self {
            Self::Morph(base, _) => Some(base),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_name())
    }
}

/// A densely packed, named vertex attribute stream.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: AttributeName,
    pub kind: AttributeKind,
    /// `values.len() == element_count() * kind.components()`.
    pub values: Vec<f32>,
}

impl Attribute {
    pub fn new(name: AttributeName, kind: AttributeKind, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len() % kind.components().max(1), 0);
        Self { name, kind, values }
    }

    pub fn element_count(&self) -> usize {
        self.values.len() / self.kind.components().max(1)
    }

    pub fn as_vec3(&self, vertex: usize) -> Vector3<f32> {
        debug_assert_eq!(self.kind, AttributeKind::Vec3f);
        let base = vertex * 3;
        Vector3::new(self.values[base], self.values[base + 1], self.values[base + 2])
    }

    pub fn set_vec3(&mut self, vertex: usize, v: Vector3<f32>) {
        debug_assert_eq!(self.kind, AttributeKind::Vec3f);
        let base = vertex * 3;
        self.values[base] = v.x;
        self.values[base + 1] = v.y;
        self.values[base + 2] = v.z;
    }

    pub fn as_vec4(&self, vertex: usize) -> Vector4<f32> {
        debug_assert_eq!(self.kind, AttributeKind::Vec4f);
        let base = vertex * 4;
        Vector4::new(
            self.values[base],
            self.values[base + 1],
            self.values[base + 2],
            self.values[base + 3],
        )
    }
}

/// The handedness of a tangent attribute's bitangent sign, per the glTF
/// `TANGENT` accessor's fourth (`w`) component.
#[repr(i8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Negative = -1,
    Positive = 1,
}

impl Handedness {
    pub fn from_sign(w: f32) -> Self {
        if w < 0.0 {
            Self::Negative
        } else {
            Self::Positive
        }
    }

    pub fn as_f32(self) -> f32 {
        self as i8 as f32
    }
}

/// A vertex tangent: direction plus bitangent handedness. Kept as its own
/// type (rather than a bare `Vector3`) because the bitangent sign has to
/// ride along through baking -- the same role `hedron`'s own
/// `primitive::attribute::Tangent` played, including reusing
/// `impl_mul_div!` for its scalar arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tangent(pub Vector3<f32>, pub Handedness);

impl_mul_div!(self: Tangent, rhs: f32;
    (Tangent(self.0 * rhs.to_owned(), self.1); self.0 *= rhs.to_owned());
    (Tangent(self.0 / rhs.to_owned(), self.1); self.0 /= rhs.to_owned()));

impl Tangent {
    /// Compute the bitangent: `sign * (normal x tangent.xyz)` (spec §4.3.1).
    pub fn bitangent(&self, normal: Vector3<f32>) -> Vector3<f32> {
        normal.cross(&self.0) * self.1.as_f32()
    }
}
