//! Small macro utilities shared by the mesh pipeline crates.
//!
//! Kept as its own crate so operator-overload boilerplate (`impl_mul_div!`,
//! used by the vertex-tangent arithmetic in `src/mesh/attribute.rs`) doesn't
//! have to live in the main crate just to be `#[macro_export]`-able.

pub mod macros;
