//! Format decoders and the polymorphic loader interface (C3, spec §4.3).
//!
//! The glTF and OpenCTM loaders share one interface but have disjoint
//! state; per spec §9's explicit instruction, that's modeled as a tagged
//! variant ([`LoaderKind`]) rather than a trait object/inheritance
//! hierarchy.

pub mod ctm;
pub mod gltf;

use crate::anim::SamplerData;
use crate::error::PipelineResult;
use crate::mesh::Mesh;
use crate::path::AbsolutePath;
use crate::scene::{Skin, SceneGraph};

/// Input to [`Loader::load_mesh`] (spec §3.8).
#[derive(Debug, Clone)]
pub struct MeshDescriptor {
    pub path: AbsolutePath,
    pub submesh_index: u32,
    pub bake_all_submeshes: bool,
}

/// The operations exposed by a cache entry (spec §3.7, §6).
pub trait Loader {
    fn load_mesh(&mut self, descriptor: &MeshDescriptor) -> Option<Mesh>;
    fn scenegraph(&mut self) -> Option<&SceneGraph>;
    fn mesh_count(&mut self) -> u32;
    fn sampler_data(&mut self, animation_index: usize, sampler_index: usize) -> Option<SamplerData>;
    fn load_skin(&mut self, index: usize) -> PipelineResult<Skin>;
    fn last_error(&self) -> Option<&str>;
    fn reset(&mut self);
}

/// Dispatch by extension to the right decoder (spec §4.3's dispatch rule).
pub enum LoaderKind {
    Gltf(gltf::GltfLoader),
    Ctm(ctm::CtmLoader),
}

impl LoaderKind {
    /// Construct the right decoder for `path`'s extension, or `None` for an
    /// unsupported extension ("no loader", spec §4.3).
    pub fn for_path(path: &AbsolutePath) -> Option<Self> {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("gltf") || ext.eq_ignore_ascii_case("glb") => {
                Some(Self::Gltf(gltf::GltfLoader::new(path.clone())))
            }
            Some(ext) if ext.eq_ignore_ascii_case("ctm") => {
                Some(Self::Ctm(ctm::CtmLoader::new(path.clone())))
            }
            _ => None,
        }
    }
}

impl Loader for LoaderKind {
    fn load_mesh(&mut self, descriptor: &MeshDescriptor) -> Option<Mesh> {
        match self {
            Self::Gltf(l) => l.load_mesh(descriptor),
            Self::Ctm(l) => l.load_mesh(descriptor),
        }
    }

    fn scenegraph(&mut self) -> Option<&SceneGraph> {
        match self {
            Self::Gltf(l) => l.scenegraph(),
            Self::Ctm(l) => l.scenegraph(),
        }
    }

    fn mesh_count(&mut self) -> u32 {
        match self {
            Self::Gltf(l) => l.mesh_count(),
            Self::Ctm(l) => l.mesh_count(),
        }
    }

    fn sampler_data(&mut self, animation_index: usize, sampler_index: usize) -> Option<SamplerData> {
        match self {
            Self::Gltf(l) => l.sampler_data(animation_index, sampler_index),
            Self::Ctm(l) => l.sampler_data(animation_index, sampler_index),
        }
    }

    fn load_skin(&mut self, index: usize) -> PipelineResult<Skin> {
        match self {
            Self::Gltf(l) => l.load_skin(index),
            Self::Ctm(l) => l.load_skin(index),
        }
    }

    fn last_error(&self) -> Option<&str> {
        match self {
            Self::Gltf(l) => l.last_error(),
            Self::Ctm(l) => l.last_error(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Gltf(l) => l.reset(),
            Self::Ctm(l) => l.reset(),
        }
    }
}
