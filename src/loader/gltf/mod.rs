//! glTF 2.0 decoder (C3, spec §4.3.1).
//!
//! Parses `.gltf`/`.glb` via the `gltf` crate (which already resolves
//! accessor/buffer-view/sparse-accessor indirection through its `Reader`
//! API) into a [`ParsedGltf`], then materializes a [`crate::mesh::Mesh`]
//! from it on demand -- either a single un-transformed primitive
//! ([`primitive::load_single`]) or the whole scene baked into world space
//! ([`bake::bake_all`]).

mod bake;
mod primitive;
mod scenegraph;

use std::io::Read;

use gltf::buffer;
use gltf::Document;

use crate::anim;
use crate::error::{PipelineError, PipelineResult};
use crate::loader::{Loader, MeshDescriptor};
use crate::mesh::Mesh;
use crate::path::AbsolutePath;
use crate::sampler::SamplerData;
use crate::scene::{SceneGraph, Skin};

struct FlatPrimitiveRef {
    mesh_index: usize,
    primitive_index: usize,
}

struct ParsedGltf {
    document: Document,
    buffers: Vec<buffer::Data>,
    scene_graph: SceneGraph,
    primitives: Vec<FlatPrimitiveRef>,
}

/// Lazily-parsed glTF loader: nothing is read from disk until the first
/// call that needs the document (spec §3.7's "created on first `loadMesh`"
/// lifetime, generalized to every accessor here).
pub struct GltfLoader {
    path: AbsolutePath,
    parsed: Option<Result<ParsedGltf, PipelineError>>,
    last_error: Option<String>,
}

impl GltfLoader {
    pub fn new(path: AbsolutePath) -> Self {
        Self {
            path,
            parsed: None,
            last_error: None,
        }
    }

    fn require_parsed(&mut self) -> PipelineResult<&mut ParsedGltf> {
        if self.parsed.is_none() {
            self.parsed = Some(import(&self.path));
        }
        match self.parsed.as_mut().expect("just populated") {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                let message = err.to_string();
                self.last_error = Some(message.clone());
                Err(PipelineError::Parse(message))
            }
        }
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        self.last_error = Some(err.to_string());
        err
    }
}

impl Loader for GltfLoader {
    fn load_mesh(&mut self, descriptor: &MeshDescriptor) -> Option<Mesh> {
        let bake_all = descriptor.bake_all_submeshes;
        let submesh_index = descriptor.submesh_index;
        let parsed = self.require_parsed().ok()?;
        let result = if bake_all {
            bake::bake_all(parsed)
        } else {
            primitive::load_single(parsed, submesh_index)
        };
        match result {
            Ok(mesh) => {
                self.last_error = None;
                Some(mesh)
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn scenegraph(&mut self) -> Option<&SceneGraph> {
        self.require_parsed().ok().map(|p| &p.scene_graph)
    }

    fn mesh_count(&mut self) -> u32 {
        self.require_parsed()
            .map(|p| p.primitives.len() as u32)
            .unwrap_or(0)
    }

    fn sampler_data(&mut self, animation_index: usize, sampler_index: usize) -> Option<SamplerData> {
        let parsed = self.require_parsed().ok()?;
        anim::extract(&parsed.document, &parsed.buffers, animation_index, sampler_index)
    }

    fn load_skin(&mut self, index: usize) -> PipelineResult<Skin> {
        let path = self.path.clone();
        let parsed = self.require_parsed()?;
        if parsed.scene_graph.skins.is_empty() {
            return Err(self.fail(PipelineError::NoSkins(path)));
        }
        parsed
            .scene_graph
            .skins
            .get(index)
            .cloned()
            .ok_or_else(|| self.fail(PipelineError::SkinOutOfRange(index)))
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn reset(&mut self) {
        self.parsed = None;
        self.last_error = None;
    }
}

/// Parse `path`, distinguishing a genuine parse failure from a Git-LFS
/// placeholder file (spec §4.3.1 step 1, §7).
fn import(path: &AbsolutePath) -> Result<ParsedGltf, PipelineError> {
    match gltf::import(path.as_path()) {
        Ok((document, buffers, _images)) => {
            let built = scenegraph::build(&document);
            Ok(ParsedGltf {
                document,
                buffers,
                scene_graph: built.scene_graph,
                primitives: built.primitives,
            })
        }
        Err(err) => {
            let message = err.to_string();
            if looks_like_lfs_failure(&message) {
                if let Ok(head) = read_head(path) {
                    if PipelineError::is_lfs_placeholder(&head) {
                        return Err(PipelineError::LfsPlaceholder);
                    }
                }
            }
            Err(PipelineError::Gltf(err))
        }
    }
}

fn looks_like_lfs_failure(message: &str) -> bool {
    message.contains("parse_error") || message.contains("Invalid magic.")
}

fn read_head(path: &AbsolutePath) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path.as_path())?;
    let mut buf = vec![0u8; 128];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}
