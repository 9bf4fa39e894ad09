//! OpenCTM decoder (C3, spec §4.3.2).
//!
//! No OpenCTM crate exists in this pipeline's dependency corpus, so this is
//! a from-scratch binary reader for the uncompressed "RAW" OpenCTM
//! container -- field order and semantics grounded on
//! `examples/original_source/components/libMeshLoader/src/{CTMFileLoader,CTMMesh}.cpp`,
//! which built the same shape of mesh (one position attribute, optional
//! normals, UV maps, generic attribute maps, single submesh/material) from
//! the upstream `openctmpp.h` importer. The compressed `MG1`/`MG2` methods
//! (LZMA-backed in the original) are out of scope -- there is no LZMA
//! dependency anywhere in this corpus to ground them on.

use std::collections::HashMap;
use std::io::{self, Read};

use crate::error::{PipelineError, PipelineResult};
use crate::loader::{Loader, MeshDescriptor};
use crate::mesh::{Attribute, AttributeKind, AttributeName, Mesh, SubmeshRange};
use crate::path::AbsolutePath;
use crate::sampler::SamplerData;
use crate::scene::{SceneGraph, Skin};

const MAGIC: &[u8; 4] = b"OCTM";
const METHOD_RAW: &[u8; 4] = b"RAW\0";
const FLAG_HAS_NORMALS: u32 = 0x0001;

#[derive(Debug, thiserror::Error)]
enum CtmError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("not an OpenCTM file (bad magic)")]
    BadMagic,
    #[error("unsupported OpenCTM file format version {0}")]
    UnsupportedVersion(u32),
    #[error("compressed OpenCTM method {0:?} is not supported, only RAW")]
    UnsupportedMethod(String),
    #[error("malformed OpenCTM chunk: expected {0:?}")]
    BadChunkTag(String),
    #[error("OpenCTM comment/name string was not valid UTF-8")]
    BadString,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CtmError> {
        if self.pos + n > self.bytes.len() {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn tag(&mut self) -> Result<[u8; 4], CtmError> {
        Ok(self.take(4)?.try_into().expect("length checked"))
    }

    fn expect_tag(&mut self, expected: &[u8; 4]) -> Result<(), CtmError> {
        let got = self.tag()?;
        if &got != expected {
            return Err(CtmError::BadChunkTag(String::from_utf8_lossy(expected).into_owned()));
        }
        Ok(())
    }

    fn u32(&mut self) -> Result<u32, CtmError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked");
        Ok(u32::from_le_bytes(bytes))
    }

    fn f32(&mut self) -> Result<f32, CtmError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked");
        Ok(f32::from_le_bytes(bytes))
    }

    fn f32_array(&mut self, count: usize) -> Result<Vec<f32>, CtmError> {
        (0..count).map(|_| self.f32()).collect()
    }

    fn u32_array(&mut self, count: usize) -> Result<Vec<u32>, CtmError> {
        (0..count).map(|_| self.u32()).collect()
    }

    /// A length-prefixed string (OpenCTM's name/file-ref/comment encoding).
    fn string(&mut self) -> Result<String, CtmError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CtmError::BadString)
    }
}

fn decode(bytes: &[u8]) -> Result<Mesh, CtmError> {
    let mut cursor = Cursor::new(bytes);

    if cursor.take(4)? != MAGIC {
        return Err(CtmError::BadMagic);
    }
    let version = cursor.u32()?;
    if version != 5 {
        return Err(CtmError::UnsupportedVersion(version));
    }
    let method = cursor.tag()?;
    if &method != METHOD_RAW {
        return Err(CtmError::UnsupportedMethod(
            String::from_utf8_lossy(&method).into_owned(),
        ));
    }

    let vertex_count = cursor.u32()? as usize;
    let triangle_count = cursor.u32()? as usize;
    let uv_map_count = cursor.u32()? as usize;
    let attrib_map_count = cursor.u32()? as usize;
    let flags = cursor.u32()?;
    let _comment = cursor.string()?;

    cursor.expect_tag(b"INDX")?;
    let indices = cursor.u32_array(3 * triangle_count)?;

    cursor.expect_tag(b"VERT")?;
    let positions = cursor.f32_array(3 * vertex_count)?;

    let mut attributes = vec![Attribute::new(
        AttributeName::Position,
        AttributeKind::Vec3f,
        positions,
    )];

    if flags & FLAG_HAS_NORMALS != 0 {
        cursor.expect_tag(b"NORM")?;
        let normals = cursor.f32_array(3 * vertex_count)?;
        attributes.push(Attribute::new(AttributeName::Normal, AttributeKind::Vec3f, normals));
    }

    let mut metadata = HashMap::new();
    for i in 0..uv_map_count {
        cursor.expect_tag(b"TEXC")?;
        let name = cursor.string()?;
        let _file_ref = cursor.string()?;
        let uv = cursor.f32_array(2 * vertex_count)?;
        attributes.push(Attribute::new(
            AttributeName::TextureCoordinate(i as u32),
            AttributeKind::Vec2f,
            uv,
        ));
        metadata.insert(format!("uv_map_{i}_name"), name);
    }

    for i in 0..attrib_map_count {
        cursor.expect_tag(b"ATTR")?;
        let name = cursor.string()?;
        let data = cursor.f32_array(4 * vertex_count)?;
        attributes.push(Attribute::new(
            AttributeName::Color(i as u32),
            AttributeKind::Vec4f,
            data,
        ));
        metadata.insert(format!("attrib_map_{i}_name"), name);
    }

    let index_count = indices.len();
    let triangles = {
        let positions = attributes
            .iter()
            .find(|a| a.name == AttributeName::Position)
            .expect("just inserted");
        let mut out = Vec::with_capacity(index_count * 3);
        for &i in &indices {
            let v = positions.as_vec3(i as usize);
            out.extend_from_slice(&[v.x, v.y, v.z]);
        }
        out
    };

    Ok(Mesh {
        attributes,
        indices,
        submeshes: vec![SubmeshRange {
            start: 0,
            count: index_count as u32,
        }],
        materials: vec!["material".to_string()],
        metadata,
        triangles,
    })
}

/// Lazily-parsed OpenCTM loader. No scene graph, no animations, no skins
/// (spec §4.3.2).
pub struct CtmLoader {
    path: AbsolutePath,
    parsed: Option<Result<Mesh, PipelineError>>,
    last_error: Option<String>,
}

impl CtmLoader {
    pub fn new(path: AbsolutePath) -> Self {
        Self {
            path,
            parsed: None,
            last_error: None,
        }
    }

    fn require_parsed(&mut self) -> PipelineResult<&Mesh> {
        if self.parsed.is_none() {
            self.parsed = Some(load_file(&self.path));
        }
        match self.parsed.as_ref().expect("just populated") {
            Ok(mesh) => Ok(mesh),
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(PipelineError::Parse(err.to_string()))
            }
        }
    }
}

fn load_file(path: &AbsolutePath) -> PipelineResult<Mesh> {
    let mut file = std::fs::File::open(path.as_path())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    decode(&bytes).map_err(|err| PipelineError::Parse(err.to_string()))
}

impl Loader for CtmLoader {
    fn load_mesh(&mut self, descriptor: &MeshDescriptor) -> Option<Mesh> {
        if descriptor.submesh_index != 0 {
            self.last_error = Some(
                PipelineError::SubmeshOutOfRange { max: 0 }.to_string(),
            );
            return None;
        }
        self.require_parsed().ok().cloned()
    }

    fn scenegraph(&mut self) -> Option<&SceneGraph> {
        None
    }

    fn mesh_count(&mut self) -> u32 {
        1
    }

    fn sampler_data(&mut self, _animation_index: usize, _sampler_index: usize) -> Option<SamplerData> {
        None
    }

    fn load_skin(&mut self, _index: usize) -> PipelineResult<Skin> {
        Err(PipelineError::NoSkins(self.path.clone()))
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn reset(&mut self) {
        self.parsed = None;
        self.last_error = None;
    }
}
