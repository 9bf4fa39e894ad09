//! Error kinds surfaced to callers, per spec §7.

use crate::path::AbsolutePath;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors a loader can carry on [`crate::Loader::last_error`] / return from
/// [`crate::Loader::load_mesh`].
///
/// These are never propagated up through the cache (spec §4.4, §7) -- a
/// consumer that gets `None` back from a lookup checks `last_error()`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Parse(String),

    #[error("Git LFS placeholder file detected.")]
    LfsPlaceholder,

    #[error("Selected submesh index is out of valid submesh index range [0, {max}]")]
    SubmeshOutOfRange { max: u32 },

    #[error("skin index {0} out of range")]
    SkinOutOfRange(usize),

    #[error("Mesh file contains no bakeable submeshes.")]
    NoBakeableSubmeshes,

    #[error("no skins in {0}")]
    NoSkins(AbsolutePath),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gltf(#[from] gltf::Error),
}

impl PipelineError {
    /// First 128 bytes of a file start with the Git-LFS pointer signature.
    pub(crate) const LFS_SIGNATURE: &'static [u8] = b"version https://git-lfs";

    pub(crate) fn is_lfs_placeholder(head: &[u8]) -> bool {
        head.starts_with(Self::LFS_SIGNATURE)
    }
}
