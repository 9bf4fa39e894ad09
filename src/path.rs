//! Absolute path keys (spec §3.1).

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// An absolute, lexically normalized path used as the key across the
/// watcher, subscription registry, and cache.
///
/// Two [`AbsolutePath`] values compare equal iff their normalized forms are
/// equal -- this is a *lexical* normalization (`..`/`.` components and
/// repeated separators collapsed), not `fs::canonicalize`: the whole point
/// of the watcher is to track paths that don't exist yet, so requiring the
/// path to exist in order to key the cache would be backwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsolutePath(PathBuf);

/// A path was not absolute and could not be used to key the pipeline.
#[derive(Debug, thiserror::Error)]
#[error("path is not absolute: {0}")]
pub struct NotAbsoluteError(PathBuf);

impl AbsolutePath {
    /// Normalize `path` into an [`AbsolutePath`].
    ///
    /// # Errors
    ///
    /// Returns [`NotAbsoluteError`] if `path` is not absolute.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, NotAbsoluteError> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(NotAbsoluteError(path));
        }
        Ok(Self(lexically_normalize(&path)))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| Self(p.to_path_buf()))
    }

    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.0.file_name()
    }

    pub fn extension(&self) -> Option<&str> {
        self.0.extension().and_then(|e| e.to_str())
    }

    pub fn join(&self, segment: impl AsRef<Path>) -> Self {
        Self(lexically_normalize(&self.0.join(segment)))
    }

    /// Can this file currently be opened for reading?
    ///
    /// Used by watcher consumers that want to retry a read after an event --
    /// another process (notably an editor on Windows) may still hold the
    /// file when the raw filesystem event arrives (spec §4.1 edge cases).
    pub fn can_open_for_read(&self) -> bool {
        std::fs::File::open(&self.0).is_ok()
    }

    pub fn exists(&self) -> bool {
        self.0.exists()
    }

    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for AbsolutePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<PathBuf> for AbsolutePath {
    type Error = NotAbsoluteError;
    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&Path> for AbsolutePath {
    type Error = NotAbsoluteError;
    fn try_from(value: &Path) -> Result<Self, Self::Error> {
        Self::new(value.to_path_buf())
    }
}

/// Collapse `.`/`..`/repeated-separator components without touching the
/// filesystem (no `canonicalize`, so non-existent components are fine).
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // only pop past the root if there's something to pop
                if matches!(out.components().last(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert!(AbsolutePath::new("a/b.gltf").is_err());
    }

    #[test]
    fn normalizes_dot_components() {
        let p = AbsolutePath::new("/a/./b/../c.gltf").unwrap();
        assert_eq!(p.as_path(), Path::new("/a/c.gltf"));
    }

    #[test]
    fn equal_after_normalization() {
        let a = AbsolutePath::new("/a/b/../b/c.gltf").unwrap();
        let b = AbsolutePath::new("/a/b/c.gltf").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parent_and_join_roundtrip() {
        let p = AbsolutePath::new("/a/b/c.gltf").unwrap();
        let parent = p.parent().unwrap();
        assert_eq!(parent.as_path(), Path::new("/a/b"));
        assert_eq!(parent.join("c.gltf"), p);
    }
}
