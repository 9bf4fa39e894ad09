//! Mesh cache (C4, spec §3.7, §4.4).
//!
//! Keys loaders by absolute path, constructing them lazily and tearing them
//! down in step with the subscription registry -- per spec §9's "pure
//! `changed(path)` event injected from outside both components" design
//! note, this module is the only place that references both `subscribe`
//! and `loader`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::loader::{Loader, LoaderKind};
use crate::path::AbsolutePath;
use crate::subscribe::SubscriptionRegistry;

/// Path-keyed cache of decoder instances (spec §3.7's mesh cache entry).
pub struct MeshCache {
    entries: Rc<RefCell<HashMap<AbsolutePath, LoaderKind>>>,
}

impl MeshCache {
    /// Build a cache wired to `registry`'s last-unsubscribed hook so an
    /// entry is evicted the moment its last subscription drops (spec
    /// §4.4's "Teardown").
    pub fn new(registry: &SubscriptionRegistry) -> Self {
        let entries: Rc<RefCell<HashMap<AbsolutePath, LoaderKind>>> = Rc::new(RefCell::new(HashMap::new()));
        let evict = entries.clone();
        registry.set_on_last_unsubscribed(move |path| {
            evict.borrow_mut().remove(path);
        });
        Self { entries }
    }

    /// Look up (constructing on first access) the loader for `path`.
    ///
    /// # Panics
    ///
    /// Panics if `path` has no subscription registered in `registry` (spec
    /// §4.4 step 2: "Violation is a programmer error; assert and abort" --
    /// without a subscription nothing would ever invalidate this entry).
    /// Returns `None` only for an unsupported file extension.
    pub fn loader(&self, path: &AbsolutePath, registry: &SubscriptionRegistry) -> Option<LoaderRef<'_>> {
        assert!(
            registry.has_subscribers(path),
            "requested a loader for {path} with no subscription registered; \
             the cache would have no way to invalidate it"
        );
        {
            let mut entries = self.entries.borrow_mut();
            if !entries.contains_key(path) {
                let kind = LoaderKind::for_path(path)?;
                entries.insert(path.clone(), kind);
            }
        }
        Some(LoaderRef {
            entries: &self.entries,
            path: path.clone(),
        })
    }

    /// Drain coalesced changes from `registry` and, for each changed path,
    /// reset the cached loader before fanning out to subscribers (spec
    /// §4.4's "Invalidation").
    pub fn poll(&self, registry: &SubscriptionRegistry) {
        for path in registry.poll_changed_paths() {
            if let Some(loader) = self.entries.borrow_mut().get_mut(&path) {
                loader.reset();
            }
            registry.dispatch(&path);
        }
    }
}

/// A borrowed handle to one cached loader. Exists so that callers don't
/// hold `RefCell` borrows across their own calls into [`Loader`] methods.
pub struct LoaderRef<'a> {
    entries: &'a RefCell<HashMap<AbsolutePath, LoaderKind>>,
    path: AbsolutePath,
}

impl LoaderRef<'_> {
    pub fn with<R>(&self, f: impl FnOnce(&mut LoaderKind) -> R) -> R {
        let mut entries = self.entries.borrow_mut();
        let loader = entries.get_mut(&self.path).expect("inserted by MeshCache::loader");
        f(loader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MeshDescriptor;
    use std::fs;

    fn abs(dir: &tempfile::TempDir, name: &str) -> AbsolutePath {
        AbsolutePath::new(dir.path().join(name)).unwrap()
    }

    #[test]
    fn unsubscribed_path_panics() {
        let dir = tempfile::tempdir().unwrap();
        let path = abs(&dir, "a.gltf");
        let registry = SubscriptionRegistry::new().unwrap();
        let cache = MeshCache::new(&registry);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.loader(&path, &registry)
        }));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_extension_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = abs(&dir, "a.obj");
        let registry = SubscriptionRegistry::new().unwrap();
        let cache = MeshCache::new(&registry);
        let _handle = registry.subscribe(&path, |_| {});
        assert!(cache.loader(&path, &registry).is_none());
    }

    #[test]
    fn dropping_last_subscription_evicts_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = abs(&dir, "a.gltf");
        fs::write(path.as_path(), b"{}").unwrap();
        let registry = SubscriptionRegistry::new().unwrap();
        let cache = MeshCache::new(&registry);
        let handle = registry.subscribe(&path, |_| {});
        assert!(cache.loader(&path, &registry).is_some());
        drop(handle);
        assert_eq!(cache.entries.borrow().len(), 0);
    }

    #[test]
    fn loader_reused_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = abs(&dir, "a.ctm");
        fs::write(path.as_path(), b"not a real ctm file").unwrap();
        let registry = SubscriptionRegistry::new().unwrap();
        let cache = MeshCache::new(&registry);
        let _handle = registry.subscribe(&path, |_| {});
        cache.loader(&path, &registry).unwrap().with(|loader| {
            let _ = loader.load_mesh(&MeshDescriptor {
                path: path.clone(),
                submesh_index: 0,
                bake_all_submeshes: false,
            });
            assert!(loader.last_error().is_some());
        });
        assert_eq!(cache.entries.borrow().len(), 1);
    }
}
