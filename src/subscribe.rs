//! Subscription registry (C2, spec §3.3, §4.2).
//!
//! Lets many callbacks share one [`PathWatcher`] watch per path. Backed by
//! [`stablevec::StableVec`] (see `lib/stablevec`) so that a
//! [`SubscriptionHandle`]'s index stays valid for as long as the handle is
//! alive, no matter what else subscribes or unsubscribes for the same path
//! in the meantime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use stablevec::StableVec;

use crate::path::AbsolutePath;
use crate::watch::{PathWatcher, WatchError};

/// A dependent's change callback. Spec's `fn(absolutePath)` signature.
pub type Callback = Box<dyn FnMut(&AbsolutePath)>;

struct Inner {
    watcher: PathWatcher,
    slots: HashMap<AbsolutePath, StableVec<Callback>>,
    /// Invoked once, synchronously, when the last subscription for a path
    /// is dropped -- this is the "signals C4 to drop the cached loader"
    /// half of spec §3.3; the cache is the one that sets it (§9's design
    /// note: a pure `changed(path)` event injected from outside, so
    /// `subscribe.rs` never references `cache.rs`).
    on_last_unsubscribed: Option<Box<dyn FnMut(&AbsolutePath)>>,
}

/// Multiplexes N callbacks per path onto one [`PathWatcher`].
#[derive(Clone)]
pub struct SubscriptionRegistry(Rc<RefCell<Inner>>);

impl SubscriptionRegistry {
    pub fn new() -> Result<Self, WatchError> {
        Ok(Self(Rc::new(RefCell::new(Inner {
            watcher: PathWatcher::new()?,
            slots: HashMap::new(),
            on_last_unsubscribed: None,
        }))))
    }

    /// Set the hook invoked (with the now-empty path) whenever the last
    /// subscription for that path is dropped. Intended for
    /// [`crate::cache::MeshCache`] to evict its entry.
    pub fn set_on_last_unsubscribed(&self, hook: impl FnMut(&AbsolutePath) + 'static) {
        self.0.borrow_mut().on_last_unsubscribed = Some(Box::new(hook));
    }

    pub fn has_subscribers(&self, path: &AbsolutePath) -> bool {
        self.0
            .borrow()
            .slots
            .get(path)
            .is_some_and(|s| s.len_init() > 0)
    }

    /// Add `callback` to the set registered for `path`. If the set was
    /// empty, asks the watcher to start watching `path`.
    pub fn subscribe(
        &self,
        path: &AbsolutePath,
        callback: impl FnMut(&AbsolutePath) + 'static,
    ) -> SubscriptionHandle {
        let mut inner = self.0.borrow_mut();
        let is_new = !inner.slots.contains_key(path);
        let slot = inner.slots.entry(path.clone()).or_default();
        let index = slot.push(Box::new(callback));
        if is_new {
            inner.watcher.add(path);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path, %index, "subscribed");
        SubscriptionHandle {
            path: path.clone(),
            index,
            inner: Rc::downgrade(&self.0),
        }
    }

    /// Drain the watcher's coalesced change events and fan each out to its
    /// registered callbacks. Returns the list of paths that changed, in the
    /// order the watcher reported them, so callers (the cache) can run
    /// their own pre-dispatch step (`reset()`) before callbacks observe the
    /// change.
    pub fn poll_changed_paths(&self) -> Vec<AbsolutePath> {
        self.0.borrow_mut().watcher.poll_events()
    }

    /// Invoke every callback currently registered for `path`, re-verifying
    /// membership before each call so that a callback may add or remove
    /// other callbacks (for this or any other path) without invalidating
    /// the dispatch loop (spec §4.2).
    pub fn dispatch(&self, path: &AbsolutePath) {
        let indices: Vec<usize> = {
            let inner = self.0.borrow();
            match inner.slots.get(path) {
                Some(slot) => slot.enumerate().map(|(i, _)| i).collect(),
                None => return,
            }
        };

        for index in indices {
            let taken: Option<Callback> = {
                let mut inner = self.0.borrow_mut();
                inner.slots.get_mut(path).and_then(|slot| {
                    if slot.is_init(index) {
                        slot.replace(index, Box::new(|_: &AbsolutePath| {}))
                    } else {
                        None
                    }
                })
            };
            let Some(mut callback) = taken else {
                continue;
            };
            callback(path);
            let mut inner = self.0.borrow_mut();
            if let Some(slot) = inner.slots.get_mut(path) {
                if slot.is_init(index) {
                    slot.replace(index, callback);
                }
            }
        }
    }

    fn unsubscribe(&self, path: &AbsolutePath, index: usize) {
        let mut inner = self.0.borrow_mut();
        let now_empty = match inner.slots.get_mut(path) {
            Some(slot) => {
                slot.remove(index);
                slot.len_init() == 0
            }
            None => false,
        };
        if now_empty {
            inner.slots.remove(path);
            inner.watcher.remove(path);
            #[cfg(feature = "tracing")]
            tracing::debug!(%path, "last subscriber dropped");
            if let Some(hook) = inner.on_last_unsubscribed.as_mut() {
                hook(path);
            }
        }
    }
}

/// RAII handle returned by [`SubscriptionRegistry::subscribe`]. Dropping it
/// unregisters the callback.
pub struct SubscriptionHandle {
    path: AbsolutePath,
    index: usize,
    inner: Weak<RefCell<Inner>>,
}

impl SubscriptionHandle {
    pub fn path(&self) -> &AbsolutePath {
        &self.path
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            SubscriptionRegistry(inner).unsubscribe(&self.path, self.index);
        }
    }
}
