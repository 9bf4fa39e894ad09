//! Path watcher (C1, spec §4.1).
//!
//! Observes absolute paths -- possibly non-existent, possibly with
//! non-existent parents -- and reports one coalesced change event per path
//! after a quiescent period. Driven entirely from the owner's control
//! thread: `notify`'s background thread only ever pushes raw events onto a
//! channel, never touches the tree directly (spec §5's single-writer rule).

mod tree;

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::path::AbsolutePath;
use tree::{NodeIdx, WatchTree};

/// Quiescent period a burst of raw filesystem events must satisfy before a
/// single coalesced change event is emitted for a path (spec §4.1, §6).
pub const COALESCE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error(transparent)]
    Notify(#[from] notify::Error),
}

/// Observes a set of absolute paths for create/modify/delete, coalescing
/// bursts into one logical change event per path.
pub struct PathWatcher {
    inner: RecommendedWatcher,
    raw_rx: Receiver<notify::Result<notify::Event>>,
    tree: WatchTree,
    /// path -> fire time, reset on every raw event that touches it.
    pending: HashMap<AbsolutePath, Instant>,
}

impl PathWatcher {
    pub fn new() -> Result<Self, WatchError> {
        let (tx, raw_rx) = mpsc::channel();
        let inner = RecommendedWatcher::new(
            move |res| {
                // best-effort: if the owner has stopped polling, drop the event
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        Ok(Self {
            inner,
            raw_rx,
            tree: WatchTree::default(),
            pending: HashMap::new(),
        })
    }

    /// Register `path`; idempotent.
    pub fn add(&mut self, path: &AbsolutePath) {
        if self.tree.leaf_idx(path).is_some() {
            return;
        }
        let (_leaf_idx, new_dirs) = self.tree.ensure_leaf(path);
        // watch the first ancestor that actually exists, and every node
        // created between it and the leaf; `new_dirs` is root-ward-first.
        for &idx in &new_dirs {
            let node_path = self.tree.node(idx).path.clone();
            if node_path.exists() {
                self.install_watch(&node_path);
            }
        }
        if path.exists() {
            self.install_watch(path);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path, "watching path");
    }

    /// Unregister `path`; idempotent.
    pub fn remove(&mut self, path: &AbsolutePath) {
        let pruned = self.tree.forget_leaf(path);
        for p in pruned {
            let _ = self.inner.unwatch(p.as_path());
        }
        self.pending.remove(path);
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path, "unwatching path");
    }

    fn install_watch(&mut self, path: &AbsolutePath) {
        if let Err(_e) = self.inner.watch(path.as_path(), RecursiveMode::NonRecursive) {
            #[cfg(feature = "tracing")]
            tracing::warn!(path = %path, error = %_e, "failed to install filesystem watch");
        }
    }

    /// Drain any pending raw events and mark the paths they touch, then
    /// return every path whose coalescing timer has elapsed. Call this
    /// periodically (or right before `loader()` lookups) from the single
    /// control thread; it never blocks.
    pub fn poll_events(&mut self) -> Vec<AbsolutePath> {
        loop {
            match self.raw_rx.try_recv() {
                Ok(Ok(event)) => self.handle_raw_event(event),
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %_e, "filesystem watcher error");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }

        let now = Instant::now();
        let ready: Vec<AbsolutePath> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready
    }

    /// How long until the next coalescing timer expires, for callers that
    /// want to sleep/select rather than busy-poll.
    pub fn time_until_next_deadline(&self) -> Option<Duration> {
        let now = Instant::now();
        self.pending
            .values()
            .map(|deadline| deadline.saturating_duration_since(now))
            .min()
    }

    fn handle_raw_event(&mut self, event: notify::Event) {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
            _ => return,
        }
        for raw_path in event.paths {
            let Ok(path) = AbsolutePath::new(raw_path) else {
                continue;
            };
            if let Some(idx) = self.tree.leaf_idx(&path) {
                self.mark_pending(path.clone());
                self.tree.node_mut(idx).existed_on_last_probe = path.exists();
                continue;
            }
            if let Some(idx) = self.tree.node_idx(&path) {
                self.probe_directory(idx);
            }
        }
    }

    fn mark_pending(&mut self, path: AbsolutePath) {
        self.pending.insert(path, Instant::now() + COALESCE_DELAY);
    }

    /// Re-probe every child of a directory node against the filesystem
    /// (spec §4.1's directory-change algorithm): leaves whose existence
    /// flipped become pending changes, interior directories whose existence
    /// flipped get their own watches re-attached or detached.
    fn probe_directory(&mut self, idx: NodeIdx) {
        let children: Vec<NodeIdx> = self.tree.children_of(idx).collect();
        for child in children {
            let (child_path, was_dir, existed_before) = {
                let node = self.tree.node(child);
                (node.path.clone(), node.is_directory, node.existed_on_last_probe)
            };
            let exists_now = child_path.exists();
            if was_dir {
                if exists_now != existed_before {
                    if exists_now {
                        self.install_watch(&child_path);
                        // a directory reappearing may itself have content
                        // that was already present; re-probe it too
                        self.probe_directory(child);
                    } else {
                        let _ = self.inner.unwatch(child_path.as_path());
                    }
                }
                self.tree.node_mut(child).existed_on_last_probe = exists_now;
                if exists_now {
                    self.probe_directory(child);
                }
            } else if exists_now != existed_before {
                self.tree.node_mut(child).existed_on_last_probe = exists_now;
                if exists_now {
                    self.install_watch(&child_path);
                }
                self.mark_pending(child_path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::thread;

    fn wait_for_change(watcher: &mut PathWatcher, timeout: Duration) -> Vec<AbsolutePath> {
        let deadline = Instant::now() + timeout;
        loop {
            let ready = watcher.poll_events();
            if !ready.is_empty() || Instant::now() >= deadline {
                return ready;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn coalesces_rapid_writes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("b.gltf");
        fs::write(&file, b"{}").unwrap();
        let abs = AbsolutePath::new(file.clone()).unwrap();

        let mut watcher = PathWatcher::new().unwrap();
        watcher.add(&abs);

        for _ in 0..3 {
            fs::write(&file, b"{\"x\":1}").unwrap();
            thread::sleep(Duration::from_millis(10));
        }

        let ready = wait_for_change(&mut watcher, Duration::from_secs(2));
        assert_eq!(ready, vec![abs]);
    }

    #[test]
    fn observes_directory_recreation() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let file = nested.join("c.gltf");
        let abs = AbsolutePath::new(file.clone()).unwrap();

        let mut watcher = PathWatcher::new().unwrap();
        watcher.add(&abs);

        fs::create_dir_all(&nested).unwrap();
        fs::write(&file, b"{}").unwrap();

        let ready = wait_for_change(&mut watcher, Duration::from_secs(2));
        assert_eq!(ready, vec![abs]);
    }

    #[test]
    fn add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.gltf");
        let abs = AbsolutePath::new(file).unwrap();
        let mut watcher = PathWatcher::new().unwrap();
        watcher.add(&abs);
        let node_count_before = watcher.tree.nodes.len();
        watcher.add(&abs);
        assert_eq!(node_count_before, watcher.tree.nodes.len());
    }
}
