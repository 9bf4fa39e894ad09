//! Watch-node tree (spec §3.2).
//!
//! Mirrors the directory prefix of every watched file. Parent links are
//! indices into an arena, never owning pointers -- the teacher's own
//! `DataSet`/`Node` graph in `hedron::data` uses the same index-not-pointer
//! discipline for exactly the reason spec §9 calls out: a `parent`
//! back-reference that owns its parent is a cycle.

use std::collections::HashMap;
use std::ffi::OsString;

use crate::path::AbsolutePath;

pub(crate) type NodeIdx = usize;

#[derive(Debug)]
pub(crate) struct WatchNode {
    pub(crate) path: AbsolutePath,
    pub(crate) parent: Option<NodeIdx>,
    pub(crate) children: HashMap<OsString, NodeIdx>,
    pub(crate) is_directory: bool,
    pub(crate) existed_on_last_probe: bool,
    /// Number of leaves (watched files) at or beneath this node. Used to
    /// prune interior nodes once nothing below them is watched anymore.
    pub(crate) watch_count: usize,
}

/// The tree of directories and files currently under watch, rooted at the
/// shortest common ancestor of every watched file that's actually present
/// on disk.
#[derive(Debug, Default)]
pub(crate) struct WatchTree {
    pub(crate) nodes: Vec<Option<WatchNode>>,
    /// path -> index, for every node (leaf or interior).
    pub(crate) by_path: HashMap<AbsolutePath, NodeIdx>,
    /// Leaves only: path -> index. Kept alongside `by_path` per spec §3.2.
    pub(crate) leaves: HashMap<AbsolutePath, NodeIdx>,
}

impl WatchTree {
    pub(crate) fn node(&self, idx: NodeIdx) -> &WatchNode {
        self.nodes[idx].as_ref().expect("dangling watch-node index")
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIdx) -> &mut WatchNode {
        self.nodes[idx].as_mut().expect("dangling watch-node index")
    }

    fn insert_node(&mut self, node: WatchNode) -> NodeIdx {
        let path = node.path.clone();
        let idx = self.nodes.len();
        self.nodes.push(Some(node));
        self.by_path.insert(path, idx);
        idx
    }

    /// Ensure every ancestor of `leaf` (down to the first ancestor that
    /// exists on disk, or the filesystem root) has a node, and that `leaf`
    /// itself has a leaf node. Returns the leaf's index and the ordered
    /// list of directory nodes a watch should be installed on (innermost
    /// last, so callers can watch the first-existing ancestor first).
    pub(crate) fn ensure_leaf(&mut self, leaf: &AbsolutePath) -> (NodeIdx, Vec<NodeIdx>) {
        if let Some(&idx) = self.leaves.get(leaf) {
            self.node_mut(idx).watch_count += 1;
            return (idx, Vec::new());
        }

        // Walk from `leaf` toward the root, collecting ancestors that don't
        // yet have a node, and stop climbing past the first one that
        // actually exists on disk -- that's the deepest ancestor a watch
        // needs to be installed on (spec §4.1); every directory further up
        // already exists and has nothing to watch for, so it gets no node
        // here at all.
        let mut chain = vec![leaf.clone()];
        let mut cursor = leaf.clone();
        while let Some(parent) = cursor.parent() {
            if self.by_path.contains_key(&parent) {
                break;
            }
            let parent_exists = parent.exists();
            chain.push(parent.clone());
            cursor = parent;
            if parent_exists {
                break;
            }
        }

        // `chain` is leaf-to-root-ward; build root-ward-to-leaf so each
        // node can record its parent index as it's created.
        chain.reverse();
        let mut parent_idx = chain[0]
            .parent()
            .and_then(|p| self.by_path.get(&p).copied());

        let mut new_dirs = Vec::new();
        let mut leaf_idx = 0;
        for (i, path) in chain.iter().enumerate() {
            let is_leaf = i == chain.len() - 1;
            let existed = path.exists();
            let idx = self.insert_node(WatchNode {
                path: path.clone(),
                parent: parent_idx,
                children: HashMap::new(),
                is_directory: !is_leaf || path.is_dir(),
                existed_on_last_probe: existed,
                watch_count: if is_leaf { 1 } else { 0 },
            });
            if let Some(p) = parent_idx {
                if let Some(name) = path.as_path().file_name() {
                    self.node_mut(p).children.insert(name.to_owned(), idx);
                }
            }
            if !is_leaf {
                new_dirs.push(idx);
            } else {
                leaf_idx = idx;
                self.leaves.insert(path.clone(), idx);
            }
            parent_idx = Some(idx);
        }

        // propagate +1 watch_count up through the pre-existing ancestors
        let mut up = self.node(leaf_idx).parent;
        while let Some(p) = up {
            self.node_mut(p).watch_count += 1;
            up = self.node(p).parent;
        }

        (leaf_idx, new_dirs)
    }

    /// Drop a leaf's watch; prunes any ancestor directory nodes that no
    /// longer have anything beneath them worth watching. Returns the set of
    /// now-unwatched directory paths (for unwatching at the OS level).
    pub(crate) fn forget_leaf(&mut self, leaf: &AbsolutePath) -> Vec<AbsolutePath> {
        let Some(idx) = self.leaves.remove(leaf) else {
            return Vec::new();
        };

        let mut pruned = Vec::new();
        let mut cursor = Some(idx);
        while let Some(i) = cursor {
            let parent = self.node(i).parent;
            self.node_mut(i).watch_count = self.node(i).watch_count.saturating_sub(1);
            if self.node(i).watch_count == 0 {
                let path = self.node(i).path.clone();
                if let Some(p) = parent {
                    if let Some(name) = path.as_path().file_name() {
                        self.node_mut(p).children.remove(name);
                    }
                }
                self.by_path.remove(&path);
                self.nodes[i] = None;
                pruned.push(path);
            }
            cursor = parent;
        }
        pruned
    }

    pub(crate) fn leaf_idx(&self, path: &AbsolutePath) -> Option<NodeIdx> {
        self.leaves.get(path).copied()
    }

    pub(crate) fn node_idx(&self, path: &AbsolutePath) -> Option<NodeIdx> {
        self.by_path.get(path).copied()
    }

    pub(crate) fn children_of(&self, idx: NodeIdx) -> impl Iterator<Item = NodeIdx> + '_ {
        self.node(idx).children.values().copied()
    }
}
