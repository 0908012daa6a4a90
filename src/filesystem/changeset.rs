// src/filesystem/changeset.rs

//! Change-set trie for differential layer migration
//!
//! The source daemon reports every path touched in a container's writable
//! layer, parents included: adding `/root/padd/subadd` also reports `/root`
//! and `/root/padd` as changed. Copying every entry would copy the same
//! subtree several times, so the list is folded into a trie and only the
//! leaves are applied.
//!
//! # Design
//!
//! - **Arena Allocation**: nodes live in a `Vec` and are referenced by
//!   [`NodeId`], the same layout the VFS tree uses.
//! - **Collapse rule**: a node that already exists when an insertion passes
//!   through it (or ends on it) becomes [`NodeOp::Ignore`]. Directory entries
//!   are always inserted before their children, so every interior node ends
//!   up ignored. A change to a directory's own metadata is lost when it also
//!   has changed children, and two records for the exact same path cancel
//!   each other out. Both are accepted.
//! - **Bind mounts**: paths that are bind-mount destinations belong to the
//!   host, not to the layer, and are dropped before insertion.

use std::collections::{BTreeMap, VecDeque};

use tracing::trace;

use crate::types::{ChangeKind, ContainerChange};

/// Index into the trie arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// What to do with a node when the trie is flattened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOp {
    Apply(ChangeKind),
    Ignore,
}

#[derive(Debug)]
struct ChangeNode {
    path: String,
    op: NodeOp,
    /// Ordered so that `filter` output is deterministic
    children: BTreeMap<String, NodeId>,
}

/// Path-indexed trie of container changes
#[derive(Debug)]
pub struct ChangeSetTrie {
    nodes: Vec<ChangeNode>,
    root: NodeId,
}

impl Default for ChangeSetTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSetTrie {
    /// Create a trie holding only the root, which is never applied
    pub fn new() -> Self {
        let root = ChangeNode {
            path: "/".to_string(),
            op: NodeOp::Ignore,
            children: BTreeMap::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Insert one change
    ///
    /// Empty segments are skipped, so `//a///b` and `/a/b` name the same node.
    pub fn insert(&mut self, path: &str, kind: ChangeKind) {
        let mut current = self.root;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let existing = self.nodes[current.0].children.get(segment).copied();
            current = match existing {
                Some(id) => {
                    self.nodes[id.0].op = NodeOp::Ignore;
                    id
                }
                None => {
                    let parent_path = &self.nodes[current.0].path;
                    let node_path = if parent_path == "/" {
                        format!("/{}", segment)
                    } else {
                        format!("{}/{}", parent_path, segment)
                    };
                    let id = NodeId(self.nodes.len());
                    self.nodes.push(ChangeNode {
                        path: node_path,
                        op: NodeOp::Apply(kind),
                        children: BTreeMap::new(),
                    });
                    self.nodes[current.0]
                        .children
                        .insert(segment.to_string(), id);
                    id
                }
            };
        }
    }

    /// Operation recorded for a path, if the path is in the trie
    pub fn op(&self, path: &str) -> Option<NodeOp> {
        let mut current = self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = *self.nodes[current.0].children.get(segment)?;
        }
        Some(self.nodes[current.0].op)
    }

    /// Breadth-first walk yielding every node that is still applied
    pub fn filter(&self) -> Vec<ContainerChange> {
        let mut changes = Vec::new();
        let mut queue = VecDeque::from([self.root]);

        while let Some(id) = queue.pop_front() {
            let node = &self.nodes[id.0];
            if let NodeOp::Apply(kind) = node.op {
                changes.push(ContainerChange::new(node.path.clone(), kind));
            }
            queue.extend(node.children.values().copied());
        }

        changes
    }
}

/// Reduce a daemon change list to the leaf operations worth applying
///
/// `exclusions` is keyed by mount destination; a change whose path equals a
/// key exactly is dropped.
pub fn reduce_changes<V>(
    changes: &[ContainerChange],
    exclusions: &BTreeMap<String, V>,
) -> Vec<ContainerChange> {
    let mut trie = ChangeSetTrie::new();
    for change in changes {
        if exclusions.contains_key(&change.path) {
            trace!("Skipping bind mount destination {}", change.path);
            continue;
        }
        trie.insert(&change.path, change.kind);
    }
    trie.filter()
}
