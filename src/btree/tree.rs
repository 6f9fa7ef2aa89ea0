//! # Tree Driver
//!
//! The `BTree` owns a `PageStore` and a root page id, and wires the node
//! engine into a complete ordered index. All structural intelligence lives
//! in the node layer; the driver contributes descent and restart logic.
//!
//! ## Insert
//!
//! ```text
//! 1. Descend to the leaf covering the key, remembering the parent
//! 2. Try the node-level insert; done on success
//! 3. On failure the leaf is full: split it and restart from the root
//!    (the key may belong to either half)
//! 4. A split needs parent space for the separator; when the parent is
//!    full too, re-descend to the parent and split *it* first, again
//!    restarting afterwards
//! 5. Splitting the root installs a fresh inner root above it beforehand
//! ```
//!
//! The restart discipline keeps every split a purely local two-page
//! rebuild; there is no hand-over-hand path state to repair.
//!
//! ## Remove
//!
//! ```text
//! 1. Descend to the leaf, remembering (parent, child index)
//! 2. Node-level remove; absent keys return false
//! 3. If the leaf became underfull, merge it into its right sibling via
//!    the parent; if that leaves the parent underfull, re-descend and
//!    continue merging one level up
//! ```
//!
//! An underfull root is left in place; the descent handles an inner root
//! with zero slots through its `upper` child.
//!
//! ## Lookup Aliasing
//!
//! `lookup` returns a payload slice borrowed from page memory. The borrow
//! checker pins the tree for as long as the view lives, which is exactly
//! the contract: views are valid until the next mutating call.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::storage::{PageId, PageStore};

use super::node::{NodeMut, NodeRef, SearchResult, CHILD_REF_SIZE, MAX_ENTRY_SIZE, MAX_KEY_SIZE};
use super::split::{build_merge, build_split};

pub struct BTree {
    store: PageStore,
    root: PageId,
}

impl BTree {
    /// Creates an empty tree: a single leaf root with unbounded fences.
    pub fn new() -> Result<Self> {
        let mut store = PageStore::new();
        let root = store.alloc()?;
        NodeMut::init_leaf(store.page_mut(root));
        Ok(Self { store, root })
    }

    /// Point lookup. The returned payload is a view into page memory and
    /// stays valid until the next mutating call on the tree.
    pub fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        let mut node_id = self.root;
        loop {
            let node = NodeRef::new(self.store.page(node_id));
            if node.is_leaf() {
                return match node.lower_bound(key) {
                    SearchResult::Found(pos) => Some(node.payload(pos)),
                    SearchResult::NotFound(_) => None,
                };
            }
            node_id = node.child_or_upper(node.lower_bound(key).index());
        }
    }

    /// Inserts a key/payload pair, splitting nodes as needed. Re-inserting
    /// a present key overwrites its payload.
    pub fn insert(&mut self, key: &[u8], payload: &[u8]) -> Result<()> {
        ensure!(
            key.len() <= MAX_KEY_SIZE,
            "key length {} exceeds maximum {}",
            key.len(),
            MAX_KEY_SIZE
        );
        ensure!(
            key.len() + payload.len() <= MAX_ENTRY_SIZE,
            "entry size {} exceeds maximum {}",
            key.len() + payload.len(),
            MAX_ENTRY_SIZE
        );
        loop {
            let (leaf_id, parent_id, _) = self.descend(key, None);
            if NodeMut::new(self.store.page_mut(leaf_id)).insert(key, payload) {
                return Ok(());
            }
            // leaf is full: split, then retry from the root
            self.split_node(leaf_id, parent_id, key)?;
        }
    }

    /// Removes a key. Returns `false` when the key is not present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let mut merge_target: Option<PageId> = None;
        loop {
            let (node_id, parent_id, pos) = self.descend(key, merge_target);
            if merge_target.is_none() {
                let mut node = NodeMut::new(self.store.page_mut(node_id));
                if !node.remove(key) {
                    return false;
                }
                if !node.as_ref().is_underfull() {
                    return true;
                }
                merge_target = Some(node_id);
            }
            debug_assert_eq!(merge_target, Some(node_id));
            let Some(parent_id) = parent_id else {
                return true; // an underfull root stays in place
            };
            if self.merge_children_check(parent_id, pos)
                && NodeRef::new(self.store.page(parent_id)).is_underfull()
            {
                merge_target = Some(parent_id);
            } else {
                return true;
            }
        }
    }

    /// In-order traversal over `(full_key, payload)` pairs.
    pub fn for_each(&self, mut f: impl FnMut(&[u8], &[u8])) {
        self.walk(self.root, &mut f);
    }

    /// Frees every page of the current tree and installs a fresh empty
    /// leaf root.
    pub fn clear(&mut self) -> Result<()> {
        self.free_subtree(self.root);
        let root = self.store.alloc()?;
        NodeMut::init_leaf(self.store.page_mut(root));
        self.root = root;
        Ok(())
    }

    /// Number of levels from the root down to the leaves.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut node_id = self.root;
        loop {
            let node = NodeRef::new(self.store.page(node_id));
            if node.is_leaf() {
                return depth;
            }
            node_id = node.upper();
            depth += 1;
        }
    }

    /// Pages currently allocated to the tree.
    pub fn live_pages(&self) -> usize {
        self.store.live_pages()
    }

    /// Verifies every structural invariant of every node, plus cross-node
    /// fence consistency. Reports the first violation found.
    pub fn validate(&self) -> Result<()> {
        self.validate_node(self.root, &[], &[])
    }

    /// Walks toward the leaf covering `key`, stopping early at `stop` when
    /// given. Returns the node reached, its parent, and its index within
    /// that parent.
    fn descend(&self, key: &[u8], stop: Option<PageId>) -> (PageId, Option<PageId>, usize) {
        let mut node_id = self.root;
        let mut parent = None;
        let mut pos = 0;
        loop {
            let node = NodeRef::new(self.store.page(node_id));
            if node.is_leaf() || Some(node_id) == stop {
                return (node_id, parent, pos);
            }
            pos = node.lower_bound(key).index();
            parent = Some(node_id);
            node_id = node.child_or_upper(pos);
        }
    }

    /// Splits `node_id`, whose parent is `parent_id` (`None` for the root).
    /// When the parent cannot take the separator, splits the parent instead;
    /// the caller's retry loop will come back for the original node.
    fn split_node(&mut self, node_id: PageId, parent_id: Option<PageId>, key: &[u8]) -> Result<()> {
        let parent_id = match parent_id {
            Some(id) => id,
            None => {
                // the root splits: put a fresh inner root above it first
                let new_root = self.store.alloc()?;
                NodeMut::init_inner(self.store.page_mut(new_root), node_id);
                self.root = new_root;
                new_root
            }
        };

        let (info, separator) = {
            let node = NodeRef::new(self.store.page(node_id));
            let info = node.find_separator();
            let separator = node.separator_key(&info);
            (info, separator)
        };

        {
            let mut parent = NodeMut::new(self.store.page_mut(parent_id));
            let need = parent.as_ref().space_needed(separator.len(), CHILD_REF_SIZE);
            if !parent.request_space(need) {
                // the parent must be split first
                return self.ensure_space(parent_id, key);
            }
        }

        let left_id = self.store.alloc()?;
        {
            let mut parent = NodeMut::new(self.store.page_mut(parent_id));
            let inserted = parent.insert(&separator, &left_id.to_le_bytes());
            debug_assert!(inserted, "parent rejected separator after making space");
        }
        let (left_buf, right_buf) = {
            let node = NodeRef::new(self.store.page(node_id));
            build_split(node, &info, &separator)
        };
        self.store.page_mut(left_id).copy_from_slice(&left_buf[..]);
        self.store.page_mut(node_id).copy_from_slice(&right_buf[..]);
        Ok(())
    }

    /// Re-descends to `to_split` (an inner node that rejected a separator)
    /// and splits it, recursing further up when its parent is full too.
    fn ensure_space(&mut self, to_split: PageId, key: &[u8]) -> Result<()> {
        let (node_id, parent_id, _) = self.descend(key, Some(to_split));
        debug_assert_eq!(node_id, to_split);
        self.split_node(to_split, parent_id, key)
    }

    /// Tries to merge the child at `child_index` of `parent_id` with a
    /// sibling. Returns `true` when a merge committed: the left child's page
    /// was freed and its separator removed from the parent.
    fn merge_children_check(&mut self, parent_id: PageId, mut child_index: usize) -> bool {
        let (left_id, right_id, separator) = {
            let parent = NodeRef::new(self.store.page(parent_id));
            let count = parent.count();
            if count == 0 {
                return false; // single-child parent: no sibling to merge with
            }
            if child_index == count {
                // the rightmost (upper) child is the target; merge its left
                // neighbor into it, provided that neighbor is underfull too
                child_index -= 1;
                let left = NodeRef::new(self.store.page(parent.child_at(child_index)));
                if !left.is_underfull() {
                    return false;
                }
            } else {
                let right_id = parent.child_or_upper(child_index + 1);
                if !NodeRef::new(self.store.page(right_id)).is_underfull() {
                    return false;
                }
            }
            let left_id = parent.child_at(child_index);
            let right_id = parent.child_or_upper(child_index + 1);
            (left_id, right_id, parent.full_key(child_index))
        };

        let merged = {
            let left = NodeRef::new(self.store.page(left_id));
            let right = NodeRef::new(self.store.page(right_id));
            build_merge(left, right, &separator)
        };
        let Some(buf) = merged else {
            return false;
        };
        self.store.page_mut(right_id).copy_from_slice(&buf[..]);
        self.store.free(left_id);
        NodeMut::new(self.store.page_mut(parent_id)).remove_slot(child_index);
        true
    }

    fn walk(&self, node_id: PageId, f: &mut impl FnMut(&[u8], &[u8])) {
        let node = NodeRef::new(self.store.page(node_id));
        if node.is_leaf() {
            for i in 0..node.count() {
                let key = node.full_key(i);
                f(&key, node.payload(i));
            }
            return;
        }
        for i in 0..node.count() {
            self.walk(node.child_at(i), f);
        }
        self.walk(node.upper(), f);
    }

    fn free_subtree(&mut self, node_id: PageId) {
        let children: Vec<PageId> = {
            let node = NodeRef::new(self.store.page(node_id));
            if node.is_leaf() {
                Vec::new()
            } else {
                (0..=node.count()).map(|i| node.child_or_upper(i)).collect()
            }
        };
        for child in children {
            self.free_subtree(child);
        }
        self.store.free(node_id);
    }

    fn validate_node(&self, node_id: PageId, lower: &[u8], upper: &[u8]) -> Result<()> {
        let node = NodeRef::new(self.store.page(node_id));
        node.check_invariants()?;
        ensure!(
            node.lower_fence() == lower,
            "page {node_id}: lower fence disagrees with parent bounds"
        );
        ensure!(
            node.upper_fence() == upper,
            "page {node_id}: upper fence disagrees with parent bounds"
        );
        if node.is_leaf() {
            return Ok(());
        }
        let mut child_lower: SmallVec<[u8; 64]> = SmallVec::from_slice(lower);
        for i in 0..node.count() {
            let sep = node.full_key(i);
            self.validate_node(node.child_at(i), &child_lower, &sep)?;
            child_lower = sep;
        }
        self.validate_node(node.upper(), &child_lower, upper)
    }
}
