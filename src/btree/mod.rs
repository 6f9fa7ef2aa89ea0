//! # B+Tree Index Implementation
//!
//! This module implements the core ordered index: a B+tree of fixed-size
//! slotted pages with prefix-compressed keys and digest-accelerated search.
//!
//! ## Architecture Overview
//!
//! Two node variants share one physical page layout, discriminated by a
//! one-byte tag at page offset 0:
//!
//! - **BasicLeaf**: stores full key suffixes and opaque payloads
//! - **BasicInner**: stores separator keys whose payloads are child page
//!   references, plus one `upper` reference for the rightmost child
//!
//! Every node carries two *fence keys* bounding the keys it may hold (lower
//! exclusive, upper inclusive, empty meaning unbounded). The common prefix
//! of the fences is stored once and stripped from every slot key, and each
//! slot carries a 4-byte order-preserving head of its suffix so binary
//! search touches key bytes only on head collisions. Nodes with more than
//! 32 entries additionally keep 16 sampled heads that narrow the search
//! interval before the binary search starts.
//!
//! ## Structure Changes
//!
//! Splits and merges never mutate in place: the replacement pages are built
//! in scratch buffers and byte-copied over the live pages once complete.
//! Inserts that find a full leaf split it and restart from the root;
//! removes that leave a node underfull merge it into its right sibling and
//! escalate upward while the parent is underfull too.
//!
//! ## Module Organization
//!
//! - `node`: page layout and the slotted-page engine
//! - `split`: separator choice, split and merge page builders
//! - `tree`: the `BTree` driver

mod node;
mod split;
mod tree;

pub use node::{
    NodeMut, NodeRef, NodeTag, SearchResult, Slot, CHILD_REF_SIZE, HEADER_SIZE, HINT_COUNT,
    MAX_ENTRY_SIZE, MAX_KEY_SIZE, SLOT_SIZE,
};
pub use split::{build_merge, build_split, SeparatorInfo};
pub use tree::BTree;
