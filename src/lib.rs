//! # pagetree - In-Memory Slotted-Page B+Tree
//!
//! pagetree is an ordered index from arbitrary byte-string keys to arbitrary
//! byte-string payloads, optimized for point operations. Every node is one
//! fixed-size 4096-byte page; the engine prioritizes:
//!
//! - **Zero-copy reads**: lookups return `&[u8]` slices pointing directly
//!   into page memory, valid until the next mutation
//! - **Prefix compression**: the shared prefix of a node's fence keys is
//!   stored once; slots hold only key suffixes
//! - **Fast search**: a 4-byte order-preserving key head in each slot turns
//!   most binary-search steps into a single integer compare, and 16 sampled
//!   heads per node narrow the search interval up front
//!
//! ## Quick Start
//!
//! ```
//! use pagetree::BTree;
//!
//! let mut tree = BTree::new()?;
//! tree.insert(b"alpha", b"1")?;
//! tree.insert(b"bravo", b"2")?;
//!
//! assert_eq!(tree.lookup(b"alpha"), Some(&b"1"[..]));
//! assert!(tree.remove(b"alpha"));
//! assert_eq!(tree.lookup(b"alpha"), None);
//! # Ok::<(), eyre::Report>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      Tree driver (BTree)            │  descent, splits, merges
//! ├─────────────────────────────────────┤
//! │      Slotted-page node engine       │  layout, search, compaction
//! ├─────────────────────────────────────┤
//! │      Page store (PageStore)         │  page allocation + freelist
//! └─────────────────────────────────────┘
//! ```
//!
//! Data flows top-down on descent (root → inner → leaf) and bottom-up on
//! structural change: a leaf split installs a separator in its parent, and a
//! full parent is split by restarting from the root.
//!
//! ## Module Overview
//!
//! - [`btree`]: node engine and tree driver
//! - [`storage`]: in-memory page store and page geometry
//! - [`encoding`]: order-preserving key head digest
//!
//! ## Concurrency
//!
//! The engine is single-threaded by design: one owner mutates the tree, and
//! every operation runs to completion. Callers needing shared access wrap
//! the tree in their own synchronization.

pub mod btree;
pub mod encoding;
pub mod storage;

pub use btree::{BTree, MAX_ENTRY_SIZE, MAX_KEY_SIZE};
pub use storage::{PageId, PAGE_SIZE};
