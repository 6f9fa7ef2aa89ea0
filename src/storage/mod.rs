//! # Storage Module
//!
//! In-memory page storage for the B+tree. Every node occupies exactly one
//! 4096-byte page, allocated from and returned to a [`PageStore`].
//!
//! ## Safety Model
//!
//! Pages are plain byte buffers; the store enforces access discipline with
//! the borrow checker rather than runtime guards:
//!
//! ```text
//! PageStore::page(&self)      -> &[u8; PAGE_SIZE]      // shared read
//! PageStore::page_mut(&mut self) -> &mut [u8; PAGE_SIZE] // exclusive write
//! PageStore::alloc(&mut self)                            // exclusive grow
//! ```
//!
//! Holding a page reference across an allocation is a compile error, which
//! is exactly the zero-copy lookup contract the tree exposes: payload views
//! stay valid until the next mutating call.
//!
//! ## Page Identity
//!
//! Nodes reference each other by [`PageId`], a dense `u32` index into the
//! store. Freed ids go onto a freelist and are handed out again by later
//! allocations, so remove-heavy workloads do not grow the store.

mod store;

pub use store::PageStore;

/// Fixed page size in bytes. Chosen at build time; invariant at runtime.
pub const PAGE_SIZE: usize = 4096;

/// Identifies one page inside a [`PageStore`].
pub type PageId = u32;

/// One page worth of bytes.
pub type PageBytes = [u8; PAGE_SIZE];
