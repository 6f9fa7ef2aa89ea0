//! # Slotted-Page Node Engine
//!
//! This module implements the fixed-size page nodes of the B+tree. Leaf and
//! inner nodes share one physical layout, discriminated by a one-byte tag at
//! offset 0; inner nodes additionally use the header's `upper` field for
//! their rightmost child.
//!
//! ## Page Layout
//!
//! ```text
//! +----------------------+ 0
//! | NodeHeader (86B)     |  tag, upper, fences, count, space accounting,
//! |                      |  prefix length, 16 search hints
//! +----------------------+ 86
//! | Slot Array           |  Slot structs (10B each), grows forward
//! | [Slot 0]             |
//! | [Slot 1]             |
//! | ...                  |
//! +----------------------+ 86 + count*10
//! | Free Space           |
//! +----------------------+ data_offset
//! | Heap                 |  truncated keys, payloads, fence keys;
//! |                      |  grows backward from the page end
//! +----------------------+ 4096
//! ```
//!
//! ## Slot Array Design
//!
//! ```text
//! Slot (10 bytes):
//! +-----------+-----------+-------------+---------------------+
//! | offset 2B | key_len 2B| payload_len | head (4 bytes)      |
//! +-----------+-----------+-------------+---------------------+
//! ```
//!
//! Each slot references `key_len` bytes of *truncated* key (the full key
//! minus the node's fence prefix) followed immediately by `payload_len`
//! payload bytes. `head` is the order-preserving 4-byte digest of the
//! truncated key, so binary search resolves most steps with one u32 compare.
//!
//! ## Fence Keys and Prefix Compression
//!
//! Every node stores two fence keys bounding its key range: the lower fence
//! is exclusive, the upper fence inclusive, and an empty fence is unbounded
//! (the root has two empty fences). The longest common prefix of the two
//! fences is shared by every key the node may hold, so only the suffix past
//! that prefix is stored per slot.
//!
//! ## Space Accounting
//!
//! `space_used` counts heap bytes referenced by live slots plus both fence
//! keys. Removes leave holes in the heap (`data_offset` never moves back
//! up); `request_space` reclaims them by rebuilding the page into a scratch
//! node when the contiguous gap is too small but the compacted page would
//! fit.
//!
//! ## Search Algorithm
//!
//! 1. Compare the query against the node prefix; out-of-prefix queries
//!    clamp to slot 0 or `count` (the tree never routes such keys here)
//! 2. When the node has more than 32 entries, narrow `[lower, upper)` from
//!    the 16 sampled hint heads
//! 3. Binary search: compare heads first, byte-compare truncated keys only
//!    on head equality
//!
//! ## Zero-Copy Guarantees
//!
//! `NodeRef` borrows the page (`&'a [u8; PAGE_SIZE]`) and all key/payload
//! accessors return `&'a [u8]` slices into it. `NodeMut` is the exclusive
//! write view; `as_ref()` downgrades it for reads.

use std::cmp::Ordering;

use eyre::{ensure, Result};
use smallvec::SmallVec;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::encoding::{common_prefix_len, head};
use crate::storage::{PageBytes, PageId, PAGE_SIZE};

pub const HEADER_SIZE: usize = 86;
pub const SLOT_SIZE: usize = 10;
pub const HINT_COUNT: usize = 16;

/// Inner-node payloads are exactly one little-endian page id.
pub const CHILD_REF_SIZE: usize = std::mem::size_of::<PageId>();

/// Upper bound on `key_len + payload_len` accepted by the tree.
pub const MAX_ENTRY_SIZE: usize = PAGE_SIZE / 4;

/// Upper bound on key length alone.
pub const MAX_KEY_SIZE: usize = (PAGE_SIZE - HEADER_SIZE - 2 * SLOT_SIZE) / 4;

/// One-byte node discriminator stored at page offset 0.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    BasicLeaf = 0x01,
    BasicInner = 0x02,
}

impl NodeTag {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(NodeTag::BasicLeaf),
            0x02 => Some(NodeTag::BasicInner),
            _ => None,
        }
    }

    pub fn is_leaf(self) -> bool {
        self == NodeTag::BasicLeaf
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct NodeHeader {
    tag: u8,
    reserved: u8,
    /// Rightmost child page id; inner nodes only.
    upper: U32,
    lower_fence_offset: U16,
    lower_fence_len: U16,
    upper_fence_offset: U16,
    upper_fence_len: U16,
    count: U16,
    space_used: U16,
    data_offset: U16,
    prefix_len: U16,
    hint: [U32; HINT_COUNT],
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == HEADER_SIZE);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, PartialEq, Eq)]
pub struct Slot {
    offset: U16,
    key_len: U16,
    payload_len: U16,
    head: U32,
}

const _: () = assert!(std::mem::size_of::<Slot>() == SLOT_SIZE);

impl Slot {
    fn new(offset: u16, key_len: u16, payload_len: u16, head: u32) -> Self {
        Self {
            offset: U16::new(offset),
            key_len: U16::new(key_len),
            payload_len: U16::new(payload_len),
            head: U32::new(head),
        }
    }

    pub fn offset(&self) -> u16 {
        self.offset.get()
    }

    pub fn key_len(&self) -> u16 {
        self.key_len.get()
    }

    pub fn payload_len(&self) -> u16 {
        self.payload_len.get()
    }

    pub fn head(&self) -> u32 {
        self.head.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    Found(usize),
    NotFound(usize),
}

impl SearchResult {
    /// The slot index regardless of whether the match was exact.
    pub fn index(self) -> usize {
        match self {
            SearchResult::Found(i) | SearchResult::NotFound(i) => i,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, SearchResult::Found(_))
    }
}

#[inline]
fn slot_offset(index: usize) -> usize {
    HEADER_SIZE + index * SLOT_SIZE
}

/// Zeroed scratch page for compaction, splits, and merges.
pub(crate) fn scratch_page() -> Box<PageBytes> {
    Box::new([0u8; PAGE_SIZE])
}

/// Shared read-only view of one node page.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    data: &'a PageBytes,
}

/// Exclusive mutable view of one node page.
pub struct NodeMut<'a> {
    data: &'a mut PageBytes,
}

impl<'a> NodeRef<'a> {
    pub fn new(data: &'a PageBytes) -> Self {
        debug_assert!(
            NodeTag::from_byte(data[0]).is_some(),
            "invalid node tag {:#04x}",
            data[0]
        );
        Self { data }
    }

    fn header(&self) -> &'a NodeHeader {
        let data: &'a [u8] = self.data;
        // size and alignment are fixed: the header is 86 bytes of unaligned fields
        NodeHeader::ref_from_bytes(&data[..HEADER_SIZE]).unwrap()
    }

    pub fn tag(&self) -> NodeTag {
        NodeTag::from_byte(self.data[0]).expect("corrupt node tag")
    }

    pub fn is_leaf(&self) -> bool {
        self.tag().is_leaf()
    }

    pub fn is_inner(&self) -> bool {
        !self.is_leaf()
    }

    pub fn count(&self) -> usize {
        self.header().count.get() as usize
    }

    pub fn prefix_len(&self) -> usize {
        self.header().prefix_len.get() as usize
    }

    pub fn space_used(&self) -> usize {
        self.header().space_used.get() as usize
    }

    pub fn data_offset(&self) -> usize {
        self.header().data_offset.get() as usize
    }

    /// Rightmost child page id. Inner nodes only.
    pub fn upper(&self) -> PageId {
        debug_assert!(self.is_inner(), "upper() on a leaf");
        self.header().upper.get()
    }

    pub fn lower_fence(&self) -> &'a [u8] {
        let h = self.header();
        let off = h.lower_fence_offset.get() as usize;
        let len = h.lower_fence_len.get() as usize;
        let data: &'a [u8] = self.data;
        &data[off..off + len]
    }

    pub fn upper_fence(&self) -> &'a [u8] {
        let h = self.header();
        let off = h.upper_fence_offset.get() as usize;
        let len = h.upper_fence_len.get() as usize;
        let data: &'a [u8] = self.data;
        &data[off..off + len]
    }

    /// Shared byte prefix of every key on this page.
    pub fn prefix(&self) -> &'a [u8] {
        &self.lower_fence()[..self.prefix_len()]
    }

    pub fn slot(&self, index: usize) -> &'a Slot {
        debug_assert!(
            index < self.count(),
            "slot index {index} out of bounds (count={})",
            self.count()
        );
        let off = slot_offset(index);
        let data: &'a [u8] = self.data;
        Slot::ref_from_bytes(&data[off..off + SLOT_SIZE]).unwrap()
    }

    /// Key suffix stored for a slot (node prefix stripped).
    pub fn truncated_key(&self, index: usize) -> &'a [u8] {
        let s = self.slot(index);
        let off = s.offset() as usize;
        let data: &'a [u8] = self.data;
        &data[off..off + s.key_len() as usize]
    }

    pub fn payload(&self, index: usize) -> &'a [u8] {
        let s = self.slot(index);
        let start = s.offset() as usize + s.key_len() as usize;
        let data: &'a [u8] = self.data;
        &data[start..start + s.payload_len() as usize]
    }

    /// Reconstructs the full key of a slot: `prefix || truncated`.
    pub fn full_key(&self, index: usize) -> SmallVec<[u8; 64]> {
        let mut key = SmallVec::from_slice(self.prefix());
        key.extend_from_slice(self.truncated_key(index));
        key
    }

    /// Child page id stored in an inner slot's payload.
    pub fn child_at(&self, index: usize) -> PageId {
        debug_assert!(self.is_inner(), "child_at() on a leaf");
        let p = self.payload(index);
        debug_assert_eq!(p.len(), CHILD_REF_SIZE);
        let mut buf = [0u8; CHILD_REF_SIZE];
        buf.copy_from_slice(&p[..CHILD_REF_SIZE]);
        PageId::from_le_bytes(buf)
    }

    /// Child for position `index`, falling through to `upper` past the last slot.
    pub fn child_or_upper(&self, index: usize) -> PageId {
        debug_assert!(index <= self.count());
        if index == self.count() {
            self.upper()
        } else {
            self.child_at(index)
        }
    }

    /// Contiguous gap between the slot array and the heap.
    pub fn free_space(&self) -> usize {
        self.data_offset() - slot_offset(self.count())
    }

    /// Free bytes after rebuilding the heap without holes.
    pub fn free_space_after_compaction(&self) -> usize {
        PAGE_SIZE - slot_offset(self.count()) - self.space_used()
    }

    /// Merge candidates: at least three quarters of the page reclaimable.
    pub fn is_underfull(&self) -> bool {
        self.free_space_after_compaction() >= PAGE_SIZE * 3 / 4
    }

    /// Bytes required to insert a key/payload pair into this node.
    pub fn space_needed(&self, key_len: usize, payload_len: usize) -> usize {
        debug_assert!(key_len >= self.prefix_len());
        SLOT_SIZE + (key_len - self.prefix_len()) + payload_len
    }

    /// Common prefix length of two slots' truncated keys.
    pub fn common_prefix(&self, a: usize, b: usize) -> usize {
        common_prefix_len(self.truncated_key(a), self.truncated_key(b))
    }

    /// Smallest slot whose full key is `>=` the query, and whether the match
    /// is exact. The query must lie within the node's fence range; keys
    /// ordering outside the node prefix clamp to 0 or `count`.
    pub fn lower_bound(&self, key: &[u8]) -> SearchResult {
        let prefix = self.prefix();
        let n = key.len().min(prefix.len());
        match key[..n].cmp(&prefix[..n]) {
            Ordering::Less => return SearchResult::NotFound(0),
            Ordering::Greater => return SearchResult::NotFound(self.count()),
            Ordering::Equal => {
                if key.len() < prefix.len() {
                    return SearchResult::NotFound(0);
                }
            }
        }
        let truncated = &key[prefix.len()..];
        let key_head = head(truncated);

        let (mut lower, mut upper) = self.search_hint(key_head);
        while lower < upper {
            let mid = lower + (upper - lower) / 2;
            let s = self.slot(mid);
            match key_head.cmp(&s.head()) {
                Ordering::Less => upper = mid,
                Ordering::Greater => lower = mid + 1,
                Ordering::Equal => match truncated.cmp(self.truncated_key(mid)) {
                    Ordering::Less => upper = mid,
                    Ordering::Greater => lower = mid + 1,
                    Ordering::Equal => return SearchResult::Found(mid),
                },
            }
        }
        SearchResult::NotFound(lower)
    }

    /// Narrows the binary-search interval from the sampled hint heads.
    /// Returns the full `[0, count)` range for nodes with few entries.
    fn search_hint(&self, key_head: u32) -> (usize, usize) {
        let count = self.count();
        if count > HINT_COUNT * 2 {
            let dist = count / (HINT_COUNT + 1);
            let hint = &self.header().hint;
            let pos = (0..HINT_COUNT)
                .find(|&i| hint[i].get() >= key_head)
                .unwrap_or(HINT_COUNT);
            let pos2 = (pos..HINT_COUNT)
                .find(|&i| hint[i].get() != key_head)
                .unwrap_or(HINT_COUNT);
            let lower = pos * dist;
            let upper = if pos2 < HINT_COUNT {
                (pos2 + 1) * dist
            } else {
                count
            };
            (lower, upper)
        } else {
            (0, count)
        }
    }

    /// Copies `n` entries starting at `src_slot` into `dst` starting at
    /// `dst_slot`, re-truncating keys against the destination prefix.
    /// Preserves slot order; updates the destination's space accounting and
    /// count.
    pub fn copy_key_value_range(
        &self,
        dst: &mut NodeMut<'_>,
        dst_slot: usize,
        src_slot: usize,
        n: usize,
    ) {
        debug_assert_eq!(dst_slot, dst.as_ref().count());
        debug_assert!(src_slot + n <= self.count());
        if self.prefix_len() <= dst.as_ref().prefix_len() {
            // prefix grows: shorten each stored key suffix by the difference
            let diff = dst.as_ref().prefix_len() - self.prefix_len();
            for i in 0..n {
                let s = self.slot(src_slot + i);
                debug_assert!(s.key_len() as usize >= diff);
                let key_len = s.key_len() as usize - diff;
                let payload_len = s.payload_len() as usize;
                let src_off = s.offset() as usize + diff;
                let space = key_len + payload_len;
                let off = dst.as_ref().data_offset() - space;
                dst.data[off..off + space].copy_from_slice(&self.data[src_off..src_off + space]);
                dst.set_data_offset(off);
                dst.add_space_used(space);
                let h = head(&dst.data[off..off + key_len]);
                dst.write_slot(
                    dst_slot + i,
                    Slot::new(off as u16, key_len as u16, payload_len as u16, h),
                );
            }
        } else {
            // prefix shrinks: rebuild full keys and re-truncate
            for i in 0..n {
                self.copy_key_value(src_slot + i, dst, dst_slot + i);
            }
        }
        let count = dst.as_ref().count();
        dst.set_count(count + n);
    }

    fn copy_key_value(&self, src_slot: usize, dst: &mut NodeMut<'_>, dst_slot: usize) {
        let full = self.full_key(src_slot);
        let truncated = &full[dst.as_ref().prefix_len()..];
        dst.store_key_value(dst_slot, truncated, self.payload(src_slot));
    }

    /// Checks the per-node structural invariants, reporting the first
    /// violation. Cross-node fence consistency is checked by the tree.
    pub fn check_invariants(&self) -> Result<()> {
        let count = self.count();
        ensure!(
            slot_offset(count) <= self.data_offset(),
            "slot array overlaps heap: {} slots, data_offset {}",
            count,
            self.data_offset()
        );
        ensure!(self.data_offset() <= PAGE_SIZE, "data_offset beyond page end");
        ensure!(
            self.prefix_len() == common_prefix_len(self.lower_fence(), self.upper_fence()),
            "prefix_len {} disagrees with fences",
            self.prefix_len()
        );

        let lower = self.lower_fence();
        let upper = self.upper_fence();
        let mut used = lower.len() + upper.len();
        for i in 0..count {
            let s = self.slot(i);
            let key = self.truncated_key(i);
            ensure!(
                s.offset() as usize >= self.data_offset(),
                "slot {i} points below the heap floor"
            );
            ensure!(
                s.offset() as usize + key.len() + s.payload_len() as usize <= PAGE_SIZE,
                "slot {i} extends beyond page end"
            );
            ensure!(s.head() == head(key), "slot {i} head digest is stale");
            if i + 1 < count {
                ensure!(
                    key < self.truncated_key(i + 1),
                    "slots {i} and {} out of order",
                    i + 1
                );
                ensure!(
                    s.head() <= self.slot(i + 1).head(),
                    "slot heads {i} and {} out of order",
                    i + 1
                );
            }
            let full = self.full_key(i);
            if !lower.is_empty() {
                ensure!(full.as_slice() > lower, "slot {i} below the lower fence");
            }
            if !upper.is_empty() {
                ensure!(full.as_slice() <= upper, "slot {i} above the upper fence");
            }
            if self.is_inner() {
                ensure!(
                    s.payload_len() as usize == CHILD_REF_SIZE,
                    "inner slot {i} payload is not a child reference"
                );
            }
            used += key.len() + s.payload_len() as usize;
        }
        ensure!(
            used == self.space_used(),
            "space_used {} != accounted {}",
            self.space_used(),
            used
        );

        if count > HINT_COUNT * 2 {
            let dist = count / (HINT_COUNT + 1);
            for i in 0..HINT_COUNT {
                ensure!(
                    self.header().hint[i].get() == self.slot(dist * (i + 1)).head(),
                    "hint {i} is stale"
                );
            }
        }
        Ok(())
    }
}

impl<'a> NodeMut<'a> {
    pub fn new(data: &'a mut PageBytes) -> Self {
        debug_assert!(
            NodeTag::from_byte(data[0]).is_some(),
            "invalid node tag {:#04x}",
            data[0]
        );
        Self { data }
    }

    /// Initializes `data` as an empty leaf with unbounded fences.
    pub fn init_leaf(data: &'a mut PageBytes) -> Self {
        Self::init(data, NodeTag::BasicLeaf, 0)
    }

    /// Initializes `data` as an empty inner node whose rightmost child is
    /// `upper`, with unbounded fences.
    pub fn init_inner(data: &'a mut PageBytes, upper: PageId) -> Self {
        Self::init(data, NodeTag::BasicInner, upper)
    }

    fn init(data: &'a mut PageBytes, tag: NodeTag, upper: PageId) -> Self {
        let header = NodeHeader {
            tag: tag as u8,
            reserved: 0,
            upper: U32::new(upper),
            lower_fence_offset: U16::new(0),
            lower_fence_len: U16::new(0),
            upper_fence_offset: U16::new(0),
            upper_fence_len: U16::new(0),
            count: U16::new(0),
            space_used: U16::new(0),
            data_offset: U16::new(PAGE_SIZE as u16),
            prefix_len: U16::new(0),
            hint: [U32::new(0); HINT_COUNT],
        };
        data[..HEADER_SIZE].copy_from_slice(header.as_bytes());
        Self { data }
    }

    pub fn as_ref(&self) -> NodeRef<'_> {
        NodeRef { data: self.data }
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        // size and alignment are fixed: the header is 86 bytes of unaligned fields
        NodeHeader::mut_from_bytes(&mut self.data[..HEADER_SIZE]).unwrap()
    }

    fn set_count(&mut self, count: usize) {
        debug_assert!(slot_offset(count) <= self.as_ref().data_offset());
        self.header_mut().count = U16::new(count as u16);
    }

    fn set_data_offset(&mut self, offset: usize) {
        self.header_mut().data_offset = U16::new(offset as u16);
    }

    fn add_space_used(&mut self, bytes: usize) {
        let h = self.header_mut();
        h.space_used = U16::new(h.space_used.get() + bytes as u16);
    }

    fn sub_space_used(&mut self, bytes: usize) {
        let h = self.header_mut();
        h.space_used = U16::new(h.space_used.get() - bytes as u16);
    }

    pub fn set_upper(&mut self, upper: PageId) {
        debug_assert!(self.as_ref().is_inner());
        self.header_mut().upper = U32::new(upper);
    }

    /// Inserts a key/payload pair, keeping slots sorted. Returns `false`
    /// without modifying the node when even a compacted page could not hold
    /// the entry; the caller escalates to a split.
    ///
    /// Inserting a key that is already present overwrites its payload.
    pub fn insert(&mut self, key: &[u8], payload: &[u8]) -> bool {
        let need = self.as_ref().space_needed(key.len(), payload.len());
        if !self.request_space(need) {
            return false;
        }
        let position = self.as_ref().lower_bound(key);
        match position {
            SearchResult::Found(pos) => {
                debug_assert!(self.as_ref().is_leaf(), "duplicate separator in inner node");
                let s = *self.as_ref().slot(pos);
                if s.payload_len() as usize == payload.len() {
                    let start = s.offset() as usize + s.key_len() as usize;
                    self.data[start..start + payload.len()].copy_from_slice(payload);
                } else {
                    // release the old heap bytes and restore with the new payload
                    self.sub_space_used(s.key_len() as usize + s.payload_len() as usize);
                    let prefix_len = self.as_ref().prefix_len();
                    self.store_key_value(pos, &key[prefix_len..], payload);
                }
                true
            }
            SearchResult::NotFound(pos) => {
                let count = self.as_ref().count();
                self.data
                    .copy_within(slot_offset(pos)..slot_offset(count), slot_offset(pos) + SLOT_SIZE);
                let prefix_len = self.as_ref().prefix_len();
                self.store_key_value(pos, &key[prefix_len..], payload);
                self.set_count(count + 1);
                self.update_hint(pos);
                true
            }
        }
    }

    /// Removes a key if present. Dead heap bytes linger until the next
    /// compaction.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let position = self.as_ref().lower_bound(key);
        match position {
            SearchResult::Found(pos) => {
                self.remove_slot(pos);
                true
            }
            SearchResult::NotFound(_) => false,
        }
    }

    pub fn remove_slot(&mut self, slot_id: usize) {
        let count = self.as_ref().count();
        debug_assert!(slot_id < count);
        let s = *self.as_ref().slot(slot_id);
        self.sub_space_used(s.key_len() as usize + s.payload_len() as usize);
        self.data
            .copy_within(slot_offset(slot_id + 1)..slot_offset(count), slot_offset(slot_id));
        self.set_count(count - 1);
        self.make_hint();
    }

    /// Ensures `need` contiguous free bytes, compacting the page when the
    /// reclaimable space suffices. Returns `false` when the node is full.
    pub fn request_space(&mut self, need: usize) -> bool {
        if need <= self.as_ref().free_space() {
            return true;
        }
        if need <= self.as_ref().free_space_after_compaction() {
            self.compactify();
            return true;
        }
        false
    }

    /// Rebuilds the heap contiguously through a scratch node, reclaiming
    /// holes left by removes and payload replacements.
    fn compactify(&mut self) {
        let should = self.as_ref().free_space_after_compaction();
        let mut buf = scratch_page();
        {
            let src = self.as_ref();
            let mut tmp = match src.tag() {
                NodeTag::BasicLeaf => NodeMut::init_leaf(&mut buf),
                NodeTag::BasicInner => NodeMut::init_inner(&mut buf, src.upper()),
            };
            tmp.set_fences(src.lower_fence(), src.upper_fence());
            src.copy_key_value_range(&mut tmp, 0, 0, src.count());
            tmp.make_hint();
        }
        self.data.copy_from_slice(&buf[..]);
        debug_assert_eq!(self.as_ref().free_space(), should);
    }

    /// Writes both fence keys into the heap and derives the shared prefix.
    /// Only valid on a freshly initialized node.
    pub fn set_fences(&mut self, lower: &[u8], upper: &[u8]) {
        debug_assert_eq!(self.as_ref().count(), 0);
        let lower_off = self.write_heap(lower);
        let upper_off = self.write_heap(upper);
        let prefix = common_prefix_len(lower, upper);
        let h = self.header_mut();
        h.lower_fence_offset = U16::new(lower_off);
        h.lower_fence_len = U16::new(lower.len() as u16);
        h.upper_fence_offset = U16::new(upper_off);
        h.upper_fence_len = U16::new(upper.len() as u16);
        h.prefix_len = U16::new(prefix as u16);
    }

    /// Stores a truncated key and payload at the heap head and writes the
    /// slot record. Does not touch `count`.
    pub(crate) fn store_key_value(&mut self, slot_id: usize, truncated_key: &[u8], payload: &[u8]) {
        let total = truncated_key.len() + payload.len();
        let off = self.as_ref().data_offset() - total;
        debug_assert!(off >= slot_offset(self.as_ref().count()));
        self.data[off..off + truncated_key.len()].copy_from_slice(truncated_key);
        self.data[off + truncated_key.len()..off + total].copy_from_slice(payload);
        self.set_data_offset(off);
        self.add_space_used(total);
        self.write_slot(
            slot_id,
            Slot::new(
                off as u16,
                truncated_key.len() as u16,
                payload.len() as u16,
                head(truncated_key),
            ),
        );
    }

    /// Appends an entry after the current last slot.
    pub(crate) fn append_key_value(&mut self, truncated_key: &[u8], payload: &[u8]) {
        let count = self.as_ref().count();
        self.store_key_value(count, truncated_key, payload);
        self.set_count(count + 1);
    }

    fn write_heap(&mut self, bytes: &[u8]) -> u16 {
        let off = self.as_ref().data_offset() - bytes.len();
        debug_assert!(off >= slot_offset(self.as_ref().count()));
        self.data[off..off + bytes.len()].copy_from_slice(bytes);
        self.set_data_offset(off);
        self.add_space_used(bytes.len());
        off as u16
    }

    fn write_slot(&mut self, index: usize, slot: Slot) {
        let off = slot_offset(index);
        debug_assert!(off + SLOT_SIZE <= self.as_ref().data_offset());
        self.data[off..off + SLOT_SIZE].copy_from_slice(slot.as_bytes());
    }

    /// Resamples all 16 hint heads from the slot array.
    pub fn make_hint(&mut self) {
        let count = self.as_ref().count();
        if count == 0 {
            return;
        }
        let dist = count / (HINT_COUNT + 1);
        for i in 0..HINT_COUNT {
            let h = self.as_ref().slot(dist * (i + 1)).head();
            self.header_mut().hint[i] = U32::new(h);
        }
    }

    /// Refreshes hints after an insert at `slot_id`, skipping samples that
    /// cannot have moved when the sampling distance is unchanged.
    fn update_hint(&mut self, slot_id: usize) {
        let count = self.as_ref().count();
        let dist = count / (HINT_COUNT + 1);
        let begin = if count > HINT_COUNT * 2 + 1
            && (count - 1) / (HINT_COUNT + 1) == dist
            && slot_id / dist > 1
        {
            slot_id / dist - 1
        } else {
            0
        };
        for i in begin..HINT_COUNT {
            let h = self.as_ref().slot(dist * (i + 1)).head();
            self.header_mut().hint[i] = U32::new(h);
        }
    }
}
