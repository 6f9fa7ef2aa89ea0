//! # Splits and Merges
//!
//! Structural page rebuilds. Both operations construct their results in
//! scratch pages and let the tree driver byte-copy them over live pages, so
//! a failed merge or a split interrupted by an allocation error never leaves
//! a half-modified node behind.
//!
//! ## Separator Choice
//!
//! Inner nodes split in the middle; their separator is the full key of the
//! pivot slot, which moves up into the parent. Leaves scan a window left of
//! the midpoint for the slot that shares the longest prefix with the first
//! slot, which biases the split toward a short separator, and then truncate
//! the separator further when a shorter byte string still orders strictly
//! between the pivot and its successor.
//!
//! ## Merge Direction
//!
//! A node always merges into its *right* sibling's page. The surviving page
//! id is the one the parent already references for the right child, so only
//! the left child's separator slot has to be removed from the parent.

use smallvec::SmallVec;

use crate::encoding::common_prefix_len;
use crate::storage::{PageBytes, PAGE_SIZE};

use super::node::{scratch_page, NodeMut, NodeRef, NodeTag, CHILD_REF_SIZE, HEADER_SIZE, SLOT_SIZE};

/// Where to split a node and how long the resulting separator is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparatorInfo {
    /// Full length of the separator, node prefix included.
    pub len: usize,
    /// Pivot slot. A leaf keeps it in the left half; an inner node promotes
    /// its key to the parent.
    pub slot: usize,
    /// When set, the separator bytes come from slot `slot + 1`.
    pub truncated: bool,
}

impl NodeRef<'_> {
    /// Chooses the pivot slot and separator length for splitting this node.
    pub fn find_separator(&self) -> SeparatorInfo {
        let count = self.count();
        debug_assert!(count > 1, "cannot split a node with {count} entries");

        if self.is_inner() {
            let slot = count / 2;
            return SeparatorInfo {
                len: self.prefix_len() + self.truncated_key(slot).len(),
                slot,
                truncated: false,
            };
        }

        let best_slot = if count > 16 {
            // scan the window left of the midpoint for the slot sharing the
            // longest prefix with slot 0; ties go to the lowest index
            let lo = count / 2 - count / 16;
            let hi = count / 2;
            let mut best = lo;
            let mut best_prefix = self.common_prefix(lo, 0);
            for i in lo + 1..hi {
                let prefix = self.common_prefix(i, 0);
                if prefix > best_prefix {
                    best_prefix = prefix;
                    best = i;
                }
            }
            best
        } else {
            (count - 1) / 2
        };

        if best_slot + 1 < count {
            let common = self.common_prefix(best_slot, best_slot + 1);
            if self.truncated_key(best_slot).len() > common
                && self.truncated_key(best_slot + 1).len() > common + 1
            {
                // the shortest byte string strictly between the pivot and
                // its successor
                return SeparatorInfo {
                    len: self.prefix_len() + common + 1,
                    slot: best_slot,
                    truncated: true,
                };
            }
        }
        SeparatorInfo {
            len: self.prefix_len() + self.truncated_key(best_slot).len(),
            slot: best_slot,
            truncated: false,
        }
    }

    /// Materializes the separator bytes for `info`.
    pub fn separator_key(&self, info: &SeparatorInfo) -> SmallVec<[u8; 128]> {
        let mut sep = SmallVec::from_slice(self.prefix());
        let source = self.truncated_key(info.slot + info.truncated as usize);
        sep.extend_from_slice(&source[..info.len - self.prefix_len()]);
        sep
    }
}

/// Builds the two halves of a split in scratch pages: left covers
/// `(node.lower_fence, separator]`, right covers `(separator,
/// node.upper_fence]`. A leaf keeps the pivot slot in the left half; an
/// inner node drops it, the pivot's child becoming the left half's `upper`.
pub fn build_split(
    node: NodeRef,
    info: &SeparatorInfo,
    separator: &[u8],
) -> (Box<PageBytes>, Box<PageBytes>) {
    let count = node.count();
    let mut left_buf = scratch_page();
    let mut right_buf = scratch_page();
    {
        let (mut left, mut right) = match node.tag() {
            NodeTag::BasicLeaf => (
                NodeMut::init_leaf(&mut left_buf),
                NodeMut::init_leaf(&mut right_buf),
            ),
            NodeTag::BasicInner => (
                NodeMut::init_inner(&mut left_buf, node.child_at(info.slot)),
                NodeMut::init_inner(&mut right_buf, node.upper()),
            ),
        };
        left.set_fences(node.lower_fence(), separator);
        right.set_fences(separator, node.upper_fence());
        if node.is_leaf() {
            node.copy_key_value_range(&mut left, 0, 0, info.slot + 1);
            node.copy_key_value_range(&mut right, 0, info.slot + 1, count - info.slot - 1);
        } else {
            node.copy_key_value_range(&mut left, 0, 0, info.slot);
            node.copy_key_value_range(&mut right, 0, info.slot + 1, count - info.slot - 1);
        }
        left.make_hint();
        right.make_hint();
    }
    (left_buf, right_buf)
}

/// Merges `left` and `right` into one scratch page covering
/// `(left.lower_fence, right.upper_fence]`, or `None` when a conservative
/// space bound says the result may not fit. `separator` is the full parent
/// separator between the two; an inner merge demotes it to a regular slot
/// pointing at `left.upper`.
pub fn build_merge(left: NodeRef, right: NodeRef, separator: &[u8]) -> Option<Box<PageBytes>> {
    debug_assert_eq!(left.tag(), right.tag());

    let new_prefix_len = common_prefix_len(left.lower_fence(), right.upper_fence());
    debug_assert!(new_prefix_len <= left.prefix_len());
    debug_assert!(new_prefix_len <= right.prefix_len());
    let left_grow = (left.prefix_len() - new_prefix_len) * left.count();
    let right_grow = (right.prefix_len() - new_prefix_len) * right.count();
    let mut bound = left.space_used()
        + right.space_used()
        + HEADER_SIZE
        + SLOT_SIZE * (left.count() + right.count())
        + left_grow
        + right_grow;
    if left.is_inner() {
        bound += SLOT_SIZE + (separator.len() - new_prefix_len) + CHILD_REF_SIZE;
    }
    if bound > PAGE_SIZE {
        return None;
    }

    let mut buf = scratch_page();
    {
        let mut merged = match left.tag() {
            NodeTag::BasicLeaf => NodeMut::init_leaf(&mut buf),
            NodeTag::BasicInner => NodeMut::init_inner(&mut buf, right.upper()),
        };
        merged.set_fences(left.lower_fence(), right.upper_fence());
        debug_assert_eq!(merged.as_ref().prefix_len(), new_prefix_len);
        left.copy_key_value_range(&mut merged, 0, 0, left.count());
        if left.is_inner() {
            // the parent separator comes back down as the slot for left.upper
            merged.append_key_value(&separator[new_prefix_len..], &left.upper().to_le_bytes());
        }
        let merged_count = merged.as_ref().count();
        right.copy_key_value_range(&mut merged, merged_count, 0, right.count());
        merged.make_hint();
    }
    Some(buf)
}
