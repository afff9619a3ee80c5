// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use alloc::vec::Vec;

use super::id::{ElementId, INVALID};
use super::store::ElementTree;

/// An iterator over the direct children of an element, in insertion order.
///
/// Created by [`ElementTree::children`].
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a ElementTree,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(tree: &'a ElementTree, first: u32) -> Self {
        Self {
            tree,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.next_sibling[idx as usize];
        Some(ElementId {
            idx,
            generation: self.tree.generation[idx as usize],
        })
    }
}

impl ElementTree {
    /// Raw child slots in insertion order.
    pub(crate) fn child_slots(&self, idx: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut c = self.first_child[idx as usize];
        while c != INVALID {
            out.push(c);
            c = self.next_sibling[c as usize];
        }
        out
    }

    /// Raw child slots sorted for rendering: ascending z-index, ties kept in
    /// insertion order. Hit testing walks this list back to front.
    pub(crate) fn render_order(&self, idx: u32) -> Vec<u32> {
        let mut out = self.child_slots(idx);
        out.sort_by_key(|&c| self.z_index[c as usize]);
        out
    }

    /// Whether `ancestor` is `idx` or one of its ancestors.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: u32, idx: u32) -> bool {
        let mut cur = idx;
        while cur != INVALID {
            if cur == ancestor {
                return true;
            }
            cur = self.parent[cur as usize];
        }
        false
    }

    /// Depth-first pre-order slots of the subtree rooted at `idx`.
    pub(crate) fn subtree_slots(&self, idx: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut stack = alloc::vec![idx];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            let pushed_from = stack.len();
            let mut c = self.first_child[cur as usize];
            while c != INVALID {
                stack.push(c);
                c = self.next_sibling[c as usize];
            }
            // Pop siblings in insertion order.
            stack[pushed_from..].reverse();
        }
        out
    }
}
