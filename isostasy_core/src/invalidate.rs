// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-path propagation.
//!
//! Invalidating an element sets its own dirty bit and then walks the parent
//! chain setting the matching path bit, stopping at the first ancestor that
//! already carries it. Repeated invalidation of the same element is therefore
//! O(1), and invalidating a sibling of a dirty element costs one step per
//! ancestor that is not yet on the path.
//!
//! An element that cannot take part in layout (collapsed, or detached without
//! being a layout root) records the invalidation as *pending* instead. Pending
//! dirtiness is converted into live dirtiness, and propagated, when the
//! element becomes eligible again.

use alloc::vec;
use alloc::vec::Vec;

use crate::element::{ElementId, ElementTree, INVALID};
use crate::flags::{ElementFlags, LayoutFlags};

impl ElementTree {
    /// Marks the element's desired size stale.
    ///
    /// Does nothing if the element is already measure dirty. If the element
    /// is not layout-eligible the invalidation is kept as pending.
    pub fn invalidate_measure(&mut self, id: ElementId) {
        self.validate(id);
        self.invalidate_measure_at(id.idx);
    }

    /// Marks the element's arranged rect stale.
    ///
    /// Does nothing if the element is already arrange dirty. If the element
    /// is not layout-eligible the invalidation is kept as pending.
    pub fn invalidate_arrange(&mut self, id: ElementId) {
        self.validate(id);
        self.invalidate_arrange_at(id.idx);
    }

    /// Marks the element's automation peer stale.
    pub fn invalidate_automation_peer(&mut self, id: ElementId) {
        self.validate(id);
        let idx = id.idx;
        if self.layout_flags[idx as usize].contains(LayoutFlags::AUTOMATION_PEER_DIRTY) {
            return;
        }
        self.layout_flags[idx as usize].insert(LayoutFlags::AUTOMATION_PEER_DIRTY);
        self.propagate_path(idx, LayoutFlags::ON_AUTOMATION_PEER_DIRTY_PATH);
    }

    /// Invalidates measure, arrange, and all bounds tiers of every element in
    /// the subtree, and marks the root as entirely dirty.
    pub fn invalidate_subtree(&mut self, id: ElementId) {
        self.validate(id);
        self.element_flags[id.idx as usize].insert(ElementFlags::ENTIRE_SUBTREE_DIRTY);
        for idx in self.subtree_slots(id.idx) {
            self.invalidate_measure_at(idx);
            self.invalidate_arrange_at(idx);
            self.mark_all_bounds_dirty(idx);
        }
        self.invalidate_bounds_at(id.idx, crate::bounds::BoundsTier::ContentInner);
    }

    /// Whether [`invalidate_subtree`](Self::invalidate_subtree) was called on
    /// the element since the flag was last cleared.
    #[must_use]
    pub fn is_entire_subtree_dirty(&self, id: ElementId) -> bool {
        self.validate(id);
        self.element_flags[id.idx as usize].contains(ElementFlags::ENTIRE_SUBTREE_DIRTY)
    }

    /// Clears the entire-subtree marker after a collaborator has
    /// resynchronized the subtree.
    pub fn clear_entire_subtree_dirty(&mut self, id: ElementId) {
        self.validate(id);
        self.element_flags[id.idx as usize].remove(ElementFlags::ENTIRE_SUBTREE_DIRTY);
    }

    /// Collects and clears the elements under `root` whose automation peers
    /// are stale, in depth-first order.
    ///
    /// Only subtrees on the automation dirty path are visited.
    pub fn take_automation_peer_dirty(&mut self, root: ElementId) -> Vec<ElementId> {
        self.validate(root);
        let mask = LayoutFlags::AUTOMATION_PEER_DIRTY | LayoutFlags::ON_AUTOMATION_PEER_DIRTY_PATH;
        let mut out = Vec::new();
        let mut stack = vec![root.idx];
        while let Some(idx) = stack.pop() {
            let flags = self.layout_flags[idx as usize];
            if !flags.intersects(mask) {
                continue;
            }
            self.layout_flags[idx as usize].remove(mask);
            if flags.contains(LayoutFlags::AUTOMATION_PEER_DIRTY) {
                out.push(self.id_at(idx));
            }
            let mut children = self.child_slots(idx);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Whether layout of the element currently runs (visible, and attached or
    /// a layout root).
    #[must_use]
    pub fn is_layout_eligible(&self, id: ElementId) -> bool {
        self.validate(id);
        self.is_layout_eligible_at(id.idx)
    }

    /// Total ancestor steps taken by dirty-path propagation since the tree
    /// was created.
    #[must_use]
    pub fn propagation_steps(&self) -> u64 {
        self.propagation_steps
    }

    pub(crate) fn is_layout_eligible_at(&self, idx: u32) -> bool {
        !self.is_collapsed_at(idx)
            && (self.parent[idx as usize] != INVALID
                || self.element_flags[idx as usize].contains(ElementFlags::LAYOUT_ROOT))
    }

    pub(crate) fn invalidate_measure_at(&mut self, idx: u32) {
        let flags = self.layout_flags[idx as usize];
        if flags.contains(LayoutFlags::MEASURE_DIRTY) {
            return;
        }
        if !self.is_layout_eligible_at(idx) {
            self.layout_flags[idx as usize].insert(LayoutFlags::MEASURE_DIRTY_PENDING);
            return;
        }
        self.layout_flags[idx as usize].insert(LayoutFlags::MEASURE_DIRTY);
        self.propagate_path(idx, LayoutFlags::ON_MEASURE_DIRTY_PATH);
        if self.arranges_on_stack > 0 {
            self.note_measure_during_arrange(idx);
        }
    }

    pub(crate) fn invalidate_arrange_at(&mut self, idx: u32) {
        let flags = self.layout_flags[idx as usize];
        if flags.contains(LayoutFlags::ARRANGE_DIRTY) {
            return;
        }
        if !self.is_layout_eligible_at(idx) {
            self.layout_flags[idx as usize].insert(LayoutFlags::ARRANGE_DIRTY_PENDING);
            return;
        }
        self.layout_flags[idx as usize].insert(LayoutFlags::ARRANGE_DIRTY);
        self.propagate_path(idx, LayoutFlags::ON_ARRANGE_DIRTY_PATH);
    }

    /// Sets `path` on the ancestors of `idx`.
    ///
    /// Stops at the first ancestor that already has it, and after marking a
    /// collapsed ancestor (its parent learns about the subtree only when it is
    /// restored).
    pub(crate) fn propagate_path(&mut self, idx: u32, path: LayoutFlags) {
        let mut p = self.parent[idx as usize];
        while p != INVALID {
            self.propagation_steps += 1;
            let flags = &mut self.layout_flags[p as usize];
            if flags.contains(path) {
                break;
            }
            flags.insert(path);
            if self.is_collapsed_at(p) {
                break;
            }
            p = self.parent[p as usize];
        }
    }

    /// Flags the innermost arranging ancestor-or-self so it re-arranges after
    /// the current arrange finishes.
    fn note_measure_during_arrange(&mut self, idx: u32) {
        let mut cur = idx;
        while cur != INVALID {
            let flags = &mut self.layout_flags[cur as usize];
            if flags.contains(LayoutFlags::ON_ARRANGE_STACK) {
                flags.insert(LayoutFlags::MEASURE_DURING_ARRANGE);
                return;
            }
            cur = self.parent[cur as usize];
        }
    }

    /// Turns pending invalidations into live ones if the element is eligible.
    fn convert_pending(&mut self, idx: u32) {
        if !self.is_layout_eligible_at(idx) {
            return;
        }
        let flags = self.layout_flags[idx as usize];
        if flags.contains(LayoutFlags::MEASURE_DIRTY_PENDING) {
            self.layout_flags[idx as usize].remove(LayoutFlags::MEASURE_DIRTY_PENDING);
            self.invalidate_measure_at(idx);
        }
        if flags.contains(LayoutFlags::ARRANGE_DIRTY_PENDING) {
            self.layout_flags[idx as usize].remove(LayoutFlags::ARRANGE_DIRTY_PENDING);
            self.invalidate_arrange_at(idx);
        }
    }

    /// Re-announces the element's existing dirtiness to its ancestors.
    fn repropagate(&mut self, idx: u32) {
        if self.is_collapsed_at(idx) {
            return;
        }
        let flags = self.layout_flags[idx as usize];
        if flags.intersects(LayoutFlags::MEASURE_DIRTY | LayoutFlags::ON_MEASURE_DIRTY_PATH) {
            self.propagate_path(idx, LayoutFlags::ON_MEASURE_DIRTY_PATH);
        }
        if flags.intersects(LayoutFlags::ARRANGE_DIRTY | LayoutFlags::ON_ARRANGE_DIRTY_PATH) {
            self.propagate_path(idx, LayoutFlags::ON_ARRANGE_DIRTY_PATH);
        }
        if flags.intersects(
            LayoutFlags::AUTOMATION_PEER_DIRTY | LayoutFlags::ON_AUTOMATION_PEER_DIRTY_PATH,
        ) {
            self.propagate_path(idx, LayoutFlags::ON_AUTOMATION_PEER_DIRTY_PATH);
        }
        if flags.requires_viewport_walk() {
            self.propagate_path(idx, LayoutFlags::ON_VIEWPORT_DIRTY_PATH);
        }
    }

    /// Called after `idx` gained a parent.
    pub(crate) fn attach_layout_state(&mut self, idx: u32) {
        self.convert_pending(idx);
        self.repropagate(idx);
    }

    /// Called after `idx` became visible again.
    pub(crate) fn resume_layout(&mut self, idx: u32) {
        self.convert_pending(idx);
        self.repropagate(idx);
    }

    pub(crate) fn promote_layout_root(&mut self, idx: u32) {
        self.element_flags[idx as usize].insert(ElementFlags::LAYOUT_ROOT);
        self.convert_pending(idx);
    }
}
