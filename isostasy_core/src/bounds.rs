// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Four-tier bounds cache.
//!
//! Each element caches, in its local space:
//!
//! - **content inner**: what the element draws itself, from its policy;
//! - **child union**: union of the children's outer bounds;
//! - **combined inner**: union of the two above;
//!
//! and, in its parent's space:
//!
//! - **outer**: combined inner, intersected with the element's clip and
//!   mapped through its transform and arranged offset.
//!
//! Invalidating a tier also marks every tier derived from it, then the
//! parent's child union and everything above it. Reads recompute lazily and
//! are idempotent: a tier whose dirty bit is clear is returned from cache.
//!
//! Elements with 3D depth have no outer bounds (the result would not be a
//! meaningful rectangle in the parent's plane), so they drop out of their
//! ancestors' child unions. [`ElementTree::bounds_with_3d`] descends into
//! them explicitly instead.

use kurbo::Rect;

use crate::element::{ElementId, ElementTree, INVALID};
use crate::flags::{BoundsFlags, ElementFlags, LayoutFlags};
use crate::transform::LocalTransform;

/// One tier of the bounds cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundsTier {
    /// What the element draws itself.
    ContentInner,
    /// Union of the children's outer bounds.
    ChildUnion,
    /// Content inner united with child union.
    CombinedInner,
    /// Combined inner, clipped, in the parent's space.
    Outer,
}

impl BoundsTier {
    /// Dirty bits of this tier and every tier derived from it.
    #[must_use]
    pub fn with_dependents(self) -> BoundsFlags {
        match self {
            Self::ContentInner => {
                BoundsFlags::CONTENT_INNER_DIRTY
                    | BoundsFlags::COMBINED_INNER_DIRTY
                    | BoundsFlags::OUTER_DIRTY
            }
            Self::ChildUnion => {
                BoundsFlags::CHILD_DIRTY | BoundsFlags::COMBINED_INNER_DIRTY | BoundsFlags::OUTER_DIRTY
            }
            Self::CombinedInner => BoundsFlags::COMBINED_INNER_DIRTY | BoundsFlags::OUTER_DIRTY,
            Self::Outer => BoundsFlags::OUTER_DIRTY,
        }
    }
}

/// Cached bounds of one element.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BoundsCache {
    pub(crate) content_inner: Option<Rect>,
    pub(crate) child: Option<Rect>,
    pub(crate) combined_inner: Option<Rect>,
    pub(crate) outer: Option<Rect>,
    pub(crate) dirty: BoundsFlags,
}

/// Options for [`ElementTree::global_bounds`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalBoundsOptions {
    /// Skip every clip on the way up.
    pub ignore_clipping: bool,
    /// Prefer animation target transforms over current ones.
    pub use_target_values: bool,
}

/// Union of two optional rectangles.
pub(crate) fn union_opt(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Intersection of two rectangles, `None` if they share no area. Rectangles
/// that only touch along an edge or at a corner do not intersect.
pub(crate) fn intersect_opt(a: Rect, b: Rect) -> Option<Rect> {
    if a.x0 >= b.x1 || b.x0 >= a.x1 || a.y0 >= b.y1 || b.y0 >= a.y1 {
        return None;
    }
    Some(a.intersect(b))
}

impl ElementTree {
    /// Marks `tier` and its dependents stale, then the ancestors' child
    /// unions.
    ///
    /// Propagation stops at an ancestor whose child union is already stale,
    /// and at collapsed elements.
    pub fn invalidate_bounds(&mut self, id: ElementId, tier: BoundsTier) {
        self.validate(id);
        self.invalidate_bounds_at(id.idx, tier);
    }

    /// Dirty bits of the element's bounds tiers.
    #[must_use]
    pub fn bounds_dirty(&self, id: ElementId) -> BoundsFlags {
        self.validate(id);
        self.bounds[id.idx as usize].dirty
    }

    /// What the element draws itself, in local space.
    pub fn content_inner_bounds(&mut self, id: ElementId) -> Option<Rect> {
        self.validate(id);
        self.ensure_content_inner(id.idx)
    }

    /// Union of the children's outer bounds, in local space.
    pub fn child_bounds(&mut self, id: ElementId) -> Option<Rect> {
        self.validate(id);
        self.ensure_child_bounds(id.idx)
    }

    /// Content and children together, in local space.
    pub fn combined_inner_bounds(&mut self, id: ElementId) -> Option<Rect> {
        self.validate(id);
        self.ensure_combined_inner(id.idx)
    }

    /// Clipped combined bounds in the parent's space.
    ///
    /// `None` for elements with 3D depth, or with nothing to draw.
    pub fn outer_bounds(&mut self, id: ElementId) -> Option<Rect> {
        self.validate(id);
        self.ensure_outer(id.idx)
    }

    /// Combined bounds in local space, descending explicitly into children
    /// that have 3D depth (which ordinary bounds leave out).
    pub fn bounds_with_3d(&mut self, id: ElementId) -> Option<Rect> {
        self.validate(id);
        self.bounds_3d_at(id.idx)
    }

    /// Bounds of the element's subtree mapped into the root's space.
    ///
    /// Clips along the way are applied unless
    /// [`ignore_clipping`](GlobalBoundsOptions::ignore_clipping) is set.
    pub fn global_bounds(&mut self, id: ElementId, options: GlobalBoundsOptions) -> Option<Rect> {
        self.validate(id);
        let idx = id.idx;
        let mut rect = if self.element_flags[idx as usize].has_depth_below() {
            self.bounds_3d_at(idx)
        } else {
            self.ensure_combined_inner(idx)
        }?;

        let mut cur = idx;
        while cur != INVALID {
            if !options.ignore_clipping {
                rect = self.clip_to(cur, rect)?;
            }
            rect = self
                .local_to_parent(cur, options.use_target_values)
                .transform_rect_bbox(rect)?;
            cur = self.parent[cur as usize];
        }
        Some(rect)
    }

    pub(crate) fn invalidate_bounds_at(&mut self, idx: u32, tier: BoundsTier) {
        let mask = tier.with_dependents();
        let cache = &mut self.bounds[idx as usize];
        if cache.dirty.contains(mask) {
            return;
        }
        cache.dirty.insert(mask);
        if self.is_collapsed_at(idx) {
            return;
        }

        let mut p = self.parent[idx as usize];
        let up = BoundsTier::ChildUnion.with_dependents();
        while p != INVALID {
            let cache = &mut self.bounds[p as usize];
            if cache.dirty.contains(up) {
                break;
            }
            cache.dirty.insert(up);
            if self.is_collapsed_at(p) {
                break;
            }
            p = self.parent[p as usize];
        }
    }

    /// The element's transform followed by its arranged offset.
    pub(crate) fn local_to_parent(&self, idx: u32, use_target: bool) -> LocalTransform {
        let i = idx as usize;
        let transform = if use_target {
            self.target_transform[i].unwrap_or(self.transform[i])
        } else {
            self.transform[i]
        };
        transform.then_translate(self.final_rect[i].origin().to_vec2())
    }

    /// Intersects a local rect with the element's clip, if any.
    pub(crate) fn clip_to(&self, idx: u32, rect: Rect) -> Option<Rect> {
        match self.clip[idx as usize] {
            Some(clip) => intersect_opt(rect, clip.bounds()),
            None => Some(rect),
        }
    }

    pub(crate) fn ensure_content_inner(&mut self, idx: u32) -> Option<Rect> {
        let i = idx as usize;
        if !self.bounds[i].dirty.contains(BoundsFlags::CONTENT_INNER_DIRTY) {
            return self.bounds[i].content_inner;
        }
        let render = self.render_size[i];
        let content = self.policy[i]
            .as_ref()
            .and_then(|policy| policy.content_bounds(render));
        self.bounds[i].content_inner = content;
        self.bounds[i].dirty.remove(BoundsFlags::CONTENT_INNER_DIRTY);
        content
    }

    /// Whether the cached child union can no longer be trusted.
    fn child_bounds_stale(&self, idx: u32) -> bool {
        if self.bounds[idx as usize].dirty.contains(BoundsFlags::CHILD_DIRTY) {
            return true;
        }
        let mut c = self.first_child[idx as usize];
        while c != INVALID {
            if self.layout_flags[c as usize].contains(LayoutFlags::ARRANGE_DIRTY)
                || self.bounds[c as usize].dirty.contains(BoundsFlags::CHILD_DIRTY)
            {
                return true;
            }
            c = self.next_sibling[c as usize];
        }
        false
    }

    pub(crate) fn ensure_child_bounds(&mut self, idx: u32) -> Option<Rect> {
        let i = idx as usize;
        if !self.child_bounds_stale(idx) {
            return self.bounds[i].child;
        }
        let mut union = None;
        for c in self.child_slots(idx) {
            if self.is_collapsed_at(c) {
                continue;
            }
            union = union_opt(union, self.ensure_outer(c));
        }
        self.bounds[i].child = union;
        self.bounds[i].dirty.remove(BoundsFlags::CHILD_DIRTY);
        union
    }

    pub(crate) fn ensure_combined_inner(&mut self, idx: u32) -> Option<Rect> {
        let i = idx as usize;
        let stale = self.bounds[i]
            .dirty
            .intersects(BoundsFlags::CONTENT_INNER_DIRTY | BoundsFlags::COMBINED_INNER_DIRTY)
            || self.child_bounds_stale(idx);
        if !stale {
            return self.bounds[i].combined_inner;
        }
        let content = self.ensure_content_inner(idx);
        let children = self.ensure_child_bounds(idx);
        let combined = union_opt(content, children);
        self.bounds[i].combined_inner = combined;
        self.bounds[i].dirty.remove(BoundsFlags::COMBINED_INNER_DIRTY);
        combined
    }

    pub(crate) fn ensure_outer(&mut self, idx: u32) -> Option<Rect> {
        let i = idx as usize;
        if self.element_flags[i].contains(ElementFlags::HAS_3D_DEPTH) {
            self.bounds[i].outer = None;
            self.bounds[i].dirty.remove(BoundsFlags::OUTER_DIRTY);
            return None;
        }
        let stale = self.bounds[i].dirty.intersects(
            BoundsFlags::CONTENT_INNER_DIRTY
                | BoundsFlags::COMBINED_INNER_DIRTY
                | BoundsFlags::OUTER_DIRTY,
        ) || self.child_bounds_stale(idx);
        if !stale {
            return self.bounds[i].outer;
        }
        let outer = self
            .ensure_combined_inner(idx)
            .and_then(|inner| self.clip_to(idx, inner))
            .and_then(|clipped| self.local_to_parent(idx, false).transform_rect_bbox(clipped));
        self.bounds[i].outer = outer;
        self.bounds[i].dirty.remove(BoundsFlags::OUTER_DIRTY);
        outer
    }

    fn bounds_3d_at(&mut self, idx: u32) -> Option<Rect> {
        let mut acc = self.ensure_content_inner(idx);
        for c in self.child_slots(idx) {
            if self.is_collapsed_at(c) {
                continue;
            }
            let contribution = if self.element_flags[c as usize].has_depth_below() {
                self.bounds_3d_at(c)
                    .and_then(|r| self.clip_to(c, r))
                    .and_then(|r| self.local_to_parent(c, false).transform_rect_bbox(r))
            } else {
                self.ensure_outer(c)
            };
            acc = union_opt(acc, contribution);
        }
        acc
    }
}
