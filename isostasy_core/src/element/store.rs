// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays element storage with allocation, topology, and property
//! management.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Rect, Size};
use understory_dirty::{CycleHandling, DirtyTracker};

use super::clip::ClipShape;
use super::id::{ElementId, INVALID};
use super::traverse::Children;
use crate::bounds::{BoundsCache, BoundsTier};
use crate::dirty;
use crate::error::LayoutError;
use crate::flags::{BoundsFlags, ElementFlags, LayoutFlags};
use crate::layout::{LayoutConfig, LayoutStats};
use crate::policy::{LayoutPolicy, OverlayPolicy};
use crate::transform::LocalTransform;

/// Whether an element takes part in layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Laid out, rendered, and hit-testable.
    #[default]
    Visible,
    /// Takes no space. Layout of the subtree is suspended: invalidations are
    /// kept but not executed until the element is visible again.
    Collapsed,
}

/// Struct-of-arrays storage for all elements.
///
/// Elements are addressed by [`ElementId`] handles. Each element occupies a
/// slot in parallel arrays; destroyed elements are recycled via a free list,
/// and generation counters prevent stale handle access.
pub struct ElementTree {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Properties (set by collaborators) --
    pub(crate) transform: Vec<LocalTransform>,
    pub(crate) target_transform: Vec<Option<LocalTransform>>,
    pub(crate) clip: Vec<Option<ClipShape>>,
    pub(crate) z_index: Vec<i32>,
    pub(crate) visibility: Vec<Visibility>,
    pub(crate) element_flags: Vec<ElementFlags>,
    pub(crate) redirect: Vec<u32>,
    pub(crate) policy: Vec<Option<Box<dyn LayoutPolicy>>>,

    // -- Layout state (written by passes) --
    pub(crate) layout_flags: Vec<LayoutFlags>,
    pub(crate) desired_size: Vec<Size>,
    pub(crate) previous_available: Vec<Size>,
    pub(crate) final_rect: Vec<Rect>,
    pub(crate) render_size: Vec<Size>,
    pub(crate) stats: Vec<LayoutStats>,

    // -- Bounds cache --
    pub(crate) bounds: Vec<BoundsCache>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Pass bookkeeping --
    pub(crate) config: LayoutConfig,
    pub(crate) measures_on_stack: u32,
    pub(crate) arranges_on_stack: u32,
    pub(crate) size_changed_queue: Vec<(u32, Size)>,
    pub(crate) propagation_steps: u64,
    pub(crate) pass_recomputed: u32,
    pub(crate) pass_visited: u32,
}

impl fmt::Debug for ElementTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementTree")
            .field("len", &self.len)
            .field("free", &self.free_list.len())
            .field("config", &self.config)
            .field("propagation_steps", &self.propagation_steps)
            .finish_non_exhaustive()
    }
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    /// Creates an empty tree with the default [`LayoutConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::new())
    }

    /// Creates an empty tree with the given limits.
    #[must_use]
    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            transform: Vec::new(),
            target_transform: Vec::new(),
            clip: Vec::new(),
            z_index: Vec::new(),
            visibility: Vec::new(),
            element_flags: Vec::new(),
            redirect: Vec::new(),
            policy: Vec::new(),
            layout_flags: Vec::new(),
            desired_size: Vec::new(),
            previous_available: Vec::new(),
            final_rect: Vec::new(),
            render_size: Vec::new(),
            stats: Vec::new(),
            bounds: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            config,
            measures_on_stack: 0,
            arranges_on_stack: 0,
            size_changed_queue: Vec::new(),
            propagation_steps: 0,
            pass_recomputed: 0,
            pass_visited: 0,
        }
    }

    /// Returns the layout limits.
    #[must_use]
    pub fn config(&self) -> LayoutConfig {
        self.config
    }

    /// Replaces the layout limits.
    pub fn set_config(&mut self, config: LayoutConfig) {
        self.config = config;
    }

    // -- Allocation API --

    /// Creates a new element with the default overlay policy.
    ///
    /// The element starts detached, visible, untransformed, unclipped, and
    /// dirty for both measure and arrange.
    pub fn create_element(&mut self) -> ElementId {
        self.create_element_with(OverlayPolicy)
    }

    /// Creates a new element laid out by `policy`.
    pub fn create_element_with(&mut self, policy: impl LayoutPolicy + 'static) -> ElementId {
        let fresh = LayoutFlags::MEASURE_DIRTY | LayoutFlags::ARRANGE_DIRTY;
        let policy: Box<dyn LayoutPolicy> = Box::new(policy);
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.transform[i] = LocalTransform::Identity;
            self.target_transform[i] = None;
            self.clip[i] = None;
            self.z_index[i] = 0;
            self.visibility[i] = Visibility::Visible;
            self.element_flags[i] = ElementFlags::default();
            self.redirect[i] = INVALID;
            self.policy[i] = Some(policy);
            self.layout_flags[i] = fresh;
            self.desired_size[i] = Size::ZERO;
            self.previous_available[i] = Size::ZERO;
            self.final_rect[i] = Rect::ZERO;
            self.render_size[i] = Size::ZERO;
            self.stats[i] = LayoutStats::default();
            self.bounds[i] = BoundsCache::default();
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.transform.push(LocalTransform::Identity);
            self.target_transform.push(None);
            self.clip.push(None);
            self.z_index.push(0);
            self.visibility.push(Visibility::Visible);
            self.element_flags.push(ElementFlags::default());
            self.redirect.push(INVALID);
            self.policy.push(Some(policy));
            self.layout_flags.push(fresh);
            self.desired_size.push(Size::ZERO);
            self.previous_available.push(Size::ZERO);
            self.final_rect.push(Rect::ZERO);
            self.render_size.push(Size::ZERO);
            self.stats.push(LayoutStats::default());
            self.bounds.push(BoundsCache::default());
            self.generation.push(0);
            idx
        };

        ElementId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys an element, freeing its slot for reuse.
    ///
    /// Any redirect pointing at the element is cleared, and queued
    /// size-changed notifications for it are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the element has children (remove them first) or if the
    /// handle is stale.
    pub fn destroy_element(&mut self, id: ElementId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy element with children"
        );

        if self.parent[idx as usize] != INVALID {
            self.detach(idx);
        }

        // Break redirects in both directions.
        let target = self.redirect[idx as usize];
        if target != INVALID {
            self.redirect[idx as usize] = INVALID;
            self.release_redirect_target(target);
        }
        for host in 0..self.len {
            if self.redirect[host as usize] == idx {
                self.redirect[host as usize] = INVALID;
                self.element_flags[host as usize].remove(ElementFlags::REDIRECT_HOST);
                self.update_redirect_in_subtree(self.parent[host as usize]);
            }
        }

        self.size_changed_queue.retain(|&(i, _)| i != idx);
        self.dirty.remove_key(idx);
        self.policy[idx as usize] = None;

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
    }

    /// Returns whether the given handle refers to a live element.
    #[must_use]
    pub fn is_alive(&self, id: ElementId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent`.
    ///
    /// Invalidates `parent`'s measure and child bounds, and carries the
    /// child's own dirtiness (including pending invalidations) into the new
    /// ancestry.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TreeCycle`] if `parent` is `child` or one of its
    /// descendants; the tree is left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `child` already has a parent.
    pub fn add_child(&mut self, parent: ElementId, child: ElementId) -> Result<(), LayoutError> {
        self.validate(parent);
        self.validate(child);
        let (p, c) = (parent.idx, child.idx);
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        if self.is_ancestor_or_self(c, p) {
            return Err(LayoutError::TreeCycle { parent, child });
        }
        self.link_last(p, c);
        self.attach(p, c);
        Ok(())
    }

    /// Inserts `child` before `sibling` in the sibling list.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TreeCycle`] if `sibling`'s parent is `child` or
    /// one of its descendants.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or
    /// `sibling` has no parent.
    pub fn insert_before(&mut self, child: ElementId, sibling: ElementId) -> Result<(), LayoutError> {
        self.validate(child);
        self.validate(sibling);
        let (c, s) = (child.idx, sibling.idx);
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");
        if self.is_ancestor_or_self(c, p) {
            return Err(LayoutError::TreeCycle {
                parent: self.id_at(p),
                child,
            });
        }

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];
        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        self.attach(p, c);
        Ok(())
    }

    /// Removes `child` from its current parent.
    ///
    /// The detached subtree keeps its flags; invalidations that reach it
    /// while detached are recorded as pending.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the element has no parent.
    pub fn remove_from_parent(&mut self, child: ElementId) {
        self.validate(child);
        assert!(
            self.parent[child.idx as usize] != INVALID,
            "element has no parent"
        );
        self.detach(child.idx);
    }

    /// Moves `child` to be the last child of `new_parent`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TreeCycle`] if `new_parent` is `child` or one of
    /// its descendants; the tree is left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale.
    pub fn reparent(&mut self, child: ElementId, new_parent: ElementId) -> Result<(), LayoutError> {
        self.validate(child);
        self.validate(new_parent);
        let (c, p) = (child.idx, new_parent.idx);
        if self.is_ancestor_or_self(c, p) {
            return Err(LayoutError::TreeCycle {
                parent: new_parent,
                child,
            });
        }
        if self.parent[c as usize] != INVALID {
            self.detach(c);
        }
        self.link_last(p, c);
        self.attach(p, c);
        Ok(())
    }

    /// Returns the parent of an element, if any.
    #[must_use]
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.id_at(p))
    }

    /// Returns an iterator over the direct children of an element.
    #[must_use]
    pub fn children(&self, id: ElementId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns all live elements without a parent.
    #[must_use]
    pub fn roots(&self) -> Vec<ElementId> {
        (0..self.len)
            .filter(|&idx| self.parent[idx as usize] == INVALID && !self.free_list.contains(&idx))
            .map(|idx| self.id_at(idx))
            .collect()
    }

    /// Drains the elements whose child lists changed (added, removed, or
    /// reordered) since the last call.
    pub fn take_topology_changes(&mut self) -> Vec<ElementId> {
        let changed: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();
        changed
            .into_iter()
            .filter(|&idx| idx < self.len && !self.free_list.contains(&idx))
            .map(|idx| self.id_at(idx))
            .collect()
    }

    // -- Property getters --

    /// Returns the local transform of an element.
    #[must_use]
    pub fn transform(&self, id: ElementId) -> LocalTransform {
        self.validate(id);
        self.transform[id.idx as usize]
    }

    /// Returns the animation target transform of an element, if one is set.
    #[must_use]
    pub fn target_transform(&self, id: ElementId) -> Option<LocalTransform> {
        self.validate(id);
        self.target_transform[id.idx as usize]
    }

    /// Returns the clip of an element.
    #[must_use]
    pub fn clip(&self, id: ElementId) -> Option<ClipShape> {
        self.validate(id);
        self.clip[id.idx as usize]
    }

    /// Returns the z-index of an element.
    #[must_use]
    pub fn z_index(&self, id: ElementId) -> i32 {
        self.validate(id);
        self.z_index[id.idx as usize]
    }

    /// Returns the visibility of an element.
    #[must_use]
    pub fn visibility(&self, id: ElementId) -> Visibility {
        self.validate(id);
        self.visibility[id.idx as usize]
    }

    /// Returns the collaborator-facing flags of an element.
    #[must_use]
    pub fn element_flags(&self, id: ElementId) -> ElementFlags {
        self.validate(id);
        self.element_flags[id.idx as usize]
    }

    /// Whether the element's own transform leaves the plane.
    #[must_use]
    pub fn has_3d_depth(&self, id: ElementId) -> bool {
        self.element_flags(id).contains(ElementFlags::HAS_3D_DEPTH)
    }

    /// Whether some strict descendant has 3D depth.
    #[must_use]
    pub fn has_3d_depth_in_subtree(&self, id: ElementId) -> bool {
        self.element_flags(id)
            .contains(ElementFlags::HAS_3D_DEPTH_IN_SUBTREE)
    }

    /// Returns the element drawn in place of this one's content, if any.
    #[must_use]
    pub fn redirect_target(&self, id: ElementId) -> Option<ElementId> {
        self.validate(id);
        let t = self.redirect[id.idx as usize];
        (t != INVALID).then(|| self.id_at(t))
    }

    /// Returns the layout flags of an element.
    #[must_use]
    pub fn layout_flags(&self, id: ElementId) -> LayoutFlags {
        self.validate(id);
        self.layout_flags[id.idx as usize]
    }

    /// Returns the size the element asked for in its last measure.
    ///
    /// Collapsed elements report zero.
    #[must_use]
    pub fn desired_size(&self, id: ElementId) -> Size {
        self.validate(id);
        self.desired_size_at(id.idx)
    }

    /// Returns the rect the element was last arranged into, in its parent's
    /// space.
    #[must_use]
    pub fn final_rect(&self, id: ElementId) -> Rect {
        self.validate(id);
        self.final_rect[id.idx as usize]
    }

    /// Returns the size the element's policy settled on in its last arrange.
    #[must_use]
    pub fn render_size(&self, id: ElementId) -> Size {
        self.validate(id);
        self.render_size[id.idx as usize]
    }

    /// Returns the recompute and visit counters of an element.
    #[must_use]
    pub fn layout_stats(&self, id: ElementId) -> LayoutStats {
        self.validate(id);
        self.stats[id.idx as usize]
    }

    // -- Mutation API (auto-invalidates) --

    /// Sets the local transform of an element.
    ///
    /// Invalidates outer bounds and effective viewports, and updates 3D
    /// depth bookkeeping along the ancestor chain.
    pub fn set_transform(&mut self, id: ElementId, transform: LocalTransform) {
        self.validate(id);
        let idx = id.idx;
        self.transform[idx as usize] = transform;
        self.element_flags[idx as usize].set(ElementFlags::HAS_3D_DEPTH, transform.has_depth());
        self.update_depth_in_subtree(self.parent[idx as usize]);
        self.invalidate_bounds_at(idx, BoundsTier::Outer);
        self.viewport_inputs_changed(idx);
    }

    /// Sets the transform an animation is heading towards.
    ///
    /// Only [`global_bounds`](Self::global_bounds) reads it, when asked to
    /// prefer target values.
    pub fn set_target_transform(&mut self, id: ElementId, transform: Option<LocalTransform>) {
        self.validate(id);
        self.target_transform[id.idx as usize] = transform;
    }

    /// Sets the clip of an element.
    pub fn set_clip(&mut self, id: ElementId, clip: Option<ClipShape>) {
        self.validate(id);
        self.clip[id.idx as usize] = clip;
        self.invalidate_bounds_at(id.idx, BoundsTier::Outer);
        self.viewport_inputs_changed(id.idx);
    }

    /// Sets the z-index of an element, re-sorting it among its siblings.
    pub fn set_z_index(&mut self, id: ElementId, z_index: i32) {
        self.validate(id);
        let idx = id.idx;
        if self.z_index[idx as usize] == z_index {
            return;
        }
        self.z_index[idx as usize] = z_index;
        let p = self.parent[idx as usize];
        if p != INVALID {
            self.invalidate_arrange_at(p);
            self.dirty.mark(p, dirty::TOPOLOGY);
        }
    }

    /// Sets the visibility of an element.
    ///
    /// Collapsing suspends layout of the subtree. Restoring converts pending
    /// invalidations into live ones and re-propagates any dirtiness that
    /// accumulated below.
    pub fn set_visibility(&mut self, id: ElementId, visibility: Visibility) {
        self.validate(id);
        let idx = id.idx;
        if self.visibility[idx as usize] == visibility {
            return;
        }
        self.visibility[idx as usize] = visibility;
        if visibility == Visibility::Visible {
            self.resume_layout(idx);
            self.viewport_inputs_changed(idx);
        }
        let p = self.parent[idx as usize];
        if p != INVALID {
            self.invalidate_measure_at(p);
            self.invalidate_bounds_at(p, BoundsTier::ChildUnion);
        }
    }

    /// Sets whether the element accepts input.
    pub fn set_enabled(&mut self, id: ElementId, enabled: bool) {
        self.validate(id);
        self.element_flags[id.idx as usize].set(ElementFlags::ENABLED, enabled);
    }

    /// Sets whether the element takes part in hit testing.
    pub fn set_hit_test_visible(&mut self, id: ElementId, visible: bool) {
        self.validate(id);
        self.element_flags[id.idx as usize].set(ElementFlags::HIT_TEST_VISIBLE, visible);
    }

    /// Temporarily suppresses hit testing of the element and its subtree.
    pub fn set_hit_test_suppressed(&mut self, id: ElementId, suppressed: bool) {
        self.validate(id);
        self.element_flags[id.idx as usize].set(ElementFlags::HIT_TEST_SUPPRESSED, suppressed);
    }

    /// Draws `target` at `host`'s position instead of its logical one.
    ///
    /// The target is skipped by hit testing at its logical position and
    /// walked through `host` instead. Several hosts may share a target; it
    /// stays hidden until the last of them lets go.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::RedirectCycle`] if `host` can be reached from
    /// `target` through children or other redirects (for example when
    /// `target` is an ancestor of `host`). Nothing changes in that case.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale or if `target` is `host`.
    pub fn set_redirect_target(
        &mut self,
        host: ElementId,
        target: Option<ElementId>,
    ) -> Result<(), LayoutError> {
        self.validate(host);
        let h = host.idx;
        if let Some(t) = target {
            self.validate(t);
            assert!(t != host, "element cannot redirect to itself");
            if self.redirect_reaches(t.idx, h) {
                return Err(LayoutError::RedirectCycle { host, target: t });
            }
        }

        let old = self.redirect[h as usize];
        self.redirect[h as usize] = target.map_or(INVALID, |t| t.idx);
        if old != INVALID {
            self.release_redirect_target(old);
        }
        if let Some(t) = target {
            self.element_flags[t.idx as usize].insert(ElementFlags::HIDDEN_FOR_REDIRECT);
        }
        self.element_flags[h as usize].set(ElementFlags::REDIRECT_HOST, target.is_some());
        self.update_redirect_in_subtree(self.parent[h as usize]);
        Ok(())
    }

    /// Whether a hit-test walk entering `from` can arrive at `needle`.
    fn redirect_reaches(&self, from: u32, needle: u32) -> bool {
        let mut seen = vec![false; self.len as usize];
        let mut stack = vec![from];
        while let Some(idx) = stack.pop() {
            if idx == needle {
                return true;
            }
            if core::mem::replace(&mut seen[idx as usize], true) {
                continue;
            }
            let t = self.redirect[idx as usize];
            if t != INVALID {
                stack.push(t);
            }
            stack.extend(self.child_slots(idx));
        }
        false
    }

    /// Unhides `target` unless another host still draws it.
    fn release_redirect_target(&mut self, target: u32) {
        if !self.redirect.contains(&target) {
            self.element_flags[target as usize].remove(ElementFlags::HIDDEN_FOR_REDIRECT);
        }
    }

    /// Replaces the layout policy of an element and invalidates its measure
    /// and content bounds.
    pub fn set_policy(&mut self, id: ElementId, policy: impl LayoutPolicy + 'static) {
        self.validate(id);
        self.policy[id.idx as usize] = Some(Box::new(policy));
        self.invalidate_measure_at(id.idx);
        self.invalidate_bounds_at(id.idx, BoundsTier::ContentInner);
    }

    /// Opts an element in or out of size-changed notifications from
    /// [`update_layout`](Self::update_layout).
    pub fn set_wants_size_changed(&mut self, id: ElementId, wants: bool) {
        self.validate(id);
        self.layout_flags[id.idx as usize].set(LayoutFlags::WANTS_SIZE_CHANGED, wants);
    }

    /// Marks or unmarks an element as the root of layout passes.
    ///
    /// Roots are layout-eligible without a parent, so promoting one converts
    /// its pending invalidations into live ones.
    pub fn set_layout_root(&mut self, id: ElementId, is_root: bool) {
        self.validate(id);
        if is_root {
            self.promote_layout_root(id.idx);
        } else {
            self.element_flags[id.idx as usize].remove(ElementFlags::LAYOUT_ROOT);
        }
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: ElementId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale ElementId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Builds a handle for a live slot.
    pub(crate) fn id_at(&self, idx: u32) -> ElementId {
        ElementId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    pub(crate) fn is_collapsed_at(&self, idx: u32) -> bool {
        self.visibility[idx as usize] == Visibility::Collapsed
    }

    pub(crate) fn desired_size_at(&self, idx: u32) -> Size {
        if self.is_collapsed_at(idx) {
            Size::ZERO
        } else {
            self.desired_size[idx as usize]
        }
    }

    /// Appends `c` to `p`'s child list without touching dirty state.
    fn link_last(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }

    /// Bookkeeping after `c` was linked under `p`.
    fn attach(&mut self, p: u32, c: u32) {
        // Viewport recompute flows from parent to child.
        let _ = self.dirty.add_dependency(c, p, dirty::VIEWPORT);
        self.dirty.mark(p, dirty::TOPOLOGY);

        self.invalidate_measure_at(p);
        self.invalidate_bounds_at(p, BoundsTier::ChildUnion);
        self.attach_layout_state(c);
        self.update_depth_in_subtree(p);
        self.update_redirect_in_subtree(p);
        if self.layout_flags[c as usize].is_viewport_interested() {
            self.recompute_viewport_contribution(p);
            self.invalidate_viewport_at(c);
        }
    }

    /// Unlinks `c` from its parent and repairs the old ancestry.
    fn detach(&mut self, c: u32) {
        let p = self.parent[c as usize];
        self.unlink_from_parent(c);
        self.dirty.remove_dependency(c, p, dirty::VIEWPORT);
        self.dirty.mark(p, dirty::TOPOLOGY);

        self.invalidate_measure_at(p);
        self.invalidate_bounds_at(p, BoundsTier::ChildUnion);
        self.update_depth_in_subtree(p);
        self.update_redirect_in_subtree(p);
        self.recompute_viewport_contribution(p);
    }

    /// Recomputes [`ElementFlags::HAS_3D_DEPTH_IN_SUBTREE`] from `idx`
    /// upward, stopping once a value no longer changes.
    pub(crate) fn update_depth_in_subtree(&mut self, mut idx: u32) {
        while idx != INVALID {
            let any = self.any_child(idx, ElementFlags::has_depth_below);
            let flags = &mut self.element_flags[idx as usize];
            if flags.contains(ElementFlags::HAS_3D_DEPTH_IN_SUBTREE) == any {
                break;
            }
            flags.set(ElementFlags::HAS_3D_DEPTH_IN_SUBTREE, any);
            // Outer bounds switch between cached and explicit descent.
            self.invalidate_bounds_at(idx, BoundsTier::ChildUnion);
            idx = self.parent[idx as usize];
        }
    }

    /// Recomputes [`ElementFlags::HAS_REDIRECT_IN_SUBTREE`] from `idx`
    /// upward, stopping once a value no longer changes.
    pub(crate) fn update_redirect_in_subtree(&mut self, mut idx: u32) {
        while idx != INVALID {
            let any = self.any_child(idx, ElementFlags::has_redirect_below);
            let flags = &mut self.element_flags[idx as usize];
            if flags.contains(ElementFlags::HAS_REDIRECT_IN_SUBTREE) == any {
                break;
            }
            flags.set(ElementFlags::HAS_REDIRECT_IN_SUBTREE, any);
            idx = self.parent[idx as usize];
        }
    }

    fn any_child(&self, idx: u32, pred: fn(ElementFlags) -> bool) -> bool {
        let mut c = self.first_child[idx as usize];
        while c != INVALID {
            if pred(self.element_flags[c as usize]) {
                return true;
            }
            c = self.next_sibling[c as usize];
        }
        false
    }

    /// Resets the bounds dirty bits of a slot to "everything stale".
    pub(crate) fn mark_all_bounds_dirty(&mut self, idx: u32) {
        self.bounds[idx as usize].dirty = BoundsFlags::all();
    }
}
