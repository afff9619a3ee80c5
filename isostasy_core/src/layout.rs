// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Measure and arrange passes and the `update_layout` driver.
//!
//! A pass starts at a root and only descends where flags say it must: an
//! element whose own bit is set runs its [`LayoutPolicy`](crate::policy::LayoutPolicy)
//! (*recompute*), and an element that only carries a path bit is walked
//! through to the dirty children below it (*visit*). Clean subtrees are never
//! entered.
//!
//! [`ElementTree::update_layout`] repeats single passes (measure, then arrange,
//! then the effective viewport walk, then size-changed delivery) until the
//! root is clean, giving up after [`LayoutConfig::max_layout_iterations`].

use alloc::vec::Vec;

use kurbo::{Point, Rect, Size};

use crate::bounds::BoundsTier;
use crate::element::{ElementId, ElementTree, INVALID};
use crate::error::LayoutError;
use crate::flags::LayoutFlags;
use crate::policy::LayoutCx;
#[cfg(feature = "trace-rich")]
use crate::trace::ElementLayoutEvent;
use crate::trace::{
    LayoutCycleEvent, LayoutSummaryBuilder, PassBeginEvent, PassEndEvent, PassKind, Tracer,
};
use crate::viewport::EffectiveViewportChange;

/// Limits applied by the layout passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Passes `update_layout` runs before reporting
    /// [`LayoutError::LayoutCycle`].
    pub max_layout_iterations: u32,
    /// Measures (or arranges) that may be nested on the stack before
    /// reporting [`LayoutError::DepthExceeded`].
    pub max_layout_depth: u32,
}

impl LayoutConfig {
    /// The default limits: 250 iterations and 250 nested calls.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_layout_iterations: 250,
            max_layout_depth: 250,
        }
    }

    /// Returns a copy with a different iteration limit.
    #[must_use]
    pub const fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_layout_iterations = iterations;
        self
    }

    /// Returns a copy with a different nesting limit.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_layout_depth = depth;
        self
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-element pass counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutStats {
    /// Times the measure policy ran.
    pub measure_count: u32,
    /// Times the arrange policy ran.
    pub arrange_count: u32,
    /// Times a measure pass entered the element (recompute or path walk).
    pub measure_visits: u32,
    /// Times an arrange pass entered the element (recompute or path walk).
    pub arrange_visits: u32,
}

/// A render size change delivered by `update_layout`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizeChangedEvent {
    /// The element that changed size.
    pub element: ElementId,
    /// Render size before the change.
    pub previous: Size,
    /// Render size after the change.
    pub new: Size,
}

/// What a settled `update_layout` produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutReport {
    /// Iterations run, including the final clean check.
    pub iterations: u32,
    /// Size changes, outermost first.
    pub size_changed: Vec<SizeChangedEvent>,
    /// Effective viewport changes, in tree order.
    pub viewport_changes: Vec<EffectiveViewportChange>,
}

impl ElementTree {
    /// Measures `id` with `available` space and returns its desired size.
    ///
    /// # Errors
    ///
    /// See [`measure_traced`](Self::measure_traced).
    pub fn measure(&mut self, id: ElementId, available: Size) -> Result<Size, LayoutError> {
        self.measure_traced(id, available, &mut Tracer::none())
    }

    /// Measures `id`, emitting per-element trace events.
    ///
    /// Collapsed elements measure as zero without touching their flags.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::MeasureCycle`] if the element re-enters its own measure.
    /// - [`LayoutError::DepthExceeded`] if nesting exceeds the configured depth.
    /// - Any error returned by a policy in the subtree.
    ///
    /// The failing element is left measure dirty.
    pub fn measure_traced(
        &mut self,
        id: ElementId,
        available: Size,
        tracer: &mut Tracer<'_>,
    ) -> Result<Size, LayoutError> {
        self.validate(id);
        self.measure_at(id.idx, available, tracer)
    }

    /// Arranges `id` into `rect`, given in its parent's space.
    ///
    /// # Errors
    ///
    /// See [`arrange_traced`](Self::arrange_traced).
    pub fn arrange(&mut self, id: ElementId, rect: Rect) -> Result<(), LayoutError> {
        self.arrange_traced(id, rect, &mut Tracer::none())
    }

    /// Arranges `id`, emitting per-element trace events.
    ///
    /// An element that still needs measuring is measured first, with its
    /// previous constraint (or `rect`'s size if it was never measured).
    ///
    /// # Errors
    ///
    /// - [`LayoutError::ArrangeCycle`] if the element re-enters its own arrange.
    /// - Anything [`measure_traced`](Self::measure_traced) reports.
    pub fn arrange_traced(
        &mut self,
        id: ElementId,
        rect: Rect,
        tracer: &mut Tracer<'_>,
    ) -> Result<(), LayoutError> {
        self.validate(id);
        self.arrange_at(id.idx, rect, tracer)
    }

    /// Runs passes over `root` until it is clean.
    ///
    /// `root` becomes a layout root. It is measured with `available` and
    /// arranged at the origin with the same size.
    ///
    /// # Errors
    ///
    /// [`LayoutError::LayoutCycle`] if the tree does not settle within
    /// [`LayoutConfig::max_layout_iterations`], or the first error a pass
    /// reports.
    pub fn update_layout(&mut self, root: ElementId, available: Size) -> Result<LayoutReport, LayoutError> {
        self.update_layout_traced(root, available, &mut Tracer::none())
    }

    /// Runs passes over `root` until it is clean, emitting trace events.
    ///
    /// # Errors
    ///
    /// See [`update_layout`](Self::update_layout).
    pub fn update_layout_traced(
        &mut self,
        root: ElementId,
        available: Size,
        tracer: &mut Tracer<'_>,
    ) -> Result<LayoutReport, LayoutError> {
        self.validate(root);
        let r = root.idx;
        self.promote_layout_root(r);

        let mut report = LayoutReport::default();
        let mut summary = LayoutSummaryBuilder::new(r);
        let limit = self.config.max_layout_iterations;
        let viewport = Rect::from_origin_size(Point::ORIGIN, available);

        for iteration in 0..limit {
            report.iterations = iteration + 1;
            let Some(pass) = self.next_pass(r, available) else {
                tracer.layout_summary(&summary.finish(
                    report.iterations,
                    u32::try_from(report.size_changed.len()).unwrap_or(u32::MAX),
                    u32::try_from(report.viewport_changes.len()).unwrap_or(u32::MAX),
                ));
                return Ok(report);
            };

            self.pass_recomputed = 0;
            self.pass_visited = 0;
            tracer.pass_begin(&PassBeginEvent {
                iteration,
                pass,
                root: r,
            });
            let result = match pass {
                PassKind::Measure => self.measure_at(r, available, tracer).map(|_| ()),
                PassKind::Arrange => self.arrange_at(r, viewport, tracer),
                PassKind::Viewport => {
                    let changes = self.viewport_walk_at(r, viewport);
                    report.viewport_changes.extend(changes);
                    Ok(())
                }
                PassKind::SizeChanged => {
                    self.drain_size_changed(&mut report.size_changed);
                    Ok(())
                }
            };
            let end = PassEndEvent {
                iteration,
                pass,
                root: r,
                recomputed: self.pass_recomputed,
                visited: self.pass_visited,
            };
            tracer.pass_end(&end);
            summary.record_pass(&end);
            result?;
        }

        tracer.layout_cycle(&LayoutCycleEvent {
            root: r,
            iterations: limit,
        });
        Err(LayoutError::LayoutCycle { iterations: limit })
    }

    /// Picks the first pass `root` still needs, or `None` if it is clean.
    fn next_pass(&self, root: u32, available: Size) -> Option<PassKind> {
        if self.is_collapsed_at(root) {
            return None;
        }
        let flags = self.layout_flags[root as usize];
        if flags.requires_measure() || self.previous_available[root as usize] != available {
            Some(PassKind::Measure)
        } else if flags.requires_arrange()
            || self.final_rect[root as usize] != Rect::from_origin_size(Point::ORIGIN, available)
        {
            Some(PassKind::Arrange)
        } else if flags.requires_viewport_walk() {
            Some(PassKind::Viewport)
        } else if !self.size_changed_queue.is_empty() {
            Some(PassKind::SizeChanged)
        } else {
            None
        }
    }

    /// Delivers queued size changes in reverse enqueue order. Children finish
    /// arranging before their parent, so parents come out first.
    fn drain_size_changed(&mut self, out: &mut Vec<SizeChangedEvent>) {
        let queue = core::mem::take(&mut self.size_changed_queue);
        for (idx, previous) in queue.into_iter().rev() {
            self.layout_flags[idx as usize].remove(LayoutFlags::SIZE_CHANGED);
            out.push(SizeChangedEvent {
                element: self.id_at(idx),
                previous,
                new: self.render_size[idx as usize],
            });
        }
    }

    // -- Measure --

    pub(crate) fn measure_at(
        &mut self,
        idx: u32,
        available: Size,
        tracer: &mut Tracer<'_>,
    ) -> Result<Size, LayoutError> {
        let i = idx as usize;
        if self.is_collapsed_at(idx) {
            return Ok(Size::ZERO);
        }
        let flags = self.layout_flags[i];
        if flags.contains(LayoutFlags::ON_MEASURE_STACK) {
            return Err(LayoutError::MeasureCycle(self.id_at(idx)));
        }

        if flags.contains(LayoutFlags::MEASURE_DIRTY)
            || !flags.contains(LayoutFlags::HAS_BEEN_MEASURED)
            || self.previous_available[i] != available
        {
            self.measure_self(idx, available, tracer)?;
        } else if flags.contains(LayoutFlags::ON_MEASURE_DIRTY_PATH) {
            self.measure_dirty_children(idx, tracer)?;
            // A child's new size may have dirtied us.
            if self.layout_flags[i].contains(LayoutFlags::MEASURE_DIRTY) {
                self.measure_self(idx, available, tracer)?;
            }
        }
        Ok(self.desired_size[i])
    }

    fn enter_measure(&mut self) -> Result<(), LayoutError> {
        if self.measures_on_stack >= self.config.max_layout_depth {
            return Err(LayoutError::DepthExceeded {
                limit: self.config.max_layout_depth,
            });
        }
        self.measures_on_stack += 1;
        Ok(())
    }

    fn measure_self(
        &mut self,
        idx: u32,
        available: Size,
        tracer: &mut Tracer<'_>,
    ) -> Result<(), LayoutError> {
        let i = idx as usize;
        self.enter_measure()?;
        self.layout_flags[i].remove(
            LayoutFlags::MEASURE_DIRTY
                | LayoutFlags::MEASURE_DIRTY_PENDING
                | LayoutFlags::ON_MEASURE_DIRTY_PATH,
        );
        self.layout_flags[i].insert(LayoutFlags::ON_MEASURE_STACK | LayoutFlags::IS_MEASURING_SELF);
        self.previous_available[i] = available;

        let result = self
            .run_measure_policy(idx, available, tracer)
            .and_then(|size| self.check_size(idx, size));

        self.layout_flags[i].remove(LayoutFlags::ON_MEASURE_STACK | LayoutFlags::IS_MEASURING_SELF);
        self.measures_on_stack -= 1;

        let desired = match result {
            Ok(size) => size,
            Err(e) => {
                self.invalidate_measure_at(idx);
                return Err(e);
            }
        };

        self.stats[i].measure_count += 1;
        self.stats[i].measure_visits += 1;
        self.pass_recomputed += 1;
        let previous = self.desired_size[i];
        self.desired_size[i] = desired;
        self.layout_flags[i].insert(LayoutFlags::HAS_BEEN_MEASURED);
        #[cfg(feature = "trace-rich")]
        tracer.element_layout(&ElementLayoutEvent {
            element: idx,
            pass: PassKind::Measure,
            recomputed: true,
            width: desired.width,
            height: desired.height,
        });

        self.invalidate_arrange_at(idx);
        if previous != desired {
            let p = self.parent[i];
            if p != INVALID
                && !self.layout_flags[p as usize].contains(LayoutFlags::IS_MEASURING_SELF)
            {
                self.invalidate_measure_at(p);
            }
        }
        Ok(())
    }

    fn measure_dirty_children(&mut self, idx: u32, tracer: &mut Tracer<'_>) -> Result<(), LayoutError> {
        let i = idx as usize;
        self.enter_measure()?;
        self.layout_flags[i].remove(LayoutFlags::ON_MEASURE_DIRTY_PATH);
        self.layout_flags[i].insert(LayoutFlags::ON_MEASURE_STACK);
        self.stats[i].measure_visits += 1;
        self.pass_visited += 1;
        #[cfg(feature = "trace-rich")]
        tracer.element_layout(&ElementLayoutEvent {
            element: idx,
            pass: PassKind::Measure,
            recomputed: false,
            width: self.desired_size[i].width,
            height: self.desired_size[i].height,
        });

        let mut result = Ok(());
        for c in self.child_slots(idx) {
            let flags = self.layout_flags[c as usize];
            if self.is_collapsed_at(c)
                || !flags.intersects(LayoutFlags::MEASURE_DIRTY | LayoutFlags::ON_MEASURE_DIRTY_PATH)
            {
                continue;
            }
            let available = self.previous_available[c as usize];
            if let Err(e) = self.measure_at(c, available, tracer) {
                result = Err(e);
                break;
            }
        }

        self.layout_flags[i].remove(LayoutFlags::ON_MEASURE_STACK);
        self.measures_on_stack -= 1;
        if result.is_err() {
            // The children after the failure were never visited.
            self.restore_path(idx, LayoutFlags::ON_MEASURE_DIRTY_PATH);
        }
        result
    }

    fn run_measure_policy(
        &mut self,
        idx: u32,
        available: Size,
        tracer: &mut Tracer<'_>,
    ) -> Result<Size, LayoutError> {
        let i = idx as usize;
        let Some(mut policy) = self.policy[i].take() else {
            return Err(LayoutError::MeasureCycle(self.id_at(idx)));
        };
        let result = {
            let mut cx = LayoutCx::new(self, tracer, idx);
            policy.measure(&mut cx, available)
        };
        // A policy swapped in during the call wins.
        if self.policy[i].is_none() {
            self.policy[i] = Some(policy);
        }
        result
    }

    /// Rejects sizes a policy must never produce.
    fn check_size(&self, idx: u32, size: Size) -> Result<Size, LayoutError> {
        if !size.is_finite() {
            return Err(LayoutError::Policy {
                element: self.id_at(idx),
                reason: "size is not finite",
            });
        }
        Ok(Size::new(size.width.max(0.0), size.height.max(0.0)))
    }

    // -- Arrange --

    pub(crate) fn arrange_at(
        &mut self,
        idx: u32,
        rect: Rect,
        tracer: &mut Tracer<'_>,
    ) -> Result<(), LayoutError> {
        let i = idx as usize;
        if self.is_collapsed_at(idx) {
            return Ok(());
        }
        let flags = self.layout_flags[i];
        if flags.contains(LayoutFlags::ON_ARRANGE_STACK) {
            return Err(LayoutError::ArrangeCycle(self.id_at(idx)));
        }

        if flags.intersects(LayoutFlags::MEASURE_DIRTY | LayoutFlags::ON_MEASURE_DIRTY_PATH)
            || !flags.contains(LayoutFlags::HAS_BEEN_MEASURED)
        {
            let available = if flags.contains(LayoutFlags::HAS_BEEN_MEASURED) {
                self.previous_available[i]
            } else {
                rect.size()
            };
            self.measure_at(idx, available, tracer)?;
        }

        let flags = self.layout_flags[i];
        if flags.contains(LayoutFlags::ARRANGE_DIRTY) || self.final_rect[i] != rect {
            self.arrange_self(idx, rect, tracer)?;
        } else if flags.contains(LayoutFlags::ON_ARRANGE_DIRTY_PATH) {
            self.arrange_dirty_children(idx, tracer)?;
            if self.layout_flags[i].contains(LayoutFlags::ARRANGE_DIRTY) {
                self.arrange_self(idx, rect, tracer)?;
            }
        }
        Ok(())
    }

    fn enter_arrange(&mut self) -> Result<(), LayoutError> {
        if self.arranges_on_stack >= self.config.max_layout_depth {
            return Err(LayoutError::DepthExceeded {
                limit: self.config.max_layout_depth,
            });
        }
        self.arranges_on_stack += 1;
        Ok(())
    }

    fn arrange_self(&mut self, idx: u32, rect: Rect, tracer: &mut Tracer<'_>) -> Result<(), LayoutError> {
        let i = idx as usize;
        self.enter_arrange()?;
        let old_rect = self.final_rect[i];
        let old_render = self.render_size[i];
        self.layout_flags[i].remove(
            LayoutFlags::ARRANGE_DIRTY
                | LayoutFlags::ARRANGE_DIRTY_PENDING
                | LayoutFlags::ON_ARRANGE_DIRTY_PATH,
        );
        self.layout_flags[i].insert(LayoutFlags::ON_ARRANGE_STACK);
        self.final_rect[i] = rect;

        let result = self
            .run_arrange_policy(idx, rect.size(), tracer)
            .and_then(|size| self.check_size(idx, size));

        self.layout_flags[i].remove(LayoutFlags::ON_ARRANGE_STACK);
        self.arranges_on_stack -= 1;

        let render = match result {
            Ok(size) => size,
            Err(e) => {
                self.final_rect[i] = old_rect;
                self.layout_flags[i].remove(LayoutFlags::MEASURE_DURING_ARRANGE);
                self.invalidate_arrange_at(idx);
                return Err(e);
            }
        };

        self.stats[i].arrange_count += 1;
        self.stats[i].arrange_visits += 1;
        self.pass_recomputed += 1;
        self.render_size[i] = render;
        #[cfg(feature = "trace-rich")]
        tracer.element_layout(&ElementLayoutEvent {
            element: idx,
            pass: PassKind::Arrange,
            recomputed: true,
            width: render.width,
            height: render.height,
        });

        if render != old_render {
            self.invalidate_bounds_at(idx, BoundsTier::ContentInner);
            let flags = &mut self.layout_flags[i];
            if flags.contains(LayoutFlags::WANTS_SIZE_CHANGED) && !flags.contains(LayoutFlags::SIZE_CHANGED) {
                flags.insert(LayoutFlags::SIZE_CHANGED);
                self.size_changed_queue.push((idx, old_render));
            }
        }
        if rect.origin() != old_rect.origin() {
            self.invalidate_bounds_at(idx, BoundsTier::Outer);
        }
        if rect != old_rect || render != old_render {
            self.viewport_inputs_changed(idx);
        }
        if self.layout_flags[i].contains(LayoutFlags::MEASURE_DURING_ARRANGE) {
            self.layout_flags[i].remove(LayoutFlags::MEASURE_DURING_ARRANGE);
            self.invalidate_arrange_at(idx);
        }
        Ok(())
    }

    fn arrange_dirty_children(&mut self, idx: u32, tracer: &mut Tracer<'_>) -> Result<(), LayoutError> {
        let i = idx as usize;
        self.enter_arrange()?;
        self.layout_flags[i].remove(LayoutFlags::ON_ARRANGE_DIRTY_PATH);
        self.layout_flags[i].insert(LayoutFlags::ON_ARRANGE_STACK);
        self.stats[i].arrange_visits += 1;
        self.pass_visited += 1;
        #[cfg(feature = "trace-rich")]
        tracer.element_layout(&ElementLayoutEvent {
            element: idx,
            pass: PassKind::Arrange,
            recomputed: false,
            width: self.render_size[i].width,
            height: self.render_size[i].height,
        });

        let mut result = Ok(());
        for c in self.child_slots(idx) {
            let flags = self.layout_flags[c as usize];
            if self.is_collapsed_at(c) || !flags.requires_arrange() {
                continue;
            }
            let rect = self.final_rect[c as usize];
            if let Err(e) = self.arrange_at(c, rect, tracer) {
                result = Err(e);
                break;
            }
        }

        self.layout_flags[i].remove(LayoutFlags::ON_ARRANGE_STACK);
        self.arranges_on_stack -= 1;
        if result.is_err() {
            self.restore_path(idx, LayoutFlags::ON_ARRANGE_DIRTY_PATH);
        }
        if self.layout_flags[i].contains(LayoutFlags::MEASURE_DURING_ARRANGE) {
            self.layout_flags[i].remove(LayoutFlags::MEASURE_DURING_ARRANGE);
            self.invalidate_arrange_at(idx);
        }
        result
    }

    /// Puts `path` back on `idx` and its ancestors after a failed walk.
    fn restore_path(&mut self, idx: u32, path: LayoutFlags) {
        self.layout_flags[idx as usize].insert(path);
        self.propagate_path(idx, path);
    }

    fn run_arrange_policy(
        &mut self,
        idx: u32,
        final_size: Size,
        tracer: &mut Tracer<'_>,
    ) -> Result<Size, LayoutError> {
        let i = idx as usize;
        let Some(mut policy) = self.policy[i].take() else {
            return Err(LayoutError::ArrangeCycle(self.id_at(idx)));
        };
        let result = {
            let mut cx = LayoutCx::new(self, tracer, idx);
            policy.arrange(&mut cx, final_size)
        };
        if self.policy[i].is_none() {
            self.policy[i] = Some(policy);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::element::Visibility;
    use crate::policy::LayoutPolicy;

    struct Fixed(Size);

    impl LayoutPolicy for Fixed {
        fn measure(&mut self, cx: &mut LayoutCx<'_, '_>, available: Size) -> Result<Size, LayoutError> {
            for child in cx.children() {
                cx.measure_child(child, available)?;
            }
            Ok(self.0)
        }
    }

    /// Measures itself again from inside its own measure.
    struct Reentrant;

    impl LayoutPolicy for Reentrant {
        fn measure(&mut self, cx: &mut LayoutCx<'_, '_>, available: Size) -> Result<Size, LayoutError> {
            let me = cx.element();
            cx.measure_child(me, available)
        }
    }

    /// Invalidates its own measure every time it measures.
    struct Restless;

    impl LayoutPolicy for Restless {
        fn measure(&mut self, cx: &mut LayoutCx<'_, '_>, _available: Size) -> Result<Size, LayoutError> {
            let me = cx.element();
            cx.invalidate_measure(me);
            Ok(Size::new(1.0, 1.0))
        }
    }

    /// Grows a child during arrange, once.
    struct GrowChildOnArrange {
        child: Option<ElementId>,
    }

    impl LayoutPolicy for GrowChildOnArrange {
        fn arrange(&mut self, cx: &mut LayoutCx<'_, '_>, final_size: Size) -> Result<Size, LayoutError> {
            if let Some(child) = self.child.take() {
                cx.invalidate_measure(child);
            }
            let rect = Rect::from_origin_size(Point::ORIGIN, final_size);
            for child in cx.children() {
                cx.arrange_child(child, rect)?;
            }
            Ok(final_size)
        }
    }

    /// Arranges itself again from inside its own arrange.
    struct ReentrantArrange;

    impl LayoutPolicy for ReentrantArrange {
        fn arrange(&mut self, cx: &mut LayoutCx<'_, '_>, final_size: Size) -> Result<Size, LayoutError> {
            let me = cx.element();
            cx.arrange_child(me, Rect::from_origin_size(Point::ORIGIN, final_size))?;
            Ok(final_size)
        }
    }

    /// Reports a size no element can have.
    struct NonFinite {
        in_measure: bool,
    }

    impl LayoutPolicy for NonFinite {
        fn measure(&mut self, _cx: &mut LayoutCx<'_, '_>, _available: Size) -> Result<Size, LayoutError> {
            if self.in_measure {
                Ok(Size::new(f64::INFINITY, 1.0))
            } else {
                Ok(Size::ZERO)
            }
        }

        fn arrange(&mut self, _cx: &mut LayoutCx<'_, '_>, _final_size: Size) -> Result<Size, LayoutError> {
            Ok(Size::new(f64::NAN, 0.0))
        }
    }

    /// A bare chain of `len` elements below a root, laid out once.
    fn laid_out_chain(len: usize) -> (ElementTree, Vec<ElementId>) {
        let mut tree = ElementTree::new();
        let mut chain = vec![tree.create_element()];
        for _ in 0..len {
            let next = tree.create_element();
            tree.add_child(*chain.last().unwrap(), next).unwrap();
            chain.push(next);
        }
        tree.update_layout(chain[0], Size::new(10.0, 10.0)).unwrap();
        (tree, chain)
    }

    fn nested_panels(depth: usize, siblings_per_level: usize) -> (ElementTree, Vec<ElementId>) {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let mut path = vec![root];
        for _ in 0..depth {
            let parent = *path.last().unwrap();
            let next = tree.create_element_with(Fixed(Size::new(10.0, 10.0)));
            tree.add_child(parent, next).unwrap();
            for _ in 0..siblings_per_level {
                let sibling = tree.create_element_with(Fixed(Size::new(5.0, 5.0)));
                tree.add_child(parent, sibling).unwrap();
            }
            path.push(next);
        }
        (tree, path)
    }

    #[test]
    fn first_layout_measures_and_arranges_everything() {
        let (mut tree, path) = nested_panels(3, 1);
        let report = tree.update_layout(path[0], Size::new(100.0, 100.0)).unwrap();
        assert!(report.iterations >= 3);
        for &id in &path {
            let stats = tree.layout_stats(id);
            assert_eq!(stats.measure_count, 1);
            assert_eq!(stats.arrange_count, 1);
            assert!(!tree.layout_flags(id).requires_layout());
        }
    }

    #[test]
    fn deep_leaf_change_visits_only_the_path() {
        let (mut tree, path) = nested_panels(50, 2);
        let root = path[0];
        tree.update_layout(root, Size::new(500.0, 500.0)).unwrap();
        let all: Vec<u32> = tree.subtree_slots(root.idx);
        let before: Vec<LayoutStats> = all.iter().map(|&i| tree.stats[i as usize]).collect();

        // Same desired size, so only the leaf recomputes.
        let leaf = *path.last().unwrap();
        tree.invalidate_measure(leaf);
        tree.update_layout(root, Size::new(500.0, 500.0)).unwrap();

        for (n, &i) in all.iter().enumerate() {
            let delta_visits = tree.stats[i as usize].measure_visits - before[n].measure_visits;
            let delta_count = tree.stats[i as usize].measure_count - before[n].measure_count;
            let on_path = path.iter().any(|id| id.idx == i);
            if i == leaf.idx {
                assert_eq!((delta_count, delta_visits), (1, 1));
            } else if on_path {
                assert_eq!((delta_count, delta_visits), (0, 1), "path element {i}");
            } else {
                assert_eq!((delta_count, delta_visits), (0, 0), "sibling {i}");
            }
        }
    }

    #[test]
    fn second_update_is_a_no_op() {
        let (mut tree, path) = nested_panels(4, 1);
        tree.update_layout(path[0], Size::new(100.0, 100.0)).unwrap();
        let before: Vec<_> = path.iter().map(|&id| tree.layout_stats(id)).collect();
        let report = tree.update_layout(path[0], Size::new(100.0, 100.0)).unwrap();
        assert_eq!(report.iterations, 1);
        let after: Vec<_> = path.iter().map(|&id| tree.layout_stats(id)).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn desired_size_change_bubbles_to_parent() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let leaf = tree.create_element_with(Fixed(Size::new(10.0, 10.0)));
        tree.add_child(root, leaf).unwrap();
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(tree.desired_size(root), Size::new(10.0, 10.0));

        tree.set_policy(leaf, Fixed(Size::new(30.0, 20.0)));
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(tree.desired_size(root), Size::new(30.0, 20.0));
        assert_eq!(tree.layout_stats(root).measure_count, 2);
    }

    #[test]
    fn collapse_and_restore_keeps_pending_work() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let panel = tree.create_element();
        let leaf = tree.create_element_with(Fixed(Size::new(10.0, 10.0)));
        tree.add_child(root, panel).unwrap();
        tree.add_child(panel, leaf).unwrap();
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();

        tree.set_visibility(panel, Visibility::Collapsed);
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(tree.desired_size(root), Size::ZERO);

        tree.set_policy(leaf, Fixed(Size::new(40.0, 40.0)));
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        // Suspended: the leaf has not been measured again.
        assert_eq!(tree.layout_stats(leaf).measure_count, 1);

        tree.set_visibility(panel, Visibility::Visible);
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(tree.layout_stats(leaf).measure_count, 2);
        assert_eq!(tree.desired_size(root), Size::new(40.0, 40.0));
        assert!(!tree.layout_flags(leaf).has_pending());
    }

    #[test]
    fn self_measure_is_a_measure_cycle() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let bad = tree.create_element_with(Reentrant);
        tree.add_child(root, bad).unwrap();

        let err = tree.update_layout(root, Size::new(10.0, 10.0)).unwrap_err();
        assert_eq!(err, LayoutError::MeasureCycle(bad));
        // Flags are consistent afterwards.
        let flags = tree.layout_flags(bad);
        assert!(flags.contains(LayoutFlags::MEASURE_DIRTY));
        assert!(!flags.intersects(LayoutFlags::ON_MEASURE_STACK | LayoutFlags::IS_MEASURING_SELF));
        assert!(!tree.layout_flags(root).contains(LayoutFlags::ON_MEASURE_STACK));
        assert_eq!(tree.measures_on_stack, 0);
    }

    #[test]
    fn self_invalidating_policy_is_a_layout_cycle() {
        let mut tree = ElementTree::with_config(LayoutConfig::new().with_max_iterations(8));
        let root = tree.create_element_with(Restless);
        let err = tree.update_layout(root, Size::new(10.0, 10.0)).unwrap_err();
        assert_eq!(err, LayoutError::LayoutCycle { iterations: 8 });
    }

    #[test]
    fn nesting_beyond_depth_limit_fails() {
        let mut tree = ElementTree::with_config(LayoutConfig::new().with_max_depth(4));
        let root = tree.create_element();
        let mut parent = root;
        for _ in 0..6 {
            let next = tree.create_element();
            tree.add_child(parent, next).unwrap();
            parent = next;
        }
        let err = tree.update_layout(root, Size::new(10.0, 10.0)).unwrap_err();
        assert_eq!(err, LayoutError::DepthExceeded { limit: 4 });
        assert_eq!(tree.measures_on_stack, 0);
    }

    #[test]
    fn depth_failure_on_a_path_walk_keeps_the_path() {
        let (mut tree, chain) = laid_out_chain(6);
        let (root, leaf) = (chain[0], chain[6]);

        tree.set_config(LayoutConfig::new().with_max_depth(3));
        tree.invalidate_measure(leaf);
        let err = tree.update_layout(root, Size::new(10.0, 10.0)).unwrap_err();
        assert_eq!(err, LayoutError::DepthExceeded { limit: 3 });
        for &id in &chain[..6] {
            assert!(
                tree.layout_flags(id).contains(LayoutFlags::ON_MEASURE_DIRTY_PATH),
                "{id:?} lost its measure path"
            );
        }
        assert!(tree.layout_flags(leaf).contains(LayoutFlags::MEASURE_DIRTY));
        assert_eq!(tree.measures_on_stack, 0);

        tree.set_config(LayoutConfig::new());
        tree.update_layout(root, Size::new(10.0, 10.0)).unwrap();
        assert_eq!(tree.layout_stats(leaf).measure_count, 2);
        assert!(!tree.layout_flags(root).requires_layout());
    }

    #[test]
    fn depth_failure_on_an_arrange_walk_keeps_the_path() {
        let (mut tree, chain) = laid_out_chain(6);
        let (root, leaf) = (chain[0], chain[6]);

        tree.set_config(LayoutConfig::new().with_max_depth(3));
        tree.invalidate_arrange(leaf);
        let err = tree.update_layout(root, Size::new(10.0, 10.0)).unwrap_err();
        assert_eq!(err, LayoutError::DepthExceeded { limit: 3 });
        for &id in &chain[..6] {
            assert!(
                tree.layout_flags(id).contains(LayoutFlags::ON_ARRANGE_DIRTY_PATH),
                "{id:?} lost its arrange path"
            );
        }
        assert_eq!(tree.arranges_on_stack, 0);

        tree.set_config(LayoutConfig::new());
        tree.update_layout(root, Size::new(10.0, 10.0)).unwrap();
        assert_eq!(tree.layout_stats(leaf).arrange_count, 2);
    }

    #[test]
    fn self_arrange_is_an_arrange_cycle() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let bad = tree.create_element_with(ReentrantArrange);
        tree.add_child(root, bad).unwrap();

        let err = tree.update_layout(root, Size::new(10.0, 10.0)).unwrap_err();
        assert_eq!(err, LayoutError::ArrangeCycle(bad));
        let flags = tree.layout_flags(bad);
        assert!(flags.contains(LayoutFlags::ARRANGE_DIRTY));
        assert!(!flags.contains(LayoutFlags::ON_ARRANGE_STACK));
        assert!(tree.layout_flags(root).contains(LayoutFlags::ARRANGE_DIRTY));
        assert_eq!(tree.final_rect(bad), Rect::ZERO);
        assert_eq!(tree.arranges_on_stack, 0);
    }

    #[test]
    fn non_finite_measure_is_a_policy_error() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let bad = tree.create_element_with(NonFinite { in_measure: true });
        tree.add_child(root, bad).unwrap();

        let err = tree.update_layout(root, Size::new(10.0, 10.0)).unwrap_err();
        assert_eq!(
            err,
            LayoutError::Policy {
                element: bad,
                reason: "size is not finite",
            }
        );
        let flags = tree.layout_flags(bad);
        assert!(flags.contains(LayoutFlags::MEASURE_DIRTY));
        assert!(!flags.contains(LayoutFlags::HAS_BEEN_MEASURED));
        assert!(tree.layout_flags(root).requires_measure());
        assert_eq!(tree.desired_size(bad), Size::ZERO);
        assert_eq!(tree.measures_on_stack, 0);
    }

    #[test]
    fn failed_arrange_restores_the_previous_rect() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let child = tree.create_element();
        tree.add_child(root, child).unwrap();
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(tree.final_rect(child), Rect::new(0.0, 0.0, 100.0, 100.0));

        tree.set_policy(child, NonFinite { in_measure: false });
        let err = tree.update_layout(root, Size::new(50.0, 50.0)).unwrap_err();
        assert!(matches!(err, LayoutError::Policy { element, .. } if element == child));
        assert_eq!(tree.final_rect(child), Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(tree.final_rect(root), Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(tree.layout_flags(child).contains(LayoutFlags::ARRANGE_DIRTY));
        assert_eq!(tree.layout_stats(child).arrange_count, 1);
    }

    #[test]
    fn measure_during_arrange_rearranges() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let leaf = tree.create_element_with(Fixed(Size::new(10.0, 10.0)));
        tree.add_child(root, leaf).unwrap();
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();

        tree.set_policy(root, GrowChildOnArrange { child: Some(leaf) });
        tree.invalidate_arrange(root);
        let report = tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert!(report.iterations > 2);
        // Leaf was re-measured inside the arrange, root re-arranged afterwards.
        assert_eq!(tree.layout_stats(leaf).measure_count, 2);
        assert!(tree.layout_stats(root).arrange_count >= 3);
        assert!(!tree.layout_flags(root).intersects(
            LayoutFlags::MEASURE_DURING_ARRANGE | LayoutFlags::ARRANGE_DIRTY
        ));
    }

    #[test]
    fn size_changed_is_reported_outermost_first() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let panel = tree.create_element();
        tree.add_child(root, panel).unwrap();
        tree.set_wants_size_changed(root, true);
        tree.set_wants_size_changed(panel, true);

        let report = tree.update_layout(root, Size::new(40.0, 30.0)).unwrap();
        let changed: Vec<_> = report.size_changed.iter().map(|e| e.element).collect();
        assert_eq!(changed, vec![root, panel]);
        assert_eq!(report.size_changed[1].previous, Size::ZERO);
        assert_eq!(report.size_changed[1].new, Size::new(40.0, 30.0));

        let report = tree.update_layout(root, Size::new(40.0, 30.0)).unwrap();
        assert!(report.size_changed.is_empty());
    }

    #[test]
    fn new_available_size_remeasures_root() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        tree.update_layout(root, Size::new(40.0, 30.0)).unwrap();
        tree.update_layout(root, Size::new(80.0, 60.0)).unwrap();
        assert_eq!(tree.layout_stats(root).measure_count, 2);
        assert_eq!(tree.final_rect(root), Rect::new(0.0, 0.0, 80.0, 60.0));
    }

    #[test]
    fn explicit_arrange_measures_first() {
        let mut tree = ElementTree::new();
        let el = tree.create_element_with(Fixed(Size::new(7.0, 9.0)));
        tree.set_layout_root(el, true);
        tree.arrange(el, Rect::new(5.0, 5.0, 25.0, 25.0)).unwrap();
        assert_eq!(tree.desired_size(el), Size::new(7.0, 9.0));
        assert_eq!(tree.render_size(el), Size::new(20.0, 20.0));
        assert_eq!(tree.layout_stats(el).measure_count, 1);
        assert_eq!(tree.measure(el, Size::new(20.0, 20.0)).unwrap(), Size::new(7.0, 9.0));
        assert_eq!(tree.layout_stats(el).measure_count, 1);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn traced_update_reports_passes() {
        use crate::trace::{LayoutSummary, TraceSink};

        #[derive(Default)]
        struct Passes {
            kinds: Vec<PassKind>,
            summary: Option<LayoutSummary>,
        }
        impl TraceSink for Passes {
            fn on_pass_begin(&mut self, e: &PassBeginEvent) {
                self.kinds.push(e.pass);
            }
            fn on_layout_summary(&mut self, s: &LayoutSummary) {
                self.summary = Some(*s);
            }
        }

        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let child = tree.create_element();
        tree.add_child(root, child).unwrap();
        let mut sink = Passes::default();
        let mut tracer = Tracer::new(&mut sink);
        tree.update_layout_traced(root, Size::new(10.0, 10.0), &mut tracer).unwrap();
        drop(tracer);

        assert_eq!(sink.kinds, vec![PassKind::Measure, PassKind::Arrange]);
        let summary = sink.summary.unwrap();
        assert_eq!(summary.measure_recomputes, 2);
        assert_eq!(summary.arrange_recomputes, 2);
        assert_eq!(summary.iterations, 3);
    }
}
