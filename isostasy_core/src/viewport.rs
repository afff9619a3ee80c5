// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Effective viewport tracking.
//!
//! An element that asks for its effective viewport learns which part of it is
//! visible through the clips of its ancestors and the root viewport. Interest
//! is tracked with two flags: [`WANTS_VIEWPORT`](LayoutFlags::WANTS_VIEWPORT)
//! on the element itself and
//! [`CONTRIBUTES_TO_VIEWPORT`](LayoutFlags::CONTRIBUTES_TO_VIEWPORT) on every
//! ancestor with an interested descendant. Only interested elements are ever
//! visited.
//!
//! When an interested element's rect, transform, or clip changes, it is marked
//! on the `understory_dirty` [`VIEWPORT`](crate::dirty::VIEWPORT) channel with
//! eager propagation, so its whole subtree becomes affected, and a path flag
//! leads the walk from the root down to it.

use alloc::vec::Vec;

use kurbo::Rect;
use understory_dirty::EagerPolicy;

use crate::dirty;
use crate::element::{ElementId, ElementTree, INVALID};
use crate::flags::LayoutFlags;
use crate::transform::Transform3d;

/// One axis of a clip seen along the walk, in root space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportSpan {
    /// Start of the span.
    pub offset: f64,
    /// Length of the span.
    pub length: f64,
}

impl ViewportSpan {
    /// End of the span.
    #[must_use]
    pub fn end(&self) -> f64 {
        self.offset + self.length
    }

    /// Intersection of all spans, `None` if they do not overlap or there
    /// are none.
    #[must_use]
    pub fn reduce(spans: &[Self]) -> Option<Self> {
        let (first, rest) = spans.split_first()?;
        let (mut start, mut end) = (first.offset, first.end());
        for span in rest {
            start = start.max(span.offset);
            end = end.min(span.end());
        }
        (end >= start).then_some(Self {
            offset: start,
            length: end - start,
        })
    }
}

/// An effective viewport delivered by the walk.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectiveViewportChange {
    /// The interested element.
    pub element: ElementId,
    /// Horizontal spans of the root viewport and each clipping ancestor,
    /// outermost first, in root space.
    pub horizontal: Vec<ViewportSpan>,
    /// Vertical spans, matching [`horizontal`](Self::horizontal).
    pub vertical: Vec<ViewportSpan>,
    /// The intersection of all spans mapped into the element's local space,
    /// `None` if nothing is visible.
    pub effective_viewport: Option<Rect>,
}

/// Stacks maintained during the walk.
struct ViewportWalk {
    affected: Vec<u32>,
    horizontal: Vec<ViewportSpan>,
    vertical: Vec<ViewportSpan>,
    out: Vec<EffectiveViewportChange>,
}

impl ViewportWalk {
    fn push(&mut self, rect: Rect) {
        self.horizontal.push(ViewportSpan {
            offset: rect.x0,
            length: rect.width(),
        });
        self.vertical.push(ViewportSpan {
            offset: rect.y0,
            length: rect.height(),
        });
    }

    fn pop(&mut self) {
        self.horizontal.pop();
        self.vertical.pop();
    }
}

impl ElementTree {
    /// Registers or drops interest in the element's effective viewport.
    pub fn set_wants_viewport(&mut self, id: ElementId, wants: bool) {
        self.validate(id);
        let idx = id.idx;
        let flags = self.layout_flags[idx as usize];
        if flags.contains(LayoutFlags::WANTS_VIEWPORT) == wants {
            return;
        }
        self.layout_flags[idx as usize].set(LayoutFlags::WANTS_VIEWPORT, wants);
        let p = self.parent[idx as usize];
        if p != INVALID {
            self.recompute_viewport_contribution(p);
        }
        if wants {
            self.invalidate_viewport_at(idx);
        }
    }

    /// Whether the element asked for its effective viewport.
    #[must_use]
    pub fn wants_viewport(&self, id: ElementId) -> bool {
        self.validate(id);
        self.layout_flags[id.idx as usize].contains(LayoutFlags::WANTS_VIEWPORT)
    }

    /// Whether some descendant of the element asked for its effective
    /// viewport.
    #[must_use]
    pub fn contributes_to_viewport(&self, id: ElementId) -> bool {
        self.validate(id);
        self.layout_flags[id.idx as usize].contains(LayoutFlags::CONTRIBUTES_TO_VIEWPORT)
    }

    /// Marks the element's viewport inputs changed, affecting its subtree.
    pub fn invalidate_viewport(&mut self, id: ElementId) {
        self.validate(id);
        self.invalidate_viewport_at(id.idx);
    }

    /// Delivers effective viewports under `root`.
    ///
    /// `root_viewport` is given in `root`'s parent space. Only interested
    /// elements that are affected by a viewport invalidation are reported.
    /// Pending viewport marks of the whole tree are consumed.
    pub fn effective_viewport_walk(
        &mut self,
        root: ElementId,
        root_viewport: Rect,
    ) -> Vec<EffectiveViewportChange> {
        self.validate(root);
        self.viewport_walk_at(root.idx, root_viewport)
    }

    pub(crate) fn viewport_walk_at(&mut self, root: u32, root_viewport: Rect) -> Vec<EffectiveViewportChange> {
        let mut affected: Vec<u32> = self
            .dirty
            .drain(dirty::VIEWPORT)
            .affected()
            .deterministic()
            .run()
            .collect();
        affected.sort_unstable();
        let mut walk = ViewportWalk {
            affected,
            horizontal: Vec::new(),
            vertical: Vec::new(),
            out: Vec::new(),
        };
        walk.push(root_viewport);
        self.viewport_walk(root, Transform3d::IDENTITY, &mut walk);
        walk.out
    }

    fn viewport_walk(&mut self, idx: u32, parent_global: Transform3d, walk: &mut ViewportWalk) {
        let i = idx as usize;
        if self.is_collapsed_at(idx) {
            return;
        }
        let flags = self.layout_flags[i];
        let affected = walk.affected.binary_search(&idx).is_ok();
        if !flags.is_viewport_interested() {
            self.layout_flags[i].remove(LayoutFlags::VIEWPORT_DIRTY | LayoutFlags::ON_VIEWPORT_DIRTY_PATH);
            return;
        }
        if !affected && !flags.requires_viewport_walk() {
            return;
        }
        self.layout_flags[i].remove(LayoutFlags::VIEWPORT_DIRTY | LayoutFlags::ON_VIEWPORT_DIRTY_PATH);
        self.pass_visited += 1;

        let global = parent_global * self.local_to_parent(idx, false).to_transform3d();
        if affected && flags.contains(LayoutFlags::WANTS_VIEWPORT) {
            let horizontal = ViewportSpan::reduce(&walk.horizontal);
            let vertical = ViewportSpan::reduce(&walk.vertical);
            let effective_viewport = match (horizontal, vertical) {
                (Some(h), Some(v)) => global.unproject_rect_bbox(Rect::new(h.offset, v.offset, h.end(), v.end())),
                _ => None,
            };
            walk.out.push(EffectiveViewportChange {
                element: self.id_at(idx),
                horizontal: walk.horizontal.clone(),
                vertical: walk.vertical.clone(),
                effective_viewport,
            });
        }

        let clip = self.clip[i].and_then(|clip| global.project_rect_bbox(clip.bounds()));
        if let Some(clip) = clip {
            walk.push(clip);
        }
        for c in self.child_slots(idx) {
            self.viewport_walk(c, global, walk);
        }
        if clip.is_some() {
            walk.pop();
        }
    }

    pub(crate) fn invalidate_viewport_at(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::VIEWPORT, &EagerPolicy);
        if self.layout_flags[idx as usize].contains(LayoutFlags::VIEWPORT_DIRTY) {
            return;
        }
        self.layout_flags[idx as usize].insert(LayoutFlags::VIEWPORT_DIRTY);
        self.propagate_path(idx, LayoutFlags::ON_VIEWPORT_DIRTY_PATH);
    }

    /// Called when the element's rect, transform, clip, or visibility changed.
    pub(crate) fn viewport_inputs_changed(&mut self, idx: u32) {
        if self.layout_flags[idx as usize].is_viewport_interested() {
            self.invalidate_viewport_at(idx);
        }
    }

    /// Recomputes `CONTRIBUTES_TO_VIEWPORT` from `idx` upward, stopping once
    /// a value no longer changes.
    pub(crate) fn recompute_viewport_contribution(&mut self, mut idx: u32) {
        while idx != INVALID {
            let mut any = false;
            let mut c = self.first_child[idx as usize];
            while c != INVALID {
                if self.layout_flags[c as usize].is_viewport_interested() {
                    any = true;
                    break;
                }
                c = self.next_sibling[c as usize];
            }
            let flags = &mut self.layout_flags[idx as usize];
            if flags.contains(LayoutFlags::CONTRIBUTES_TO_VIEWPORT) == any {
                break;
            }
            flags.set(LayoutFlags::CONTRIBUTES_TO_VIEWPORT, any);
            idx = self.parent[idx as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use kurbo::{Point, Size};

    use super::*;
    use crate::element::ClipShape;
    use crate::error::LayoutError;
    use crate::policy::{LayoutCx, LayoutPolicy};

    /// Places each child at a fixed rect.
    struct Slots(Vec<Rect>);

    impl LayoutPolicy for Slots {
        fn arrange(&mut self, cx: &mut LayoutCx<'_, '_>, final_size: Size) -> Result<Size, LayoutError> {
            for (child, rect) in cx.children().into_iter().zip(self.0.iter()) {
                cx.arrange_child(child, *rect)?;
            }
            Ok(final_size)
        }
    }

    /// root (100x100) -> scroller at (10,10) clipped to 50x50 -> item at (20,30).
    fn scroller() -> (ElementTree, ElementId, ElementId, ElementId) {
        let mut tree = ElementTree::new();
        let root = tree.create_element_with(Slots(vec![Rect::new(10.0, 10.0, 60.0, 60.0)]));
        let scroller = tree.create_element_with(Slots(vec![Rect::new(20.0, 30.0, 120.0, 130.0)]));
        let item = tree.create_element();
        tree.add_child(root, scroller).unwrap();
        tree.add_child(scroller, item).unwrap();
        tree.set_clip(scroller, Some(ClipShape::Rect(Rect::new(0.0, 0.0, 50.0, 50.0))));
        (tree, root, scroller, item)
    }

    #[test]
    fn span_reduction() {
        let spans = [
            ViewportSpan {
                offset: 0.0,
                length: 100.0,
            },
            ViewportSpan {
                offset: 10.0,
                length: 50.0,
            },
        ];
        assert_eq!(
            ViewportSpan::reduce(&spans),
            Some(ViewportSpan {
                offset: 10.0,
                length: 50.0
            })
        );
        let disjoint = [
            ViewportSpan {
                offset: 0.0,
                length: 5.0,
            },
            ViewportSpan {
                offset: 10.0,
                length: 5.0,
            },
        ];
        assert_eq!(ViewportSpan::reduce(&disjoint), None);
        assert_eq!(ViewportSpan::reduce(&[]), None);
    }

    #[test]
    fn interest_flags_follow_topology() {
        let (mut tree, root, scroller, item) = scroller();
        tree.set_wants_viewport(item, true);
        assert!(tree.contributes_to_viewport(scroller));
        assert!(tree.contributes_to_viewport(root));

        tree.remove_from_parent(item);
        assert!(!tree.contributes_to_viewport(scroller));
        assert!(!tree.contributes_to_viewport(root));

        tree.add_child(scroller, item).unwrap();
        assert!(tree.contributes_to_viewport(root));
        tree.set_wants_viewport(item, false);
        assert!(!tree.contributes_to_viewport(root));
    }

    #[test]
    fn update_layout_reports_clipped_viewport() {
        let (mut tree, root, _scroller, item) = scroller();
        tree.set_wants_viewport(item, true);
        let report = tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();

        assert_eq!(report.viewport_changes.len(), 1);
        let change = &report.viewport_changes[0];
        assert_eq!(change.element, item);
        // Root viewport, then the scroller clip in root space.
        assert_eq!(change.horizontal.len(), 2);
        assert_eq!(change.horizontal[1], ViewportSpan {
            offset: 10.0,
            length: 50.0
        });
        // Item sits at (30, 40) in root space.
        assert_eq!(change.effective_viewport, Some(Rect::new(-20.0, -30.0, 30.0, 20.0)));

        // Nothing changed, nothing reported.
        let report = tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert!(report.viewport_changes.is_empty());
    }

    #[test]
    fn ancestor_clip_change_reaches_descendants() {
        let (mut tree, root, scroller, item) = scroller();
        tree.set_wants_viewport(item, true);
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();

        tree.set_clip(scroller, Some(ClipShape::Rect(Rect::new(0.0, 0.0, 25.0, 25.0))));
        assert!(tree.layout_flags(root).requires_viewport_walk());
        let changes = tree.effective_viewport_walk(root, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].effective_viewport, Some(Rect::new(-20.0, -30.0, 5.0, -5.0)));
        assert!(!tree.layout_flags(root).requires_viewport_walk());
    }

    #[test]
    fn unaffected_siblings_are_not_reported() {
        let (mut tree, root, scroller, item) = scroller();
        let other = tree.create_element();
        tree.add_child(root, other).unwrap();
        tree.set_policy(
            root,
            Slots(vec![
                Rect::new(10.0, 10.0, 60.0, 60.0),
                Rect::new(70.0, 0.0, 100.0, 30.0),
            ]),
        );
        tree.set_wants_viewport(item, true);
        tree.set_wants_viewport(other, true);
        let report = tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(report.viewport_changes.len(), 2);

        tree.invalidate_viewport(scroller);
        let changes = tree.effective_viewport_walk(root, Rect::new(0.0, 0.0, 100.0, 100.0));
        let elements: Vec<_> = changes.iter().map(|c| c.element).collect();
        assert_eq!(elements, vec![item]);
    }

    #[test]
    fn fully_clipped_has_no_viewport() {
        let (mut tree, root, scroller, item) = scroller();
        tree.set_wants_viewport(item, true);
        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        tree.set_clip(scroller, Some(ClipShape::Rect(Rect::new(500.0, 500.0, 510.0, 510.0))));
        let changes = tree.effective_viewport_walk(root, Rect::from_origin_size(Point::ORIGIN, Size::new(100.0, 100.0)));
        assert_eq!(changes[0].effective_viewport, None);
    }
}
