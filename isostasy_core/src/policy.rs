// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Container layout policies.
//!
//! The engine decides *when* an element is measured or arranged; a
//! [`LayoutPolicy`] decides *how*. Each element owns one policy. During a pass
//! the engine hands it a [`LayoutCx`] through which it measures and arranges
//! its children; those calls go back into the engine, so clean children are
//! answered from cache and dirty ones are recomputed.

use alloc::vec::Vec;
use core::fmt;

use kurbo::{Point, Rect, Size};

use crate::element::{ElementId, ElementTree};
use crate::error::LayoutError;
use crate::hit_test::HitTestTarget;
use crate::trace::Tracer;

/// How a container sizes and places its children.
///
/// The default methods stack every child on top of each other, filling the
/// container (see [`OverlayPolicy`]).
pub trait LayoutPolicy {
    /// Returns the size the element wants given `available` space.
    ///
    /// `available` may be infinite along either axis. The returned size must
    /// be finite and non-negative.
    fn measure(&mut self, cx: &mut LayoutCx<'_, '_>, available: Size) -> Result<Size, LayoutError> {
        let mut desired = Size::ZERO;
        for child in cx.children() {
            let size = cx.measure_child(child, available)?;
            desired.width = desired.width.max(size.width);
            desired.height = desired.height.max(size.height);
        }
        Ok(desired)
    }

    /// Places the children inside `final_size` and returns the size the
    /// element actually renders at.
    fn arrange(&mut self, cx: &mut LayoutCx<'_, '_>, final_size: Size) -> Result<Size, LayoutError> {
        let rect = Rect::from_origin_size(Point::ORIGIN, final_size);
        for child in cx.children() {
            cx.arrange_child(child, rect)?;
        }
        Ok(final_size)
    }

    /// Bounds of what the element itself draws, in its local space.
    ///
    /// `None` means the element draws nothing of its own.
    fn content_bounds(&self, render_size: Size) -> Option<Rect> {
        _ = render_size;
        None
    }

    /// Whether `target`, in local space, hits the element's own content.
    ///
    /// `content` is the result of [`content_bounds`](Self::content_bounds).
    fn hit_test_content(&self, content: Rect, target: &HitTestTarget) -> bool {
        target.intersects_rect(content)
    }
}

/// The default policy: every child fills the container, and the container
/// asks for the largest child's size.
#[derive(Clone, Copy, Debug, Default)]
pub struct OverlayPolicy;

impl LayoutPolicy for OverlayPolicy {}

/// Handle given to a [`LayoutPolicy`] during measure and arrange.
pub struct LayoutCx<'a, 't> {
    tree: &'a mut ElementTree,
    tracer: &'a mut Tracer<'t>,
    element: u32,
}

impl fmt::Debug for LayoutCx<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutCx")
            .field("element", &self.tree.id_at(self.element))
            .finish_non_exhaustive()
    }
}

impl<'a, 't> LayoutCx<'a, 't> {
    pub(crate) fn new(tree: &'a mut ElementTree, tracer: &'a mut Tracer<'t>, element: u32) -> Self {
        Self {
            tree,
            tracer,
            element,
        }
    }

    /// The element whose policy is running.
    #[must_use]
    pub fn element(&self) -> ElementId {
        self.tree.id_at(self.element)
    }

    /// The element's children in insertion order, collapsed ones excluded.
    #[must_use]
    pub fn children(&self) -> Vec<ElementId> {
        self.tree
            .child_slots(self.element)
            .into_iter()
            .filter(|&c| !self.tree.is_collapsed_at(c))
            .map(|c| self.tree.id_at(c))
            .collect()
    }

    /// Read access to the rest of the tree.
    #[must_use]
    pub fn tree(&self) -> &ElementTree {
        &*self.tree
    }

    /// Measures `child` with `available` space and returns its desired size.
    ///
    /// # Errors
    ///
    /// Propagates cycle, depth, and policy errors from the child's subtree.
    pub fn measure_child(&mut self, child: ElementId, available: Size) -> Result<Size, LayoutError> {
        self.tree.validate(child);
        self.tree.measure_at(child.idx, available, self.tracer)
    }

    /// Arranges `child` into `rect`, given in this element's local space.
    ///
    /// # Errors
    ///
    /// Propagates cycle, depth, and policy errors from the child's subtree.
    pub fn arrange_child(&mut self, child: ElementId, rect: Rect) -> Result<(), LayoutError> {
        self.tree.validate(child);
        self.tree.arrange_at(child.idx, rect, self.tracer)
    }

    /// The last desired size of `id` (zero if collapsed).
    #[must_use]
    pub fn desired_size(&self, id: ElementId) -> Size {
        self.tree.desired_size(id)
    }

    /// Invalidates the measure of `id`.
    pub fn invalidate_measure(&mut self, id: ElementId) {
        self.tree.invalidate_measure(id);
    }

    /// Invalidates the arrange of `id`.
    pub fn invalidate_arrange(&mut self, id: ElementId) {
        self.tree.invalidate_arrange(id);
    }

    /// Builds an error attributed to the running element.
    #[must_use]
    pub fn error(&self, reason: &'static str) -> LayoutError {
        LayoutError::Policy {
            element: self.element(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Size);

    impl LayoutPolicy for Fixed {
        fn measure(&mut self, _cx: &mut LayoutCx<'_, '_>, _available: Size) -> Result<Size, LayoutError> {
            Ok(self.0)
        }
    }

    /// Stacks children vertically.
    struct Column;

    impl LayoutPolicy for Column {
        fn measure(&mut self, cx: &mut LayoutCx<'_, '_>, available: Size) -> Result<Size, LayoutError> {
            let mut total = Size::ZERO;
            for child in cx.children() {
                let s = cx.measure_child(child, available)?;
                total.width = total.width.max(s.width);
                total.height += s.height;
            }
            Ok(total)
        }

        fn arrange(&mut self, cx: &mut LayoutCx<'_, '_>, final_size: Size) -> Result<Size, LayoutError> {
            let mut y = 0.0;
            for child in cx.children() {
                let h = cx.desired_size(child).height;
                cx.arrange_child(child, Rect::new(0.0, y, final_size.width, y + h))?;
                y += h;
            }
            Ok(final_size)
        }
    }

    #[test]
    fn overlay_takes_largest_child() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let a = tree.create_element_with(Fixed(Size::new(10.0, 40.0)));
        let b = tree.create_element_with(Fixed(Size::new(30.0, 20.0)));
        tree.add_child(root, a).unwrap();
        tree.add_child(root, b).unwrap();

        tree.update_layout(root, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(tree.desired_size(root), Size::new(30.0, 40.0));
        assert_eq!(tree.final_rect(a), Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(tree.final_rect(b), Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn custom_policy_places_children() {
        let mut tree = ElementTree::new();
        let root = tree.create_element_with(Column);
        let a = tree.create_element_with(Fixed(Size::new(10.0, 15.0)));
        let b = tree.create_element_with(Fixed(Size::new(20.0, 25.0)));
        tree.add_child(root, a).unwrap();
        tree.add_child(root, b).unwrap();

        tree.update_layout(root, Size::new(50.0, 200.0)).unwrap();
        assert_eq!(tree.desired_size(root), Size::new(20.0, 40.0));
        assert_eq!(tree.final_rect(a), Rect::new(0.0, 0.0, 50.0, 15.0));
        assert_eq!(tree.final_rect(b), Rect::new(0.0, 15.0, 50.0, 40.0));
    }

    #[test]
    fn collapsed_children_are_hidden_from_policies() {
        let mut tree = ElementTree::new();
        let root = tree.create_element_with(Column);
        let a = tree.create_element_with(Fixed(Size::new(10.0, 15.0)));
        let b = tree.create_element_with(Fixed(Size::new(20.0, 25.0)));
        tree.add_child(root, a).unwrap();
        tree.add_child(root, b).unwrap();
        tree.set_visibility(a, crate::element::Visibility::Collapsed);

        tree.update_layout(root, Size::new(50.0, 200.0)).unwrap();
        assert_eq!(tree.desired_size(root), Size::new(20.0, 25.0));
        assert_eq!(tree.final_rect(b), Rect::new(0.0, 0.0, 50.0, 25.0));
    }

    #[test]
    fn set_policy_invalidates_measure() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        tree.update_layout(root, Size::new(50.0, 50.0)).unwrap();
        assert_eq!(tree.desired_size(root), Size::ZERO);

        tree.set_policy(root, Fixed(Size::new(5.0, 6.0)));
        assert!(tree.layout_flags(root).requires_measure());
        tree.update_layout(root, Size::new(50.0, 50.0)).unwrap();
        assert_eq!(tree.desired_size(root), Size::new(5.0, 6.0));
    }
}
