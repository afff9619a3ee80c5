// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-element flag words.
//!
//! Each concern owns its own bits so that one kind of invalidation never
//! reads as another: measure, arrange, viewport, and automation-peer flags
//! never alias. Setting or clearing a bit has no side effects; propagation is
//! the job of [`invalidate`](crate::invalidate).

use bitflags::bitflags;

bitflags! {
    /// Layout state of one element.
    ///
    /// `*_DIRTY` means the element itself must redo the pass. `ON_*_DIRTY_PATH`
    /// means some descendant must, so the pass has to walk through this
    /// element without necessarily recomputing it. `*_PENDING` records an
    /// invalidation that arrived while the element could not take part in
    /// layout (collapsed or detached).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LayoutFlags: u32 {
        /// Desired size is stale.
        const MEASURE_DIRTY = 1 << 0;
        /// A measure invalidation is waiting for the element to become eligible.
        const MEASURE_DIRTY_PENDING = 1 << 1;
        /// A descendant is measure dirty.
        const ON_MEASURE_DIRTY_PATH = 1 << 2;
        /// The element is inside its own measure call.
        const ON_MEASURE_STACK = 1 << 3;
        /// The element's measure policy is running (as opposed to the element
        /// only being walked as part of a dirty path).
        const IS_MEASURING_SELF = 1 << 4;
        /// The element has completed at least one measure.
        const HAS_BEEN_MEASURED = 1 << 5;

        /// Arranged rect is stale.
        const ARRANGE_DIRTY = 1 << 8;
        /// An arrange invalidation is waiting for the element to become eligible.
        const ARRANGE_DIRTY_PENDING = 1 << 9;
        /// A descendant is arrange dirty.
        const ON_ARRANGE_DIRTY_PATH = 1 << 10;
        /// The element is inside its own arrange call.
        const ON_ARRANGE_STACK = 1 << 11;
        /// A measure invalidation arrived while this element was arranging.
        const MEASURE_DURING_ARRANGE = 1 << 12;

        /// Effective viewport inputs changed at this element.
        const VIEWPORT_DIRTY = 1 << 16;
        /// A descendant has dirty viewport inputs.
        const ON_VIEWPORT_DIRTY_PATH = 1 << 17;
        /// The element wants to be told its effective viewport.
        const WANTS_VIEWPORT = 1 << 18;
        /// Some descendant wants its effective viewport.
        const CONTRIBUTES_TO_VIEWPORT = 1 << 19;

        /// Automation peer needs regeneration.
        const AUTOMATION_PEER_DIRTY = 1 << 22;
        /// A descendant's automation peer needs regeneration.
        const ON_AUTOMATION_PEER_DIRTY_PATH = 1 << 23;

        /// A size-changed notification is queued for this element.
        const SIZE_CHANGED = 1 << 26;
        /// The element asked for size-changed notifications.
        const WANTS_SIZE_CHANGED = 1 << 27;
    }
}

impl LayoutFlags {
    /// The measure pass must visit this element.
    #[inline]
    #[must_use]
    pub fn requires_measure(self) -> bool {
        self.intersects(Self::MEASURE_DIRTY | Self::ON_MEASURE_DIRTY_PATH)
            || !self.contains(Self::HAS_BEEN_MEASURED)
    }

    /// The arrange pass must visit this element.
    #[inline]
    #[must_use]
    pub fn requires_arrange(self) -> bool {
        self.intersects(Self::ARRANGE_DIRTY | Self::ON_ARRANGE_DIRTY_PATH)
    }

    /// Either layout pass must visit this element.
    #[inline]
    #[must_use]
    pub fn requires_layout(self) -> bool {
        self.requires_measure() || self.requires_arrange()
    }

    /// The viewport walk must visit this element.
    #[inline]
    #[must_use]
    pub fn requires_viewport_walk(self) -> bool {
        self.intersects(Self::VIEWPORT_DIRTY | Self::ON_VIEWPORT_DIRTY_PATH)
    }

    /// Any pending (deferred) invalidation is recorded.
    #[inline]
    #[must_use]
    pub fn has_pending(self) -> bool {
        self.intersects(Self::MEASURE_DIRTY_PENDING | Self::ARRANGE_DIRTY_PENDING)
    }

    /// The element or a descendant participates in effective viewport tracking.
    #[inline]
    #[must_use]
    pub fn is_viewport_interested(self) -> bool {
        self.intersects(Self::WANTS_VIEWPORT | Self::CONTRIBUTES_TO_VIEWPORT)
    }
}

bitflags! {
    /// Collaborator-facing element state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ElementFlags: u16 {
        /// The element accepts input. Disabled elements prune hit testing
        /// of their subtree unless explicitly included.
        const ENABLED = 1 << 0;
        /// The element takes part in hit testing.
        const HIT_TEST_VISIBLE = 1 << 1;
        /// Hit testing is temporarily suppressed (e.g. during a transition).
        const HIT_TEST_SUPPRESSED = 1 << 2;
        /// The element is the root of a layout pass.
        const LAYOUT_ROOT = 1 << 3;
        /// Everything below the element was invalidated in bulk.
        const ENTIRE_SUBTREE_DIRTY = 1 << 4;
        /// The element is drawn through a redirect host and is skipped at its
        /// logical position.
        const HIDDEN_FOR_REDIRECT = 1 << 5;
        /// The element's local transform is projective with real depth.
        const HAS_3D_DEPTH = 1 << 6;
        /// Some descendant has 3D depth.
        const HAS_3D_DEPTH_IN_SUBTREE = 1 << 7;
        /// The element draws a redirect target.
        const REDIRECT_HOST = 1 << 8;
        /// Some descendant draws a redirect target.
        const HAS_REDIRECT_IN_SUBTREE = 1 << 9;
    }
}

impl Default for ElementFlags {
    fn default() -> Self {
        Self::ENABLED | Self::HIT_TEST_VISIBLE
    }
}

impl ElementFlags {
    /// The element or a descendant has 3D depth, so ordinary outer bounds do
    /// not describe its subtree.
    #[inline]
    #[must_use]
    pub fn has_depth_below(self) -> bool {
        self.intersects(Self::HAS_3D_DEPTH | Self::HAS_3D_DEPTH_IN_SUBTREE)
    }

    /// The element or a descendant draws content from elsewhere in the tree,
    /// so outer bounds miss part of what the subtree shows.
    #[inline]
    #[must_use]
    pub fn has_redirect_below(self) -> bool {
        self.intersects(Self::REDIRECT_HOST | Self::HAS_REDIRECT_IN_SUBTREE)
    }
}

bitflags! {
    /// Dirty bits of the four bounds tiers.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BoundsFlags: u8 {
        /// Content-inner bounds are stale.
        const CONTENT_INNER_DIRTY = 1 << 0;
        /// Child-union bounds are stale.
        const CHILD_DIRTY = 1 << 1;
        /// Combined-inner bounds are stale.
        const COMBINED_INNER_DIRTY = 1 << 2;
        /// Outer bounds are stale.
        const OUTER_DIRTY = 1 << 3;
    }
}

impl Default for BoundsFlags {
    fn default() -> Self {
        Self::all()
    }
}
