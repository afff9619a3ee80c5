// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Point, Rect, RoundedRect, Shape};

/// A clip applied to an element's content and children, in local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClipShape {
    /// Axis-aligned rectangle clip.
    Rect(Rect),
    /// Rounded rectangle clip.
    RoundedRect(RoundedRect),
}

impl ClipShape {
    /// Axis-aligned bounds of the clip.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Rect(r) => *r,
            Self::RoundedRect(rr) => rr.rect(),
        }
    }

    /// Whether `pt` survives the clip.
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        match self {
            Self::Rect(r) => r.contains(pt),
            Self::RoundedRect(rr) => rr.contains(pt),
        }
    }
}
