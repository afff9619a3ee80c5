// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element identity.

use core::fmt;

/// Sentinel value meaning "no element" in index fields.
pub const INVALID: u32 = u32::MAX;

/// A handle to an element in an [`ElementTree`](super::ElementTree).
///
/// Pairs a slot index with a generation counter so that handles to destroyed
/// elements are detected even after the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl ElementId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({}@gen{})", self.idx, self.generation)
    }
}
