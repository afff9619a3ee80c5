// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout failures.

use core::fmt;

use crate::element::ElementId;

/// A failure surfaced by a layout pass or a structural edit.
///
/// Invalidation and pass execution are total over well-formed trees; the
/// variants here cover genuine cycles, runaway nesting, and errors reported
/// by a container's own [`LayoutPolicy`](crate::policy::LayoutPolicy).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// An element was measured again while its own measure was still running.
    MeasureCycle(ElementId),
    /// An element was arranged again while its own arrange was still running.
    ArrangeCycle(ElementId),
    /// Attaching `child` under `parent` would make `child` its own ancestor.
    TreeCycle {
        /// The would-be parent.
        parent: ElementId,
        /// The element being attached.
        child: ElementId,
    },
    /// Redirecting `host` to `target` would let hit testing reach `host`
    /// again from inside `target`.
    RedirectCycle {
        /// The element that would draw `target`.
        host: ElementId,
        /// The element being redirected.
        target: ElementId,
    },
    /// More measures or arranges were nested than the configured limit.
    DepthExceeded {
        /// The configured limit.
        limit: u32,
    },
    /// [`update_layout`](crate::element::ElementTree::update_layout) did not
    /// reach a clean tree within the iteration limit.
    LayoutCycle {
        /// Iterations run before giving up.
        iterations: u32,
    },
    /// A container policy rejected its inputs.
    Policy {
        /// The element whose policy failed.
        element: ElementId,
        /// Short description from the policy.
        reason: &'static str,
    },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeasureCycle(id) => write!(f, "{id:?} re-entered its own measure"),
            Self::ArrangeCycle(id) => write!(f, "{id:?} re-entered its own arrange"),
            Self::TreeCycle { parent, child } => {
                write!(f, "attaching {child:?} under {parent:?} would create a cycle")
            }
            Self::RedirectCycle { host, target } => {
                write!(f, "redirecting {host:?} to {target:?} would create a cycle")
            }
            Self::DepthExceeded { limit } => {
                write!(f, "layout nesting exceeded {limit} levels")
            }
            Self::LayoutCycle { iterations } => {
                write!(f, "layout did not settle after {iterations} iterations")
            }
            Self::Policy { element, reason } => {
                write!(f, "layout policy of {element:?} failed: {reason}")
            }
        }
    }
}

impl core::error::Error for LayoutError {}
