// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Upward invalidation (measure, arrange, bounds) is carried by the per-element
//! bit sets in [`flags`](crate::flags), because it must stop early at the first
//! ancestor that is already marked. Downward invalidation uses
//! [`understory_dirty`]: each element depends on its parent, so marking an
//! element with [`EagerPolicy`](understory_dirty::EagerPolicy) marks its whole
//! subtree.
//!
//! # Channels
//!
//! - [`VIEWPORT`]: an element's effective viewport inputs changed (arranged
//!   rect, transform, clip, or interest). Every descendant must recompute its
//!   effective viewport on the next
//!   [`effective_viewport_walk`](crate::element::ElementTree::effective_viewport_walk).
//!
//! - [`TOPOLOGY`]: structural change under an element. Local-only; drained
//!   by [`take_topology_changes`](crate::element::ElementTree::take_topology_changes)
//!   so collaborators can resync child lists.

use understory_dirty::Channel;

/// Effective viewport inputs changed. Propagates to descendants.
pub const VIEWPORT: Channel = Channel::new(0);

/// Children were added, removed, or reordered. Local only.
pub const TOPOLOGY: Channel = Channel::new(1);
