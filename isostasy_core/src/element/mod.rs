// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element storage and tree topology.
//!
//! Elements are stored in struct-of-arrays form inside [`ElementTree`] and
//! addressed by generational [`ElementId`] handles. The tree owns the
//! properties collaborators set (transform, clip, z-index, visibility,
//! layout policy) and the state the layout passes write back (desired size,
//! arranged rect, render size, bounds caches).
//!
//! Pass execution, invalidation, bounds, hit testing, and viewport tracking
//! are further `impl ElementTree` blocks in their own modules.

mod clip;
mod id;
mod store;
mod traverse;

pub use clip::ClipShape;
pub use id::{ElementId, INVALID};
pub use store::{ElementTree, Visibility};
pub use traverse::Children;
