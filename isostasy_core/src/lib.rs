// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation-driven layout for retained element trees.
//!
//! `isostasy_core` tracks, for every element of a retained UI tree, whether its
//! measured size or arranged rectangle is stale, propagates that staleness
//! along ancestor paths, recomputes four tiers of cached bounds on demand, and
//! answers hit-test and effective-viewport queries against mixed 2D/3D
//! transform stacks. It is `no_std` compatible (with `alloc`) and stores
//! elements in struct-of-arrays form addressed by generational handles.
//!
//! # Architecture
//!
//! ```text
//!   property setters ──► invalidate_* ──► LayoutFlags (dirty + path bits)
//!                                              │
//!                 ┌────────────────────────────┘
//!                 ▼
//!   update_layout(): measure ─► arrange ─► viewport walk ─► size changed
//!                                   │
//!                                   ▼
//!              BoundsFlags invalidated ──► ensure_* recompute lazily
//!                                                  │
//!                 ┌────────────────────────────────┘
//!                 ▼
//!   hit_test() / global_bounds() / effective_viewport_walk()
//! ```
//!
//! **[`element`]**: Struct-of-arrays element tree with generational
//! handles, topology, and the properties collaborators set.
//!
//! **[`flags`]**: Per-element bit sets with an independent namespace per
//! concern (measure, arrange, viewport, automation peer, bounds tiers).
//!
//! **[`invalidate`]**: Dirty-path propagation, pending dirtiness for
//! suspended elements, and subtree invalidation.
//!
//! **[`layout`]**: Measure and arrange passes plus the
//! [`update_layout`](element::ElementTree::update_layout) driver, configured by
//! [`LayoutConfig`](layout::LayoutConfig).
//!
//! **[`policy`]**: The [`LayoutPolicy`](policy::LayoutPolicy) trait that
//! containers implement, and the [`LayoutCx`](policy::LayoutCx) handed to it.
//!
//! **[`bounds`]**: Four-tier bounds cache and global bounds queries.
//!
//! **[`hit_test`]**: Point and polygon hit testing in reverse z-order.
//!
//! **[`viewport`]**: Effective-viewport interest tracking and the
//! downward viewport walk.
//!
//! **[`dirty`]**: `understory_dirty` channels used for downward
//! recompute sets.
//!
//! **[`transform`]**: Local 2D/3D transforms and projection helpers.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and layout events,
//! with a zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-element
//!   layout events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod bounds;
pub mod dirty;
pub mod element;
pub mod error;
pub mod flags;
pub mod invalidate;
pub mod layout;
pub mod policy;
pub mod trace;
pub mod transform;
pub mod viewport;
