// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, tree dumps, and Chrome trace export for
//! isostasy layout diagnostics.
//!
//! This crate provides [`TraceSink`](isostasy_core::trace::TraceSink)
//! implementations and inspection helpers for development and post-mortem
//! analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from recorded
//!   bytes.
//! - [`dump::dump_tree`]: an indented snapshot of an element subtree with its
//!   layout flags.

pub mod chrome;
pub mod dump;
pub mod pretty;
pub mod recorder;
