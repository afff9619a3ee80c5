// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Element
//! lines are indented under the pass that produced them, and pass lines carry
//! the iteration so a restless tree is easy to spot.

use std::io::Write;

use isostasy_core::trace::{
    ElementLayoutEvent, LayoutCycleEvent, LayoutSummary, PassBeginEvent, PassEndEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    elements: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("elements", &self.elements)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            elements: true,
        }
    }

    /// Whether per-element lines are written. On by default.
    #[must_use]
    pub fn with_elements(mut self, elements: bool) -> Self {
        self.elements = elements;
        self
    }

    /// Consumes the sink and returns the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[pass:begin] iter={} {} root={}",
            e.iteration,
            e.pass.name(),
            e.root,
        );
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        let _ = writeln!(
            self.writer,
            "[pass:end] iter={} {} root={} recomputed={} visited={}",
            e.iteration,
            e.pass.name(),
            e.root,
            e.recomputed,
            e.visited,
        );
    }

    fn on_layout_summary(&mut self, s: &LayoutSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] root={} iterations={} measured={} arranged={} \
             path_visits={} size_changed={} viewport_changes={}",
            s.root,
            s.iterations,
            s.measure_recomputes,
            s.arrange_recomputes,
            s.path_visits,
            s.size_changed,
            s.viewport_changes,
        );
    }

    fn on_layout_cycle(&mut self, e: &LayoutCycleEvent) {
        let _ = writeln!(
            self.writer,
            "[cycle] root={} gave up after {} iterations",
            e.root, e.iterations,
        );
    }

    fn on_element_layout(&mut self, e: &ElementLayoutEvent) {
        if !self.elements {
            return;
        }
        let how = if e.recomputed { "run" } else { "walk" };
        let _ = writeln!(
            self.writer,
            "  [{}] element={} {how} {:.1}x{:.1}",
            e.pass.name(),
            e.element,
            e.width,
            e.height,
        );
    }
}
