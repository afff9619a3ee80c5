// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for layout passes.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! layout driver calls around each pass. All method bodies default to no-ops,
//! so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! [`LayoutSummaryBuilder`] folds pass-end events into the [`LayoutSummary`]
//! reported once `update_layout` settles.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`ElementLayoutEvent`] plus the
//!   corresponding `TraceSink` method.

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which pass of `update_layout` is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Desired sizes along dirty paths.
    Measure,
    /// Final rects along dirty paths.
    Arrange,
    /// Effective viewport walk.
    Viewport,
    /// Delivery of queued size-changed notifications.
    SizeChanged,
}

impl PassKind {
    /// Short lowercase name, used by debug sinks.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Measure => "measure",
            Self::Arrange => "arrange",
            Self::Viewport => "viewport",
            Self::SizeChanged => "size_changed",
        }
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Marks the beginning of a pass.
#[derive(Clone, Copy, Debug)]
pub struct PassBeginEvent {
    /// Zero-based iteration of `update_layout`.
    pub iteration: u32,
    /// Which pass is starting.
    pub pass: PassKind,
    /// Slot index of the layout root.
    pub root: u32,
}

/// Marks the end of a pass.
#[derive(Clone, Copy, Debug)]
pub struct PassEndEvent {
    /// Zero-based iteration of `update_layout`.
    pub iteration: u32,
    /// Which pass ended.
    pub pass: PassKind,
    /// Slot index of the layout root.
    pub root: u32,
    /// Elements whose policy ran during the pass.
    pub recomputed: u32,
    /// Elements only walked through because they were on a dirty path.
    pub visited: u32,
}

/// Emitted when `update_layout` settles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutSummary {
    /// Slot index of the layout root.
    pub root: u32,
    /// Iterations run, including the final clean check.
    pub iterations: u32,
    /// Measure policies run across all iterations.
    pub measure_recomputes: u32,
    /// Arrange policies run across all iterations.
    pub arrange_recomputes: u32,
    /// Elements walked through without recomputing, across all passes.
    pub path_visits: u32,
    /// Size-changed notifications delivered.
    pub size_changed: u32,
    /// Effective viewport changes reported.
    pub viewport_changes: u32,
}

/// Emitted when `update_layout` gives up.
#[derive(Clone, Copy, Debug)]
pub struct LayoutCycleEvent {
    /// Slot index of the layout root.
    pub root: u32,
    /// Iterations run before giving up.
    pub iterations: u32,
}

/// A single element handled by a measure or arrange pass.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct ElementLayoutEvent {
    /// Slot index of the element.
    pub element: u32,
    /// [`PassKind::Measure`] or [`PassKind::Arrange`].
    pub pass: PassKind,
    /// Whether the policy ran, as opposed to a dirty-path walk.
    pub recomputed: bool,
    /// Desired (measure) or render (arrange) width.
    pub width: f64,
    /// Desired (measure) or render (arrange) height.
    pub height: f64,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the layout driver.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the beginning of a pass.
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        _ = e;
    }

    /// Called at the end of a pass.
    fn on_pass_end(&mut self, e: &PassEndEvent) {
        _ = e;
    }

    /// Called once `update_layout` settles.
    fn on_layout_summary(&mut self, s: &LayoutSummary) {
        _ = s;
    }

    /// Called when `update_layout` exhausts its iterations.
    fn on_layout_cycle(&mut self, e: &LayoutCycleEvent) {
        _ = e;
    }

    /// Called per element measured or arranged (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_element_layout(&mut self, e: &ElementLayoutEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PassBeginEvent`].
    #[inline]
    pub fn pass_begin(&mut self, e: &PassBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pass_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PassEndEvent`].
    #[inline]
    pub fn pass_end(&mut self, e: &PassEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pass_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LayoutSummary`].
    #[inline]
    pub fn layout_summary(&mut self, s: &LayoutSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_layout_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits a [`LayoutCycleEvent`].
    #[inline]
    pub fn layout_cycle(&mut self, e: &LayoutCycleEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_layout_cycle(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`ElementLayoutEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn element_layout(&mut self, e: &ElementLayoutEvent) {
        if let Some(s) = &mut self.sink {
            s.on_element_layout(e);
        }
    }
}

// ---------------------------------------------------------------------------
// LayoutSummaryBuilder
// ---------------------------------------------------------------------------

/// Folds pass-end events into a [`LayoutSummary`].
#[derive(Clone, Copy, Debug)]
pub struct LayoutSummaryBuilder {
    summary: LayoutSummary,
}

impl LayoutSummaryBuilder {
    /// Starts a summary for the given root slot.
    #[must_use]
    pub fn new(root: u32) -> Self {
        Self {
            summary: LayoutSummary {
                root,
                ..LayoutSummary::default()
            },
        }
    }

    /// Accounts for one finished pass.
    pub fn record_pass(&mut self, e: &PassEndEvent) {
        match e.pass {
            PassKind::Measure => self.summary.measure_recomputes += e.recomputed,
            PassKind::Arrange => self.summary.arrange_recomputes += e.recomputed,
            PassKind::Viewport | PassKind::SizeChanged => {}
        }
        self.summary.path_visits += e.visited;
    }

    /// Consumes the builder and produces the final [`LayoutSummary`].
    #[must_use]
    pub fn finish(self, iterations: u32, size_changed: u32, viewport_changes: u32) -> LayoutSummary {
        LayoutSummary {
            iterations,
            size_changed,
            viewport_changes,
            ..self.summary
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_end(pass: PassKind, recomputed: u32, visited: u32) -> PassEndEvent {
        PassEndEvent {
            iteration: 0,
            pass,
            root: 3,
            recomputed,
            visited,
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_pass_begin(&PassBeginEvent {
            iteration: 0,
            pass: PassKind::Measure,
            root: 0,
        });
        sink.on_pass_end(&pass_end(PassKind::Measure, 1, 0));
        sink.on_layout_summary(&LayoutSummary::default());
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.pass_end(&pass_end(PassKind::Arrange, 2, 2));
        tracer.layout_cycle(&LayoutCycleEvent {
            root: 0,
            iterations: 250,
        });
    }

    #[test]
    fn summary_builder_splits_recomputes_by_pass() {
        let mut builder = LayoutSummaryBuilder::new(3);
        builder.record_pass(&pass_end(PassKind::Measure, 4, 1));
        builder.record_pass(&pass_end(PassKind::Arrange, 2, 3));
        builder.record_pass(&pass_end(PassKind::Measure, 1, 0));
        builder.record_pass(&pass_end(PassKind::Viewport, 0, 5));

        let summary = builder.finish(5, 1, 2);
        assert_eq!(summary.root, 3);
        assert_eq!(summary.iterations, 5);
        assert_eq!(summary.measure_recomputes, 5);
        assert_eq!(summary.arrange_recomputes, 2);
        assert_eq!(summary.path_visits, 9);
        assert_eq!(summary.size_changed, 1);
        assert_eq!(summary.viewport_changes, 2);
    }

    #[test]
    fn pass_names_are_distinct() {
        let names = [
            PassKind::Measure.name(),
            PassKind::Arrange.name(),
            PassKind::Viewport.name(),
            PassKind::SizeChanged.name(),
        ];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            passes: Vec<PassKind>,
        }
        impl TraceSink for RecordingSink {
            fn on_pass_begin(&mut self, e: &PassBeginEvent) {
                self.passes.push(e.pass);
            }
        }

        let mut sink = RecordingSink { passes: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.pass_begin(&PassBeginEvent {
            iteration: 0,
            pass: PassKind::Viewport,
            root: 0,
        });
        drop(tracer);
        assert_eq!(sink.passes, &[PassKind::Viewport]);
    }
}
