// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, each prefixed by a one-byte
//! tag. [`decode`] reads them back as an iterator of [`RecordedEvent`]; it
//! stops at the first unknown tag or truncated record.

use isostasy_core::trace::{
    ElementLayoutEvent, LayoutCycleEvent, LayoutSummary, PassBeginEvent, PassEndEvent, PassKind,
    TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PASS_BEGIN: u8 = 1;
const TAG_PASS_END: u8 = 2;
const TAG_LAYOUT_SUMMARY: u8 = 3;
const TAG_LAYOUT_CYCLE: u8 = 4;
const TAG_ELEMENT_LAYOUT: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_pass(&mut self, p: PassKind) {
        self.write_u8(match p {
            PassKind::Measure => 0,
            PassKind::Arrange => 1,
            PassKind::Viewport => 2,
            PassKind::SizeChanged => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.write_u8(TAG_PASS_BEGIN);
        self.write_u32(e.iteration);
        self.write_pass(e.pass);
        self.write_u32(e.root);
    }

    fn on_pass_end(&mut self, e: &PassEndEvent) {
        self.write_u8(TAG_PASS_END);
        self.write_u32(e.iteration);
        self.write_pass(e.pass);
        self.write_u32(e.root);
        self.write_u32(e.recomputed);
        self.write_u32(e.visited);
    }

    fn on_layout_summary(&mut self, s: &LayoutSummary) {
        self.write_u8(TAG_LAYOUT_SUMMARY);
        self.write_u32(s.root);
        self.write_u32(s.iterations);
        self.write_u32(s.measure_recomputes);
        self.write_u32(s.arrange_recomputes);
        self.write_u32(s.path_visits);
        self.write_u32(s.size_changed);
        self.write_u32(s.viewport_changes);
    }

    fn on_layout_cycle(&mut self, e: &LayoutCycleEvent) {
        self.write_u8(TAG_LAYOUT_CYCLE);
        self.write_u32(e.root);
        self.write_u32(e.iterations);
    }

    fn on_element_layout(&mut self, e: &ElementLayoutEvent) {
        self.write_u8(TAG_ELEMENT_LAYOUT);
        self.write_u32(e.element);
        self.write_pass(e.pass);
        self.write_u8(u8::from(e.recomputed));
        self.write_f64(e.width);
        self.write_f64(e.height);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`PassBeginEvent`].
    PassBegin(PassBeginEvent),
    /// A [`PassEndEvent`].
    PassEnd(PassEndEvent),
    /// A [`LayoutSummary`].
    LayoutSummary(LayoutSummary),
    /// A [`LayoutCycleEvent`].
    LayoutCycle(LayoutCycleEvent),
    /// An [`ElementLayoutEvent`].
    ElementLayout(ElementLayoutEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter { data: bytes }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, rest) = self.data.split_first_chunk::<N>()?;
        self.data = rest;
        Some(*head)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.take().map(f64::from_le_bytes)
    }

    fn read_pass(&mut self) -> Option<PassKind> {
        Some(match self.read_u8()? {
            0 => PassKind::Measure,
            1 => PassKind::Arrange,
            2 => PassKind::Viewport,
            3 => PassKind::SizeChanged,
            _ => return None,
        })
    }

    fn decode_pass_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassBegin(PassBeginEvent {
            iteration: self.read_u32()?,
            pass: self.read_pass()?,
            root: self.read_u32()?,
        }))
    }

    fn decode_pass_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PassEnd(PassEndEvent {
            iteration: self.read_u32()?,
            pass: self.read_pass()?,
            root: self.read_u32()?,
            recomputed: self.read_u32()?,
            visited: self.read_u32()?,
        }))
    }

    fn decode_layout_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::LayoutSummary(LayoutSummary {
            root: self.read_u32()?,
            iterations: self.read_u32()?,
            measure_recomputes: self.read_u32()?,
            arrange_recomputes: self.read_u32()?,
            path_visits: self.read_u32()?,
            size_changed: self.read_u32()?,
            viewport_changes: self.read_u32()?,
        }))
    }

    fn decode_layout_cycle(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::LayoutCycle(LayoutCycleEvent {
            root: self.read_u32()?,
            iterations: self.read_u32()?,
        }))
    }

    fn decode_element_layout(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ElementLayout(ElementLayoutEvent {
            element: self.read_u32()?,
            pass: self.read_pass()?,
            recomputed: self.read_u8()? != 0,
            width: self.read_f64()?,
            height: self.read_f64()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let event = match self.read_u8()? {
            TAG_PASS_BEGIN => self.decode_pass_begin(),
            TAG_PASS_END => self.decode_pass_end(),
            TAG_LAYOUT_SUMMARY => self.decode_layout_summary(),
            TAG_LAYOUT_CYCLE => self.decode_layout_cycle(),
            TAG_ELEMENT_LAYOUT => self.decode_element_layout(),
            _ => None,
        };
        if event.is_none() {
            // Unknown tag or truncated record: nothing after it can be trusted.
            self.data = &[];
        }
        event
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use isostasy_core::element::ElementTree;
    use isostasy_core::trace::Tracer;
    use kurbo::Size;

    #[test]
    fn records_a_real_layout() {
        let mut tree = ElementTree::new();
        let root = tree.create_element();
        let child = tree.create_element();
        tree.add_child(root, child).unwrap();

        let mut rec = RecorderSink::new();
        tree.update_layout_traced(root, Size::new(20.0, 10.0), &mut Tracer::new(&mut rec))
            .unwrap();

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert!(matches!(
            events.first(),
            Some(RecordedEvent::PassBegin(PassBeginEvent {
                iteration: 0,
                pass: PassKind::Measure,
                ..
            }))
        ));
        let Some(RecordedEvent::LayoutSummary(summary)) = events.last() else {
            panic!("expected a trailing summary, got {:?}", events.last());
        };
        assert_eq!(summary.root, root.index());
        assert_eq!(summary.measure_recomputes, 2);
        assert_eq!(summary.arrange_recomputes, 2);

        let element_events = events
            .iter()
            .filter(|e| matches!(e, RecordedEvent::ElementLayout(_)))
            .count();
        assert_eq!(element_events, 4);
    }

    #[test]
    fn element_layout_keeps_sizes() {
        let mut rec = RecorderSink::new();
        rec.on_element_layout(&ElementLayoutEvent {
            element: 9,
            pass: PassKind::Arrange,
            recomputed: false,
            width: 12.5,
            height: f64::INFINITY,
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::ElementLayout(e) => {
                assert_eq!(e.element, 9);
                assert_eq!(e.pass, PassKind::Arrange);
                assert!(!e.recomputed);
                assert_eq!(e.width, 12.5);
                assert_eq!(e.height, f64::INFINITY);
            }
            other => panic!("expected ElementLayout, got {other:?}"),
        }
    }

    #[test]
    fn cycle_event_is_recorded() {
        let mut rec = RecorderSink::new();
        rec.on_layout_cycle(&LayoutCycleEvent {
            root: 2,
            iterations: 250,
        });
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert!(matches!(
            events[..],
            [RecordedEvent::LayoutCycle(LayoutCycleEvent {
                root: 2,
                iterations: 250
            })]
        ));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_layout_cycle(&LayoutCycleEvent {
            root: 0,
            iterations: 3,
        });
        rec.on_pass_end(&PassEndEvent {
            iteration: 1,
            pass: PassKind::Measure,
            root: 0,
            recomputed: 1,
            visited: 0,
        });
        let bytes = rec.into_bytes();
        let cut = &bytes[..bytes.len() - 2];

        let events: Vec<_> = decode(cut).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RecordedEvent::LayoutCycle(_)));
    }

    #[test]
    fn unknown_tag_stops_decoding() {
        let mut bytes = vec![0xEE];
        let mut rec = RecorderSink::new();
        rec.on_layout_cycle(&LayoutCycleEvent {
            root: 0,
            iterations: 3,
        });
        bytes.extend_from_slice(rec.as_bytes());
        assert_eq!(decode(&bytes).count(), 0);
    }
}
