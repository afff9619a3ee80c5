// Copyright 2026 the Isostasy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Layout events carry no wall-clock time, so each event's `ts` is its
//! ordinal in the recording. Passes become begin/end pairs and everything
//! else becomes an instant, which keeps nesting intact in the viewer.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Every event goes on the thread of its layout root.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    // Element events do not name their root; attribute them to the pass
    // currently open.
    let mut current_root = 0_u32;

    for (ts, recorded) in decode(bytes).enumerate() {
        match recorded {
            RecordedEvent::PassBegin(e) => {
                current_root = e.root;
                events.push(json!({
                    "ph": "B",
                    "name": e.pass.name(),
                    "cat": "Pass",
                    "ts": ts,
                    "pid": 0,
                    "tid": e.root,
                    "args": {
                        "iteration": e.iteration,
                    }
                }));
            }
            RecordedEvent::PassEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": e.pass.name(),
                    "cat": "Pass",
                    "ts": ts,
                    "pid": 0,
                    "tid": e.root,
                    "args": {
                        "iteration": e.iteration,
                        "recomputed": e.recomputed,
                        "visited": e.visited,
                    }
                }));
            }
            RecordedEvent::ElementLayout(e) => {
                let cat = if e.recomputed { "Recompute" } else { "Walk" };
                events.push(json!({
                    "ph": "i",
                    "name": format!("{} {}", e.pass.name(), e.element),
                    "cat": cat,
                    "ts": ts,
                    "pid": 0,
                    "tid": current_root,
                    "s": "t",
                    "args": {
                        "element": e.element,
                        "width": e.width,
                        "height": e.height,
                    }
                }));
            }
            RecordedEvent::LayoutSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "LayoutSummary",
                    "cat": "Summary",
                    "ts": ts,
                    "pid": 0,
                    "tid": s.root,
                    "s": "g",
                    "args": {
                        "iterations": s.iterations,
                        "measure_recomputes": s.measure_recomputes,
                        "arrange_recomputes": s.arrange_recomputes,
                        "path_visits": s.path_visits,
                        "size_changed": s.size_changed,
                        "viewport_changes": s.viewport_changes,
                    }
                }));
            }
            RecordedEvent::LayoutCycle(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "LayoutCycle",
                    "cat": "Error",
                    "ts": ts,
                    "pid": 0,
                    "tid": e.root,
                    "s": "g",
                    "args": {
                        "iterations": e.iterations,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use isostasy_core::trace::{
        ElementLayoutEvent, LayoutCycleEvent, PassBeginEvent, PassEndEvent, PassKind, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let mut rec = RecorderSink::new();
        rec.on_pass_begin(&PassBeginEvent {
            iteration: 0,
            pass: PassKind::Measure,
            root: 5,
        });
        rec.on_element_layout(&ElementLayoutEvent {
            element: 6,
            pass: PassKind::Measure,
            recomputed: true,
            width: 1.0,
            height: 2.0,
        });
        rec.on_pass_end(&PassEndEvent {
            iteration: 0,
            pass: PassKind::Measure,
            root: 5,
            recomputed: 1,
            visited: 0,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "measure");
        assert_eq!(parsed[0]["tid"], 5);

        assert_eq!(parsed[1]["ph"], "i");
        assert_eq!(parsed[1]["name"], "measure 6");
        assert_eq!(parsed[1]["cat"], "Recompute");
        assert_eq!(parsed[1]["tid"], 5);
        assert_eq!(parsed[1]["ts"], 1);

        assert_eq!(parsed[2]["ph"], "E");
        assert_eq!(parsed[2]["args"]["recomputed"], 1);
    }

    #[test]
    fn cycle_is_a_global_instant() {
        let mut rec = RecorderSink::new();
        rec.on_layout_cycle(&LayoutCycleEvent {
            root: 0,
            iterations: 8,
        });

        let mut out = Vec::new();
        export(rec.as_bytes(), &mut out).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["name"], "LayoutCycle");
        assert_eq!(parsed[0]["s"], "g");
        assert_eq!(parsed[0]["args"]["iterations"], 8);
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
