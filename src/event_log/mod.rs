//! # Event Log Types
//!
//! Traces and events as produced by the generator and consumed by the
//! conformance checker: an event carries its activity name, 1-based
//! position, resource (attribute) bindings and a timestamp; a trace carries
//! a unique name and a positive/negative label.
//!
//! The log can be exported as an XES event stream (the interchange format
//! of process mining tools) or serialised to JSON through serde.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Label distinguishing traces that satisfy the model from traces generated
/// to violate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLabel {
    Positive,
    Negative,
}

impl TraceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceLabel::Positive => "positive",
            TraceLabel::Negative => "negative",
        }
    }
}

impl fmt::Display for TraceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub activity: String,
    /// 1-based position within the trace.
    pub position: usize,
    /// Resource (attribute) bindings, decoded and rescaled.
    pub resources: BTreeMap<String, String>,
    pub timestamp: DateTime<FixedOffset>,
}

impl Event {
    pub fn resource(&self, name: &str) -> Option<&str> {
        self.resources.get(name).map(String::as_str)
    }
}

/// Finite ordered sequence of events under a common case identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    pub label: TraceLabel,
    pub events: Vec<Event>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Activity names in order, handy in tests.
    pub fn activity_sequence(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.activity.as_str()).collect()
    }
}

/// A generated event log: a collection of labelled traces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub traces: Vec<Trace>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn positive(&self) -> impl Iterator<Item = &Trace> {
        self.traces
            .iter()
            .filter(|t| t.label == TraceLabel::Positive)
    }

    pub fn negative(&self) -> impl Iterator<Item = &Trace> {
        self.traces
            .iter()
            .filter(|t| t.label == TraceLabel::Negative)
    }

    /// Traces are exported sorted by name.
    pub fn sort_by_name(&mut self) {
        self.traces.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Write the log as an XES event stream.
    pub fn write_xes<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            writer,
            r#"<log xes.version="1.0" xes.features="nested-attributes" xmlns="http://www.xes-standard.org/">"#
        )?;
        for trace in &self.traces {
            writeln!(writer, "  <trace>")?;
            writeln!(
                writer,
                r#"    <string key="concept:name" value="{}"/>"#,
                xml_escape(&trace.name)
            )?;
            writeln!(
                writer,
                r#"    <string key="label" value="{}"/>"#,
                trace.label
            )?;
            for event in &trace.events {
                writeln!(writer, "    <event>")?;
                writeln!(
                    writer,
                    r#"      <string key="concept:name" value="{}"/>"#,
                    xml_escape(&event.activity)
                )?;
                writeln!(
                    writer,
                    r#"      <string key="lifecycle:transition" value="complete"/>"#
                )?;
                writeln!(
                    writer,
                    r#"      <date key="time:timestamp" value="{}"/>"#,
                    event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
                )?;
                for (key, value) in &event.resources {
                    writeln!(
                        writer,
                        r#"      <string key="{}" value="{}"/>"#,
                        xml_escape(key),
                        xml_escape(value)
                    )?;
                }
                writeln!(writer, "    </event>")?;
            }
            writeln!(writer, "  </trace>")?;
        }
        writeln!(writer, "</log>")
    }

    pub fn to_xes_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_xes(&mut writer)?;
        writer.flush()
    }
}

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .expect("offset")
            .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("timestamp")
    }

    fn sample_log() -> EventLog {
        EventLog {
            traces: vec![Trace {
                name: "trace_0".to_string(),
                label: TraceLabel::Positive,
                events: vec![Event {
                    activity: "apply <loan>".to_string(),
                    position: 1,
                    resources: BTreeMap::from([("grade".to_string(), "57".to_string())]),
                    timestamp: fixed_time(),
                }],
            }],
        }
    }

    #[test]
    fn test_xes_output_shape() {
        let mut buffer = Vec::new();
        sample_log().write_xes(&mut buffer).expect("write");
        let xes = String::from_utf8(buffer).expect("utf8");
        assert!(xes.contains(r#"<string key="concept:name" value="trace_0"/>"#));
        assert!(xes.contains(r#"<string key="label" value="positive"/>"#));
        assert!(xes.contains(r#"<string key="lifecycle:transition" value="complete"/>"#));
        assert!(xes.contains(r#"<date key="time:timestamp" value="2024-03-01T12:00:00+01:00"/>"#));
        assert!(xes.contains(r#"value="apply &lt;loan&gt;""#));
        assert!(xes.contains(r#"<string key="grade" value="57"/>"#));
    }

    #[test]
    fn test_sort_by_name() {
        let mut log = EventLog {
            traces: vec![
                Trace {
                    name: "trace_1".to_string(),
                    label: TraceLabel::Positive,
                    events: vec![],
                },
                Trace {
                    name: "trace_0".to_string(),
                    label: TraceLabel::Positive,
                    events: vec![],
                },
            ],
        };
        log.sort_by_name();
        assert_eq!(log.traces[0].name, "trace_0");
    }

    #[test]
    fn test_json_round_trip() {
        let log = sample_log();
        let json = serde_json::to_string(&log).expect("serialize");
        let back: EventLog = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(log, back);
    }
}
