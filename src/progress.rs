//! Progress events emitted by catalog loading and save import
//!
//! Events are immutable snapshots: every field is optional and counters
//! carry running totals, so a sink can render any event on its own.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use tracing::debug;

/// Named running totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Files,
    Languages,
    Texts,
    Wares,
    Factions,
    SectorNames,
    Storages,
    ShipStorages,
    ShipTypes,
    Ships,
    Stations,
    Removed,
    Trades,
    Gates,
    Superhighways,
    Subordinates,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Counter::Files => "files",
            Counter::Languages => "languages",
            Counter::Texts => "texts",
            Counter::Wares => "wares",
            Counter::Factions => "factions",
            Counter::SectorNames => "sector names",
            Counter::Storages => "storages",
            Counter::ShipStorages => "ship storages",
            Counter::ShipTypes => "ship types",
            Counter::Ships => "ships",
            Counter::Stations => "stations",
            Counter::Removed => "removed",
            Counter::Trades => "trades",
            Counter::Gates => "gates",
            Counter::Superhighways => "superhighways",
            Counter::Subordinates => "subordinates",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub counters: BTreeMap<Counter, u64>,
}

impl ProgressEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_counter(mut self, counter: Counter, value: u64) -> Self {
        self.counters.insert(counter, value);
        self
    }

    pub fn with_counters(mut self, counters: &BTreeMap<Counter, u64>) -> Self {
        self.counters
            .extend(counters.iter().map(|(counter, value)| (*counter, *value)));
        self
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(package) = &self.package {
            parts.push(format!("[{}]", package));
        }
        if let Some(status) = &self.status {
            parts.push(status.clone());
        }
        if let Some(file) = &self.file {
            parts.push(file.clone());
        }
        if !self.counters.is_empty() {
            let counters: Vec<String> = self
                .counters
                .iter()
                .map(|(counter, value)| format!("{} {}", counter, value))
                .collect();
            parts.push(format!("({})", counters.join(", ")));
        }
        f.write_str(&parts.join(" "))
    }
}

/// Receiver of progress events, invoked inline by the loaders
pub trait ProgressSink {
    fn report(&mut self, event: &ProgressEvent);
}

impl<F: FnMut(&ProgressEvent)> ProgressSink for F {
    fn report(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&mut self, _event: &ProgressEvent) {}
}

/// Writes one JSON object per event
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for JsonLinesSink<W> {
    fn report(&mut self, event: &ProgressEvent) {
        let written = serde_json::to_writer(&mut self.out, event)
            .map_err(std::io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            debug!("Failed to write progress event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_lines() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.report(
            &ProgressEvent::status("Parsing wares...")
                .with_package("game")
                .with_counter(Counter::Wares, 12),
        );
        sink.report(&ProgressEvent::new().with_counter(Counter::ShipStorages, 3));

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            r#"{"package":"game","status":"Parsing wares...","counters":{"wares":12}}"#
        );
        assert_eq!(lines[1], r#"{"counters":{"ship_storages":3}}"#);
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |event: &ProgressEvent| seen.push(event.clone());
            sink.report(&ProgressEvent::status("a"));
            sink.report(&ProgressEvent::status("b"));
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].status.as_deref(), Some("b"));
    }

    #[test]
    fn test_display() {
        let event = ProgressEvent::status("Importing save...")
            .with_counter(Counter::Trades, 2)
            .with_counter(Counter::Ships, 1);
        assert_eq!(event.to_string(), "Importing save... (ships 1, trades 2)");
    }
}
