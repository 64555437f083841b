//! Ingestion status reporting.
//!
//! The ingestion pipeline announces each step as an [`IngestStatus`] through
//! an [`IngestReporter`]. The CLI prints them on **stdout**, either as the
//! human-readable line of each status or as one JSON object per line.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;

/// One observable ingestion step, in the order they occur.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestStatus {
    Initializing,
    Resetting,
    Loading,
    /// A URL could not be fetched; ingestion continues without it.
    FetchFailed { url: String, reason: String },
    Splitting,
    Storing,
    /// Terminal event: the collection holds every fetched chunk.
    Done,
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStatus::Initializing => write!(f, "Initializing components..."),
            IngestStatus::Resetting => write!(f, "Resetting vector store..."),
            IngestStatus::Loading => write!(f, "Loading data..."),
            IngestStatus::FetchFailed { url, reason } => {
                write!(f, "Skipping {}: {}", url, reason)
            }
            IngestStatus::Splitting => write!(f, "Splitting text into chunks..."),
            IngestStatus::Storing => write!(f, "Adding chunks to the vector database..."),
            IngestStatus::Done => write!(f, "Done adding docs to the vector database..."),
        }
    }
}

/// Receives ingestion status events. Called from the ingest pipeline.
pub trait IngestReporter: Send + Sync {
    fn report(&self, status: &IngestStatus);
}

/// Prints each status line on stdout.
pub struct StdoutProgress;

impl IngestReporter for StdoutProgress {
    fn report(&self, status: &IngestStatus) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", status);
        let _ = out.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stdout.
pub struct JsonProgress;

impl IngestReporter for JsonProgress {
    fn report(&self, status: &IngestStatus) {
        if let Ok(line) = serde_json::to_string(&json_event(status)) {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
    }
}

fn json_event(status: &IngestStatus) -> serde_json::Value {
    let mut value = serde_json::to_value(status).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = value.as_object_mut() {
        obj.insert("event".to_string(), "ingest".into());
        obj.insert("message".to_string(), status.to_string().into());
    }
    value
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestReporter for NoProgress {
    fn report(&self, _status: &IngestStatus) {}
}

/// Keeps every event in memory, for callers that inspect the sequence.
#[derive(Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<IngestStatus>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<IngestStatus> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl IngestReporter for CollectingReporter {
    fn report(&self, status: &IngestStatus) {
        if let Ok(mut events) = self.events.lock() {
            events.push(status.clone());
        }
    }
}

/// Progress mode for the CLI.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    pub fn reporter(&self) -> Box<dyn IngestReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StdoutProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(
            IngestStatus::Initializing.to_string(),
            "Initializing components..."
        );
        assert_eq!(
            IngestStatus::Done.to_string(),
            "Done adding docs to the vector database..."
        );
        let failed = IngestStatus::FetchFailed {
            url: "https://x.example".to_string(),
            reason: "server responded with HTTP 404".to_string(),
        };
        assert_eq!(
            failed.to_string(),
            "Skipping https://x.example: server responded with HTTP 404"
        );
    }

    #[test]
    fn test_json_event_shape() {
        let value = json_event(&IngestStatus::FetchFailed {
            url: "u".to_string(),
            reason: "r".to_string(),
        });
        assert_eq!(value["event"], "ingest");
        assert_eq!(value["status"], "fetch_failed");
        assert_eq!(value["url"], "u");
        assert_eq!(value["message"], "Skipping u: r");

        let value = json_event(&IngestStatus::Splitting);
        assert_eq!(value["status"], "splitting");
    }

    #[test]
    fn test_collecting_reporter_keeps_order() {
        let reporter = CollectingReporter::new();
        reporter.report(&IngestStatus::Initializing);
        reporter.report(&IngestStatus::Done);
        assert_eq!(
            reporter.events(),
            vec![IngestStatus::Initializing, IngestStatus::Done]
        );
    }
}
