//! Request events and their summary

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Type of a timed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestKind {
    Connect,
    Set,
    Get,
}

impl RequestKind {
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::Connect => "CONNECT",
            RequestKind::Set => "SET",
            RequestKind::Get => "GET",
        }
    }
}

/// One timed request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEvent {
    pub kind: RequestKind,
    /// Key or address the request targeted
    pub name: String,
    pub response_time_ms: f64,
    /// Reply length on success
    pub response_length: usize,
    /// Error text on failure
    pub error: Option<String>,
}

impl RequestEvent {
    pub fn success(kind: RequestKind, name: impl Into<String>, elapsed: Duration, length: usize) -> Self {
        RequestEvent {
            kind,
            name: name.into(),
            response_time_ms: elapsed.as_secs_f64() * 1000.0,
            response_length: length,
            error: None,
        }
    }

    pub fn failure(
        kind: RequestKind,
        name: impl Into<String>,
        elapsed: Duration,
        error: impl fmt::Display,
    ) -> Self {
        RequestEvent {
            kind,
            name: name.into(),
            response_time_ms: elapsed.as_secs_f64() * 1000.0,
            response_length: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Where virtual users report their requests
pub type EventSink = mpsc::UnboundedSender<RequestEvent>;

/// Success and failure counts of one request type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestCounts {
    pub successes: u64,
    pub failures: u64,
}

/// Counts per request type over a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub requests: BTreeMap<RequestKind, RequestCounts>,
}

impl LoadSummary {
    pub fn record(&mut self, event: &RequestEvent) {
        let counts = self.requests.entry(event.kind).or_default();
        if event.is_failure() {
            counts.failures += 1;
        } else {
            counts.successes += 1;
        }
    }

    pub fn counts(&self, kind: RequestKind) -> RequestCounts {
        self.requests.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_successes(&self) -> u64 {
        self.requests.values().map(|c| c.successes).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.requests.values().map(|c| c.failures).sum()
    }

    /// Drain a channel until every sender is gone
    pub async fn collect(mut events: mpsc::UnboundedReceiver<RequestEvent>) -> Self {
        let mut summary = LoadSummary::default();
        while let Some(event) = events.recv().await {
            summary.record(&event);
        }
        summary
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<8} {:>10} {:>10}", "type", "ok", "failed")?;
        for (kind, counts) in &self.requests {
            writeln!(
                f,
                "{:<8} {:>10} {:>10}",
                kind.name(),
                counts.successes,
                counts.failures
            )?;
        }
        write!(
            f,
            "{:<8} {:>10} {:>10}",
            "total",
            self.total_successes(),
            self.total_failures()
        )
    }
}
