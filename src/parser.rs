//! Line-oriented parser for the status utility's report.
//!
//! Each line of the report falls into exactly one class:
//!
//! - a **status line** `<TAG> <service> ...`, which yields one entry,
//! - an **ignorable marker** whose first token is a known chatter word,
//! - a **blank or malformed** line with fewer than two tokens.
//!
//! Only status lines produce output. Parsing never fails; anything that is not
//! recognised is dropped so that additive changes to the utility's output do
//! not break collection.

use crate::core::ServiceStatus;

/// The tag the utility prints in front of a healthy service.
pub const HEALTHY_TAG: &str = "OK:";

/// First tokens of lines that carry progress chatter rather than a status.
pub const DEFAULT_IGNORE_MARKERS: &[&str] = &["Verifying"];

/// The classification of a single report line.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Status { healthy: bool, service: &'a str },
    Marker,
    Blank,
}

/// Parses raw status reports into ordered service entries.
#[derive(Debug, Clone)]
pub struct StatusParser {
    ignore_markers: Vec<String>,
}

impl Default for StatusParser {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_MARKERS.iter().map(|m| m.to_string()))
    }
}

impl StatusParser {
    /// Creates a parser that skips lines starting with any of `ignore_markers`.
    pub fn new<I, S>(ignore_markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignore_markers: ignore_markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a raw report. Entries keep the order in which they appear.
    pub fn parse(&self, raw: &[u8]) -> Vec<ServiceStatus> {
        let text = String::from_utf8_lossy(raw);
        text.split('\n')
            .filter_map(|line| match self.classify(line) {
                Line::Status { healthy, service } => Some(ServiceStatus::new(service, healthy)),
                Line::Marker | Line::Blank => None,
            })
            .collect()
    }

    fn classify<'a>(&self, line: &'a str) -> Line<'a> {
        // Single-space boundaries: a service name containing a space is
        // truncated to its first word.
        let mut tokens = line.split(' ');
        let (tag, service) = match (tokens.next(), tokens.next()) {
            (Some(tag), Some(service)) => (tag, service),
            _ => return Line::Blank,
        };

        if self.ignore_markers.iter().any(|m| m == tag) {
            return Line::Marker;
        }

        Line::Status {
            healthy: tag == HEALTHY_TAG,
            service,
        }
    }
}

/// Parses a raw report with the default marker set.
pub fn parse(raw: &[u8]) -> Vec<ServiceStatus> {
    StatusParser::default().parse(raw)
}
