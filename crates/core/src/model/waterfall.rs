use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::span::{AttrValue, ProcessedSpan, SpanStatus};

/// Degradations applied while shaping a trace. None of them stop the rest of
/// the trace from rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    MissingStartTime,
    MissingEndTime,
    NegativeDuration,
    DuplicateSpanId,
    CycleBroken,
    DroppedAttribute { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanIssue {
    pub span_id: String,
    pub kind: IssueKind,
}

impl SpanIssue {
    pub fn new(span_id: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            span_id: span_id.into(),
            kind,
        }
    }
}

/// One waterfall row: a span without its subtree, positioned relative to the
/// trace start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRow {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub operation_name: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    /// Milliseconds between the trace start and this span's start.
    pub offset: f64,
    pub attributes: BTreeMap<String, AttrValue>,
    pub status: Option<SpanStatus>,
    pub service_name: String,
    pub level: usize,
    pub child_count: usize,
}

impl SpanRow {
    pub fn from_span(span: &ProcessedSpan, trace_start: f64) -> Self {
        Self {
            trace_id: span.trace_id.clone(),
            span_id: span.span_id.clone(),
            parent_span_id: span.parent_span_id.clone(),
            name: span.name.clone(),
            operation_name: span.operation_name.clone(),
            start_time: span.start_time,
            end_time: span.end_time,
            duration: span.duration,
            offset: (span.start_time - trace_start).max(0.0),
            attributes: span.attributes.clone(),
            status: span.status.clone(),
            service_name: span.service_name.clone(),
            level: span.level,
            child_count: span.children.len(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.as_ref().is_some_and(SpanStatus::is_error)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub trace_id: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub span_count: usize,
    pub error_count: usize,
    pub services: Vec<String>,
    pub root_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waterfall {
    pub summary: TraceSummary,
    pub rows: Vec<SpanRow>,
    pub issues: Vec<SpanIssue>,
}

impl Waterfall {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_malformed(&self) -> bool {
        !self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_kinds_serialize_tagged() {
        let issue = SpanIssue::new(
            "abc",
            IssueKind::DroppedAttribute {
                key: "blob".to_string(),
            },
        );
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["spanId"], "abc");
        assert_eq!(json["kind"]["type"], "dropped_attribute");
        assert_eq!(json["kind"]["key"], "blob");

        let cycle = serde_json::to_value(IssueKind::CycleBroken).unwrap();
        assert_eq!(cycle["type"], "cycle_broken");
    }

    #[test]
    fn empty_waterfall_is_not_malformed() {
        let wf = Waterfall::default();
        assert!(wf.is_empty());
        assert!(!wf.is_malformed());
    }
}
