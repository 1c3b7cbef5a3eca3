use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::otlp::STATUS_CODE_ERROR;

/// A decoded attribute scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::String(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Double(d) => write!(f, "{d}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanStatus {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SpanStatus {
    pub fn is_error(&self) -> bool {
        self.code == STATUS_CODE_ERROR
    }
}

/// A span with millisecond timings, decoded attributes and its owned subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub name: String,
    pub operation_name: String,
    /// Epoch milliseconds.
    pub start_time: f64,
    /// Epoch milliseconds.
    pub end_time: f64,
    pub duration: f64,
    pub attributes: BTreeMap<String, AttrValue>,
    pub status: Option<SpanStatus>,
    pub service_name: String,
    pub level: usize,
    #[serde(default)]
    pub children: Vec<ProcessedSpan>,
}

impl ProcessedSpan {
    pub fn is_error(&self) -> bool {
        self.status.as_ref().is_some_and(SpanStatus::is_error)
    }

    /// Number of spans in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(span) = stack.pop() {
            count += 1;
            stack.extend(span.children.iter());
        }
        count
    }
}

// Subtrees are unlinked onto a heap stack first; the derived drop glue
// would recurse once per level.
impl Drop for ProcessedSpan {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut span) = stack.pop() {
            stack.append(&mut span.children);
        }
    }
}
