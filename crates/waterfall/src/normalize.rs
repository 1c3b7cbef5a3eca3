use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use spanview_core::model::otlp::{Nanos, RawSpan, TraceDocument};
use spanview_core::model::span::{AttrValue, ProcessedSpan, SpanStatus};
use spanview_core::model::waterfall::{IssueKind, SpanIssue};
use spanview_core::time::nanos_to_millis;

use crate::attrs::{decode_attributes, service_name};

/// Flat spans in document order, with `children` empty and `level` zero.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub spans: Vec<ProcessedSpan>,
    /// `spanId` to position in `spans`. The first occurrence of an id wins.
    pub index: HashMap<String, usize>,
    pub issues: Vec<SpanIssue>,
}

struct Pending<'a> {
    raw: &'a RawSpan,
    service: String,
    attributes: BTreeMap<String, AttrValue>,
    start: Option<f64>,
    end: Option<f64>,
}

pub fn normalize(doc: &TraceDocument) -> Normalized {
    let mut issues = Vec::new();
    let mut pending = Vec::with_capacity(doc.span_count());

    for batch in &doc.batches {
        let service = service_name(batch.resource.as_ref());
        for scope in &batch.scope_spans {
            for raw in &scope.spans {
                let decoded = decode_attributes(&raw.attributes);
                for key in decoded.dropped {
                    tracing::debug!(span_id = %raw.span_id, key = %key, "dropped attribute without a scalar value");
                    issues.push(SpanIssue::new(&raw.span_id, IssueKind::DroppedAttribute { key }));
                }
                pending.push(Pending {
                    raw,
                    service: service.clone(),
                    attributes: decoded.values,
                    start: to_millis(raw.start_time_unix_nano.as_ref()),
                    end: to_millis(raw.end_time_unix_nano.as_ref()),
                });
            }
        }
    }

    // Spans without a usable start are pinned here.
    let trace_start = pending
        .iter()
        .filter_map(|p| p.start)
        .reduce(f64::min)
        .unwrap_or(0.0);

    let mut spans = Vec::with_capacity(pending.len());
    let mut index = HashMap::with_capacity(pending.len());

    for p in pending {
        let span_id = &p.raw.span_id;
        let (start, end) = resolve_timing(span_id, p.start, p.end, trace_start, &mut issues);

        if !span_id.is_empty() {
            match index.entry(span_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(spans.len());
                }
                Entry::Occupied(_) => {
                    tracing::debug!(span_id = %span_id, "duplicate span id; keeping first occurrence");
                    issues.push(SpanIssue::new(span_id, IssueKind::DuplicateSpanId));
                }
            }
        }

        spans.push(ProcessedSpan {
            trace_id: p.raw.trace_id.clone(),
            span_id: span_id.clone(),
            parent_span_id: p.raw.parent_span_id.clone().filter(|id| !id.is_empty()),
            name: p.raw.name.clone(),
            operation_name: p.raw.name.clone(),
            start_time: start,
            end_time: end,
            duration: end - start,
            attributes: p.attributes,
            status: p.raw.status.as_ref().map(|s| SpanStatus {
                code: s.code,
                message: s.message.clone(),
            }),
            service_name: p.service,
            level: 0,
            children: Vec::new(),
        });
    }

    Normalized {
        spans,
        index,
        issues,
    }
}

fn to_millis(raw: Option<&Nanos>) -> Option<f64> {
    raw.and_then(Nanos::as_u64).map(nanos_to_millis)
}

/// A span with no usable start sits at the trace start with zero duration.
/// A missing or inverted end collapses the span to zero duration.
fn resolve_timing(
    span_id: &str,
    start: Option<f64>,
    end: Option<f64>,
    trace_start: f64,
    issues: &mut Vec<SpanIssue>,
) -> (f64, f64) {
    let Some(start) = start else {
        tracing::debug!(span_id = %span_id, "span has no usable start time");
        issues.push(SpanIssue::new(span_id, IssueKind::MissingStartTime));
        if end.is_none() {
            issues.push(SpanIssue::new(span_id, IssueKind::MissingEndTime));
        }
        return (trace_start, trace_start);
    };

    match end {
        Some(end) if end >= start => (start, end),
        Some(_) => {
            tracing::debug!(span_id = %span_id, "span ends before it starts");
            issues.push(SpanIssue::new(span_id, IssueKind::NegativeDuration));
            (start, start)
        }
        None => {
            tracing::debug!(span_id = %span_id, "span has no usable end time");
            issues.push(SpanIssue::new(span_id, IssueKind::MissingEndTime));
            (start, start)
        }
    }
}
