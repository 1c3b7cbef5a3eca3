use std::collections::BTreeSet;

use spanview_core::model::otlp::TraceDocument;
use spanview_core::model::span::ProcessedSpan;
use spanview_core::model::waterfall::{SpanRow, TraceSummary, Waterfall};

use crate::flatten::flatten;
use crate::hierarchy::{SpanTree, build_tree};
use crate::normalize::normalize;

pub fn build_waterfall_tree(doc: &TraceDocument) -> SpanTree {
    build_tree(normalize(doc))
}

/// Shapes one trace response into waterfall rows. Pure: the result depends
/// only on `doc`, and malformed spans degrade into `issues` instead of
/// failing the trace.
pub fn build_waterfall(doc: &TraceDocument) -> Waterfall {
    let tree = build_waterfall_tree(doc);
    let flat = flatten(&tree.roots);
    let summary = summarize(&tree.roots, &flat);
    let rows = flat
        .iter()
        .map(|span| SpanRow::from_span(span, summary.start_time))
        .collect();

    if !tree.issues.is_empty() {
        tracing::debug!(
            spans = flat.len(),
            issues = tree.issues.len(),
            "trace contains malformed spans"
        );
    }

    Waterfall {
        summary,
        rows,
        issues: tree.issues,
    }
}

fn summarize(roots: &[ProcessedSpan], flat: &[&ProcessedSpan]) -> TraceSummary {
    if flat.is_empty() {
        return TraceSummary::default();
    }

    let start_time = flat
        .iter()
        .map(|s| s.start_time)
        .fold(f64::INFINITY, f64::min);
    let end_time = flat
        .iter()
        .map(|s| s.end_time)
        .fold(f64::NEG_INFINITY, f64::max);
    let services: BTreeSet<&str> = flat.iter().map(|s| s.service_name.as_str()).collect();

    TraceSummary {
        trace_id: flat
            .iter()
            .map(|s| s.trace_id.as_str())
            .find(|id| !id.is_empty())
            .map(str::to_string),
        start_time,
        end_time,
        duration: end_time - start_time,
        span_count: flat.len(),
        error_count: flat.iter().filter(|s| s.is_error()).count(),
        services: services.into_iter().map(str::to_string).collect(),
        root_name: roots.first().map(|r| r.name.clone()),
    }
}
