use std::fmt::Write as _;

use chrono::SecondsFormat;
use owo_colors::OwoColorize;
use spanview_core::model::waterfall::{IssueKind, SpanRow, Waterfall};
use spanview_core::time::millis_to_datetime;

const BAR_WIDTH: usize = 40;

pub fn print_waterfall_human(wf: &Waterfall, color: bool) {
    print!("{}", format_waterfall(wf, color));
}

pub fn format_waterfall(wf: &Waterfall, color: bool) -> String {
    let mut out = String::new();
    if wf.is_empty() {
        out.push_str("no spans found\n");
        return out;
    }

    let summary = &wf.summary;
    let started = millis_to_datetime(summary.start_time)
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
        out,
        "TRACE {} start={} duration={}ms spans={} errors={} services={}",
        summary.trace_id.as_deref().unwrap_or("-"),
        started,
        format_ms(summary.duration),
        summary.span_count,
        summary.error_count,
        summary.services.join(",")
    );

    for row in &wf.rows {
        let indent = "  ".repeat(row.level);
        let service = if color {
            row.service_name.cyan().to_string()
        } else {
            row.service_name.clone()
        };
        let _ = write!(
            out,
            "{indent}{service} {} ({}ms) +{}ms |{}|",
            row.name,
            format_ms(row.duration),
            format_ms(row.offset),
            timing_bar(row, summary.duration)
        );
        if row.is_error() {
            let label = if color {
                "ERROR".red().to_string()
            } else {
                "ERROR".to_string()
            };
            let _ = write!(out, " {label}");
            if let Some(message) = row.status.as_ref().and_then(|s| s.message.as_deref())
                && !message.is_empty()
            {
                let _ = write!(out, " {message}");
            }
        }
        out.push('\n');
    }

    if !wf.issues.is_empty() {
        let _ = writeln!(out, "-- {} issues --", wf.issues.len());
        for issue in &wf.issues {
            let _ = writeln!(out, "span={} {}", issue.span_id, issue_label(&issue.kind));
        }
    }
    out
}

fn timing_bar(row: &SpanRow, total: f64) -> String {
    let (start, len) = if total > 0.0 {
        let scale = BAR_WIDTH as f64 / total;
        let start = ((row.offset * scale).floor() as usize).min(BAR_WIDTH - 1);
        let len = ((row.duration * scale).round() as usize).clamp(1, BAR_WIDTH - start);
        (start, len)
    } else {
        (0, 1)
    };
    let mut bar = String::with_capacity(BAR_WIDTH);
    bar.push_str(&" ".repeat(start));
    bar.push_str(&"=".repeat(len));
    bar.push_str(&" ".repeat(BAR_WIDTH - start - len));
    bar
}

fn format_ms(ms: f64) -> String {
    if ms.fract() == 0.0 {
        return format!("{ms:.0}");
    }
    let fixed = format!("{ms:.3}");
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn issue_label(kind: &IssueKind) -> String {
    match kind {
        IssueKind::MissingStartTime => "missing start time".to_string(),
        IssueKind::MissingEndTime => "missing end time".to_string(),
        IssueKind::NegativeDuration => "end before start, clamped".to_string(),
        IssueKind::DuplicateSpanId => "duplicate span id, not linked as parent".to_string(),
        IssueKind::CycleBroken => "parent cycle, rendered as root".to_string(),
        IssueKind::DroppedAttribute { key } => format!("attribute {key} has no usable value"),
    }
}
