use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span, Status};
use serde_json::{Value as Json, json};
use spanview_core::model::otlp::TraceDocument;

const MS: u64 = 1_000_000;

pub fn document(value: Json) -> TraceDocument {
    serde_json::from_value(value).unwrap()
}

fn resource(service: &str) -> Json {
    json!({"attributes": [{"key": "service.name", "value": {"stringValue": service}}]})
}

fn span(trace_id: &str, id: &str, parent: Option<&str>, name: &str, start_ms: u64, end_ms: u64) -> Json {
    json!({
        "traceId": trace_id,
        "spanId": id,
        "parentSpanId": parent,
        "name": name,
        "startTimeUnixNano": (start_ms * MS).to_string(),
        "endTimeUnixNano": (end_ms * MS).to_string(),
    })
}

/// A `web` root span at 1000ms..2000ms and a failing `db` child at
/// 1200ms..1800ms, split across two batches.
pub fn two_service_trace_json(trace_id: &str) -> Json {
    let mut root = span(trace_id, "1", None, "GET /checkout", 1000, 2000);
    root["attributes"] = json!([
        {"key": "http.method", "value": {"stringValue": "GET"}},
        {"key": "http.status_code", "value": {"intValue": "500"}}
    ]);
    let mut child = span(trace_id, "2", Some("1"), "SELECT orders", 1200, 1800);
    child["attributes"] = json!([
        {"key": "db.system", "value": {"stringValue": "postgresql"}},
        {"key": "db.cached", "value": {"boolValue": false}}
    ]);
    child["status"] = json!({"code": 2, "message": "deadlock detected"});

    json!({
        "batches": [
            {"resource": resource("web"), "scopeSpans": [{"spans": [root]}]},
            {"resource": resource("db"), "scopeSpans": [{"spans": [child]}]}
        ]
    })
}

/// Four levels deep plus a second root, with descendants listed before their
/// ancestors and siblings out of start order.
pub fn shuffled_tree_json(trace_id: &str) -> Json {
    json!({
        "batches": [
            {
                "resource": resource("worker"),
                "scopeSpans": [
                    {"spans": [
                        span(trace_id, "d", Some("c"), "encode", 40, 45),
                        span(trace_id, "c2", Some("b"), "write", 60, 70),
                        span(trace_id, "c", Some("b"), "serialize", 30, 50),
                    ]},
                    {"spans": [
                        span(trace_id, "b", Some("a2"), "persist", 25, 80),
                        span(trace_id, "a2", Some("root"), "store", 20, 90),
                    ]}
                ]
            },
            {
                "resource": resource("api"),
                "scopeSpans": [{"spans": [
                    span(trace_id, "a1", Some("root"), "auth", 5, 15),
                    span(trace_id, "root", None, "POST /jobs", 0, 100),
                    span(trace_id, "late-root", None, "cron tick", 150, 160),
                ]}]
            }
        ]
    })
}

pub fn dangling_parent_json(trace_id: &str) -> Json {
    json!({
        "batches": [{
            "resource": resource("api"),
            "scopeSpans": [{"spans": [
                span(trace_id, "root", None, "GET /", 0, 10),
                span(trace_id, "orphan", Some("gone"), "late callback", 4, 6),
            ]}]
        }]
    })
}

/// `x` and `y` name each other as parent; `z` hangs off `y`.
pub fn cyclic_trace_json(trace_id: &str) -> Json {
    json!({
        "batches": [{
            "resource": resource("api"),
            "scopeSpans": [{"spans": [
                span(trace_id, "root", None, "GET /", 0, 10),
                span(trace_id, "x", Some("y"), "ping", 1, 2),
                span(trace_id, "y", Some("x"), "pong", 2, 3),
                span(trace_id, "z", Some("y"), "echo", 3, 4),
            ]}]
        }]
    })
}

fn string_kv(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.into(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.into())),
        }),
    }
}

fn resource_spans(service: &str, spans: Vec<Span>) -> ResourceSpans {
    ResourceSpans {
        resource: Some(Resource {
            attributes: vec![string_kv("service.name", service)],
            ..Default::default()
        }),
        scope_spans: vec![ScopeSpans {
            spans,
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Protobuf form of [`two_service_trace_json`].
pub fn two_service_export_request(trace_id: &[u8]) -> ExportTraceServiceRequest {
    let root = Span {
        trace_id: trace_id.to_vec(),
        span_id: vec![1; 8],
        name: "GET /checkout".into(),
        start_time_unix_nano: 1000 * MS,
        end_time_unix_nano: 2000 * MS,
        attributes: vec![string_kv("http.method", "GET")],
        ..Default::default()
    };
    let child = Span {
        trace_id: trace_id.to_vec(),
        span_id: vec![2; 8],
        parent_span_id: vec![1; 8],
        name: "SELECT orders".into(),
        start_time_unix_nano: 1200 * MS,
        end_time_unix_nano: 1800 * MS,
        status: Some(Status {
            message: "deadlock detected".into(),
            code: 2,
        }),
        ..Default::default()
    };

    ExportTraceServiceRequest {
        resource_spans: vec![
            resource_spans("web", vec![root]),
            resource_spans("db", vec![child]),
        ],
    }
}
