use std::path::Path;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue as OtlpAnyValue, KeyValue as OtlpKeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource as OtlpResource;
use opentelemetry_proto::tonic::trace::v1::Span as OtlpSpan;
use prost::Message;
use spanview_core::error::{Result, SpanviewError};
use spanview_core::model::otlp::{
    AnyValue, Batch, KeyValue, Nanos, RawSpan, RawStatus, Resource, ScopeSpans, TraceDocument,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Protobuf,
}

impl PayloadFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "proto" | "protobuf" | "pb" => Ok(Self::Protobuf),
            other => Err(SpanviewError::InvalidArgument(format!(
                "unknown payload format: {other} (expected json or proto)"
            ))),
        }
    }

    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase());
        match mime.as_deref() {
            Some("application/x-protobuf" | "application/protobuf") => Self::Protobuf,
            _ => Self::Json,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pb" | "bin" | "protobuf") => Self::Protobuf,
            _ => Self::Json,
        }
    }
}

pub fn decode_document(bytes: &[u8], format: PayloadFormat) -> Result<TraceDocument> {
    match format {
        PayloadFormat::Json => TraceDocument::from_json_slice(bytes),
        PayloadFormat::Protobuf => {
            let req = ExportTraceServiceRequest::decode(bytes)
                .map_err(|e| SpanviewError::Parse(format!("invalid OTLP protobuf trace: {e}")))?;
            Ok(document_from_export(req))
        }
    }
}

pub fn document_from_export(req: ExportTraceServiceRequest) -> TraceDocument {
    TraceDocument {
        batches: req
            .resource_spans
            .iter()
            .map(|rs| Batch {
                resource: rs.resource.as_ref().map(decode_resource),
                scope_spans: rs
                    .scope_spans
                    .iter()
                    .map(|ss| ScopeSpans {
                        spans: ss.spans.iter().map(decode_span).collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn decode_resource(resource: &OtlpResource) -> Resource {
    Resource {
        attributes: resource.attributes.iter().map(decode_key_value).collect(),
    }
}

fn decode_span(span: &OtlpSpan) -> RawSpan {
    RawSpan {
        trace_id: bytes_to_hex(&span.trace_id).unwrap_or_default(),
        span_id: bytes_to_hex(&span.span_id).unwrap_or_default(),
        parent_span_id: bytes_to_hex(&span.parent_span_id),
        name: span.name.clone(),
        start_time_unix_nano: nonzero_nanos(span.start_time_unix_nano),
        end_time_unix_nano: nonzero_nanos(span.end_time_unix_nano),
        attributes: span.attributes.iter().map(decode_key_value).collect(),
        status: span.status.as_ref().map(|s| RawStatus {
            code: s.code,
            message: Some(s.message.clone()).filter(|m| !m.is_empty()),
        }),
    }
}

fn decode_key_value(kv: &OtlpKeyValue) -> KeyValue {
    KeyValue {
        key: kv.key.clone(),
        value: decode_any_value(kv.value.as_ref()),
    }
}

/// Arrays and key/value lists have no scalar form; they come back empty and
/// the attribute decoder drops them.
fn decode_any_value(value: Option<&OtlpAnyValue>) -> Option<AnyValue> {
    let inner = value?.value.as_ref()?;
    Some(match inner {
        Value::StringValue(s) => AnyValue::string(s.clone()),
        Value::BoolValue(b) => AnyValue::bool(*b),
        Value::IntValue(i) => AnyValue::int(*i),
        Value::DoubleValue(d) => AnyValue::double(*d),
        Value::BytesValue(b) => AnyValue::string(String::from_utf8_lossy(b).to_string()),
        _ => AnyValue::default(),
    })
}

// Protobuf has no "unset" for fixed64; zero is how exporters spell missing.
fn nonzero_nanos(nanos: u64) -> Option<Nanos> {
    (nanos != 0).then_some(Nanos::Number(nanos))
}

fn bytes_to_hex(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
