//! OTLP/HTTP JSON trace encoding, as served by the Tempo trace-by-id API and
//! by OTLP exporters. Ids are hex strings and nanosecond timestamps are
//! decimal strings.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpanviewError};
use crate::time::parse_unix_nanos;

/// OTLP `code` for a failed span.
pub const STATUS_CODE_ERROR: i32 = 2;

/// One trace-retrieval response: an ordered list of resource batches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceDocument {
    #[serde(default, alias = "resourceSpans")]
    pub batches: Vec<Batch>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope {
    Wrapped { trace: TraceDocument },
    Bare(TraceDocument),
}

impl TraceDocument {
    /// Parses a JSON body. Accepts the bare `{ "batches": [...] }` shape, the
    /// OTLP export `{ "resourceSpans": [...] }` shape, and the Tempo v2
    /// `{ "trace": { ... } }` envelope.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(bytes)
            .map_err(|e| SpanviewError::Parse(format!("invalid OTLP JSON trace: {e}")))?;
        Ok(match envelope {
            Envelope::Wrapped { trace } => trace,
            Envelope::Bare(doc) => doc,
        })
    }

    pub fn span_count(&self) -> usize {
        self.batches
            .iter()
            .flat_map(|b| &b.scope_spans)
            .map(|s| s.spans.len())
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(default)]
    pub resource: Option<Resource>,
    #[serde(default, alias = "instrumentationLibrarySpans")]
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSpans {
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSpan {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_time_unix_nano: Option<Nanos>,
    #[serde(default)]
    pub end_time_unix_nano: Option<Nanos>,
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
    #[serde(default)]
    pub status: Option<RawStatus>,
}

/// A nanosecond epoch timestamp. Decimal strings are the canonical encoding;
/// plain JSON numbers are tolerated, and anything else is kept so a single
/// bad value cannot fail the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Nanos {
    Number(u64),
    Text(String),
    Other(serde_json::Value),
}

impl Nanos {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Nanos::Number(n) => Some(*n),
            Nanos::Text(s) => parse_unix_nanos(s),
            Nanos::Other(_) => None,
        }
    }
}

impl From<u64> for Nanos {
    fn from(value: u64) -> Self {
        Nanos::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Option<AnyValue>,
}

/// OTLP `AnyValue`. At most one field is expected to be set, but presence
/// is what matters: `""`, `0` and `false` are real values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnyValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// int64 travels as a JSON string under protojson, but numbers show up too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
}

impl AnyValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn int(value: i64) -> Self {
        Self {
            int_value: Some(serde_json::Value::String(value.to_string())),
            ..Self::default()
        }
    }

    pub fn double(value: f64) -> Self {
        Self {
            double_value: serde_json::Number::from_f64(value).map(serde_json::Value::Number),
            ..Self::default()
        }
    }

    pub fn bool(value: bool) -> Self {
        Self {
            bool_value: Some(value),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatus {
    #[serde(default, deserialize_with = "deserialize_status_code")]
    pub code: i32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Status codes arrive either as integers or as protojson enum names.
fn deserialize_status_code<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or_default() as i32,
        Some(serde_json::Value::String(s)) => match s.as_str() {
            "STATUS_CODE_OK" => 1,
            "STATUS_CODE_ERROR" => STATUS_CODE_ERROR,
            other => other.parse().unwrap_or_default(),
        },
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tempo_v1_shape() {
        let doc = TraceDocument::from_json_slice(
            br#"{
                "batches": [{
                    "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "web"}}]},
                    "scopeSpans": [{"spans": [{
                        "traceId": "t1",
                        "spanId": "1",
                        "name": "GET /",
                        "startTimeUnixNano": "1000000000",
                        "endTimeUnixNano": "2000000000",
                        "status": {"code": "STATUS_CODE_ERROR", "message": "boom"}
                    }]}]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.span_count(), 1);
        let span = &doc.batches[0].scope_spans[0].spans[0];
        assert_eq!(span.start_time_unix_nano.as_ref().unwrap().as_u64(), Some(1_000_000_000));
        assert_eq!(span.status.as_ref().unwrap().code, STATUS_CODE_ERROR);
        assert!(span.parent_span_id.is_none());
    }

    #[test]
    fn accepts_resource_spans_and_v2_envelope() {
        let export = TraceDocument::from_json_slice(
            br#"{"resourceSpans": [{"instrumentationLibrarySpans": [{"spans": [{"spanId": "a"}]}]}]}"#,
        )
        .unwrap();
        assert_eq!(export.span_count(), 1);

        let v2 = TraceDocument::from_json_slice(
            br#"{"trace": {"resourceSpans": [{"scopeSpans": [{"spans": [{"spanId": "a"}, {"spanId": "b"}]}]}]}}"#,
        )
        .unwrap();
        assert_eq!(v2.span_count(), 2);
    }

    #[test]
    fn tolerates_odd_timestamps() {
        let doc = TraceDocument::from_json_slice(
            br#"{"batches": [{"scopeSpans": [{"spans": [
                {"spanId": "a", "startTimeUnixNano": 1500, "endTimeUnixNano": -3},
                {"spanId": "b", "startTimeUnixNano": "later"}
            ]}]}]}"#,
        )
        .unwrap();
        let spans = &doc.batches[0].scope_spans[0].spans;
        assert_eq!(spans[0].start_time_unix_nano.as_ref().unwrap().as_u64(), Some(1500));
        assert_eq!(spans[0].end_time_unix_nano.as_ref().unwrap().as_u64(), None);
        assert_eq!(spans[1].start_time_unix_nano.as_ref().unwrap().as_u64(), None);
        assert!(spans[1].end_time_unix_nano.is_none());
    }

    #[test]
    fn rejects_non_json() {
        assert!(TraceDocument::from_json_slice(b"not json").is_err());
    }

    #[test]
    fn status_code_accepts_numbers_and_names() {
        let numeric: RawStatus = serde_json::from_str(r#"{"code": 2}"#).unwrap();
        let named: RawStatus = serde_json::from_str(r#"{"code": "STATUS_CODE_OK"}"#).unwrap();
        let missing: RawStatus = serde_json::from_str(r#"{"message": "x"}"#).unwrap();
        assert_eq!(numeric.code, 2);
        assert_eq!(named.code, 1);
        assert_eq!(missing.code, 0);
    }
}
