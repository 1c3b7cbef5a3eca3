use std::collections::BTreeMap;

use spanview_core::model::otlp::{AnyValue, KeyValue, Resource};
use spanview_core::model::span::AttrValue;

const SERVICE_NAME_KEY: &str = "service.name";
const UNKNOWN_SERVICE: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAttributes {
    pub values: BTreeMap<String, AttrValue>,
    /// Keys whose value carried none of the supported scalar fields.
    pub dropped: Vec<String>,
}

/// Picks the first present field in the order string, int, double, bool.
pub fn decode_value(value: &AnyValue) -> Option<AttrValue> {
    if let Some(s) = &value.string_value {
        return Some(AttrValue::String(s.clone()));
    }
    if let Some(i) = value.int_value.as_ref().and_then(json_to_i64) {
        return Some(AttrValue::Int(i));
    }
    if let Some(d) = value.double_value.as_ref().and_then(json_to_f64) {
        return Some(AttrValue::Double(d));
    }
    value.bool_value.map(AttrValue::Bool)
}

pub fn decode_attributes(attrs: &[KeyValue]) -> DecodedAttributes {
    let mut out = DecodedAttributes::default();
    for kv in attrs {
        match kv.value.as_ref().and_then(decode_value) {
            Some(value) => {
                out.values.insert(kv.key.clone(), value);
            }
            None => out.dropped.push(kv.key.clone()),
        }
    }
    out
}

pub fn service_name(resource: Option<&Resource>) -> String {
    resource
        .map(|r| decode_attributes(&r.attributes))
        .and_then(|mut decoded| decoded.values.remove(SERVICE_NAME_KEY))
        .map(|v| v.to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_SERVICE.to_string())
}

fn json_to_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        // protojson spells the non-finite doubles as strings
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
