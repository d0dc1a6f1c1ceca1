//! OTLP/JSON trace export shape, as sent by the OpenTelemetry HTTP exporters.
//!
//! Every level defaults when missing so that partial payloads still decode;
//! integer fields accept both JSON numbers and decimal strings since exporters
//! disagree on how to encode 64-bit values.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportPayload {
    pub resource_spans: Vec<ResourceSpans>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSpans {
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeSpans {
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSpan {
    pub trace_id: String,
    pub span_id: String,
    pub name: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub start_time_unix_nano: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub end_time_unix_nano: u64,
    pub attributes: Vec<KeyValue>,
}

impl RawSpan {
    /// Indexes attributes by key. The first occurrence of a repeated key wins,
    /// even when it carries no value.
    pub fn attribute_map(&self) -> AttributeMap<'_> {
        let mut map = HashMap::with_capacity(self.attributes.len());
        for kv in &self.attributes {
            map.entry(kv.key.as_str()).or_insert(kv.value.as_ref());
        }
        AttributeMap(map)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<AnyValue>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: AnyValue) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireAnyValue", into = "WireAnyValue")]
pub enum AnyValue {
    String(String),
    Int(i64),
    Bool(bool),
    Double(f64),
    /// Bytes, arrays, key/value lists and empty values. None of them feed a
    /// relayed field.
    Other,
}

impl AnyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

pub struct AttributeMap<'a>(HashMap<&'a str, Option<&'a AnyValue>>);

impl<'a> AttributeMap<'a> {
    pub fn get(&self, key: &str) -> Option<&'a AnyValue> {
        self.0.get(key).copied().flatten()
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(AnyValue::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(AnyValue::as_i64)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireAnyValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(
        deserialize_with = "lenient_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    int_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bool_value: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    double_value: Option<f64>,
}

impl From<WireAnyValue> for AnyValue {
    fn from(wire: WireAnyValue) -> Self {
        if let Some(s) = wire.string_value {
            Self::String(s)
        } else if let Some(i) = wire.int_value {
            Self::Int(i)
        } else if let Some(b) = wire.bool_value {
            Self::Bool(b)
        } else if let Some(d) = wire.double_value {
            Self::Double(d)
        } else {
            Self::Other
        }
    }
}

impl From<AnyValue> for WireAnyValue {
    fn from(value: AnyValue) -> Self {
        let mut wire = Self::default();
        match value {
            AnyValue::String(s) => wire.string_value = Some(s),
            AnyValue::Int(i) => wire.int_value = Some(i),
            AnyValue::Bool(b) => wire.bool_value = Some(b),
            AnyValue::Double(d) => wire.double_value = Some(d),
            AnyValue::Other => {}
        }
        wire
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_u64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
