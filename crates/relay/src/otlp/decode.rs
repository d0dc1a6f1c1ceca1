use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value as OtlpValue;
use opentelemetry_proto::tonic::common::v1::{AnyValue as OtlpAnyValue, KeyValue as OtlpKeyValue};
use opentelemetry_proto::tonic::trace::v1::Span as OtlpSpan;
use prost::Message;
use tracefall_core::error::{RelayError, Result};
use tracefall_core::model::payload::{
    AnyValue, ExportPayload, KeyValue, RawSpan, ResourceSpans, ScopeSpans,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Protobuf,
}

impl BodyFormat {
    /// OTLP/HTTP exporters default to JSON when no content type is sent.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("protobuf") => Self::Protobuf,
            _ => Self::Json,
        }
    }
}

pub fn decode_body(
    format: BodyFormat,
    content_encoding: Option<&str>,
    body: Bytes,
) -> Result<ExportPayload> {
    let body = match content_encoding.map(|e| e.trim().to_ascii_lowercase()) {
        Some(enc) if enc == "gzip" => gunzip(&body)?,
        _ => body,
    };

    if body.is_empty() {
        return Ok(ExportPayload::default());
    }

    match format {
        BodyFormat::Json => serde_json::from_slice(&body)
            .map_err(|e| RelayError::Decode(format!("invalid otlp json: {e}"))),
        BodyFormat::Protobuf => ExportTraceServiceRequest::decode(body)
            .map(|req| decode_request(&req))
            .map_err(|e| RelayError::Decode(format!("invalid otlp protobuf: {e}"))),
    }
}

pub fn decode_request(req: &ExportTraceServiceRequest) -> ExportPayload {
    ExportPayload {
        resource_spans: req
            .resource_spans
            .iter()
            .map(|rs| ResourceSpans {
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

pub fn decode_span(span: &OtlpSpan) -> RawSpan {
    RawSpan {
        trace_id: bytes_to_hex(&span.trace_id),
        span_id: bytes_to_hex(&span.span_id),
        name: span.name.clone(),
        start_time_unix_nano: span.start_time_unix_nano,
        end_time_unix_nano: span.end_time_unix_nano,
        attributes: span.attributes.iter().map(decode_kv).collect(),
    }
}

fn decode_kv(kv: &OtlpKeyValue) -> KeyValue {
    KeyValue {
        key: kv.key.clone(),
        value: kv.value.as_ref().map(decode_any_value),
    }
}

fn decode_any_value(value: &OtlpAnyValue) -> AnyValue {
    match &value.value {
        Some(OtlpValue::StringValue(s)) => AnyValue::String(s.clone()),
        Some(OtlpValue::IntValue(i)) => AnyValue::Int(*i),
        Some(OtlpValue::BoolValue(b)) => AnyValue::Bool(*b),
        Some(OtlpValue::DoubleValue(d)) => AnyValue::Double(*d),
        _ => AnyValue::Other,
    }
}

fn gunzip(body: &[u8]) -> Result<Bytes> {
    let mut out = Vec::new();
    GzDecoder::new(body)
        .read_to_end(&mut out)
        .map_err(|e| RelayError::Decode(format!("invalid gzip body: {e}")))?;
    Ok(Bytes::from(out))
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
