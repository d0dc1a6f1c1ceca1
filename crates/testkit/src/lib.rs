use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{
    AnyValue as OtlpAnyValue, InstrumentationScope, KeyValue as OtlpKeyValue,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::{
    ResourceSpans as OtlpResourceSpans, ScopeSpans as OtlpScopeSpans, Span as OtlpSpan,
};
use prost::Message;
use tracefall_core::model::payload::{
    AnyValue, ExportPayload, KeyValue, RawSpan, ResourceSpans, ScopeSpans,
};

pub const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";

pub fn raw_span(span_id: &str, name: &str) -> RawSpan {
    RawSpan {
        trace_id: TRACE_ID.to_string(),
        span_id: span_id.to_string(),
        name: name.to_string(),
        start_time_unix_nano: 0,
        end_time_unix_nano: 1_000_000,
        attributes: vec![],
    }
}

pub fn http_span(span_id: &str, url: &str, status: Option<i64>, name: &str) -> RawSpan {
    let mut span = raw_span(span_id, name);
    span.attributes
        .push(KeyValue::new("http.url", AnyValue::String(url.to_string())));
    if let Some(code) = status {
        span.attributes
            .push(KeyValue::new("http.status_code", AnyValue::Int(code)));
    }
    span
}

pub fn payload_of(spans: Vec<RawSpan>) -> ExportPayload {
    ExportPayload {
        resource_spans: vec![ResourceSpans {
            scope_spans: vec![ScopeSpans { spans }],
        }],
    }
}

pub fn payload_json(spans: Vec<RawSpan>) -> Vec<u8> {
    serde_json::to_vec(&payload_of(spans)).unwrap()
}

/// One external GET and one dev-server request, the way a Next.js app
/// instrumented with the Node HTTP exporter reports them.
pub fn waterfall_payload() -> ExportPayload {
    let mut external = http_span(
        "00f067aa0ba902b7",
        "https://api.example.com/test0",
        Some(200),
        "GET",
    );
    external.end_time_unix_nano = 5_000_000_000;
    let mut local = http_span(
        "00f067aa0ba902b8",
        "http://localhost:3000/_next",
        Some(200),
        "GET",
    );
    local.start_time_unix_nano = 1_000_000_000;
    local.end_time_unix_nano = 2_000_000_000;
    payload_of(vec![external, local])
}

pub fn otlp_http_span(span_id: [u8; 8], url: &str, status: i64, name: &str) -> OtlpSpan {
    OtlpSpan {
        trace_id: vec![0x4b; 16],
        span_id: span_id.to_vec(),
        name: name.to_string(),
        start_time_unix_nano: 1_700_000_000_000_000_000,
        end_time_unix_nano: 1_700_000_000_250_000_000,
        attributes: vec![
            otlp_kv("http.url", Value::StringValue(url.to_string())),
            otlp_kv("http.status_code", Value::IntValue(status)),
        ],
        ..Default::default()
    }
}

pub fn otlp_request(spans: Vec<OtlpSpan>) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![OtlpResourceSpans {
            resource: Some(Resource {
                attributes: vec![otlp_kv(
                    "service.name",
                    Value::StringValue("web".to_string()),
                )],
                dropped_attributes_count: 0,
                entity_refs: vec![],
            }),
            scope_spans: vec![OtlpScopeSpans {
                scope: Some(InstrumentationScope {
                    name: "@opentelemetry/instrumentation-http".into(),
                    version: "0.41".into(),
                    attributes: vec![],
                    dropped_attributes_count: 0,
                }),
                spans,
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }],
    }
}

pub fn otlp_request_bytes(spans: Vec<OtlpSpan>) -> Vec<u8> {
    otlp_request(spans).encode_to_vec()
}

fn otlp_kv(key: &str, value: Value) -> OtlpKeyValue {
    OtlpKeyValue {
        key: key.to_string(),
        value: Some(OtlpAnyValue { value: Some(value) }),
    }
}
