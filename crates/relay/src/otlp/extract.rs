use tracefall_core::filter::ExcludeTerms;
use tracefall_core::model::payload::{ExportPayload, RawSpan};
use tracefall_core::model::span::SimplifiedSpan;

pub const ATTR_PACKAGE_SIZE: &str = "http.request_content_length_uncompressed";
pub const ATTR_STATUS_CODE: &str = "http.status_code";
pub const ATTR_URL: &str = "http.url";

/// Reduces the spans of the payload's first scope group to dashboard records.
///
/// Spans without a non-empty `http.url` attribute, or whose url contains one of
/// `exclude`, are skipped. Output keeps input order. A payload without a
/// resource or scope group yields nothing.
pub fn extract(payload: &ExportPayload, exclude: &ExcludeTerms) -> Vec<SimplifiedSpan> {
    let Some(spans) = payload
        .resource_spans
        .first()
        .and_then(|rs| rs.scope_spans.first())
        .map(|ss| ss.spans.as_slice())
    else {
        return Vec::new();
    };

    spans
        .iter()
        .map(simplify)
        .filter(|span| retained(span, exclude))
        .collect()
}

pub fn simplify(span: &RawSpan) -> SimplifiedSpan {
    let attrs = span.attribute_map();
    SimplifiedSpan {
        span_id: span.span_id.clone(),
        trace_id: span.trace_id.clone(),
        start_time: span.start_time_unix_nano,
        end_time: span.end_time_unix_nano,
        package_size: attrs.get_i64(ATTR_PACKAGE_SIZE),
        status_code: attrs.get_i64(ATTR_STATUS_CODE),
        end_point: attrs.get_str(ATTR_URL).map(str::to_string),
        request_type: span.name.clone(),
    }
}

fn retained(span: &SimplifiedSpan, exclude: &ExcludeTerms) -> bool {
    match span.end_point.as_deref() {
        Some(endpoint) if exclude.matches(endpoint) => {
            tracing::trace!(span_id = %span.span_id, endpoint, "span dropped: excluded endpoint");
            false
        }
        Some(endpoint) if !endpoint.is_empty() => true,
        _ => {
            tracing::trace!(span_id = %span.span_id, "span dropped: no endpoint");
            false
        }
    }
}
