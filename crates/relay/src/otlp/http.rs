use axum::extract::State;
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Router, body::Bytes};

use crate::otlp::decode::{BodyFormat, decode_body};
use crate::relay::Relay;

#[derive(Clone)]
pub struct HttpIngestState {
    pub relay: Relay,
}

pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/", post(export_traces))
        .route("/v1/traces", post(export_traces))
        .with_state(HttpIngestState { relay })
}

/// Always acknowledges with `200` and an empty body; payload problems only
/// mean nothing gets published.
async fn export_traces(
    State(state): State<HttpIngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let format = BodyFormat::from_content_type(header_str(&headers, CONTENT_TYPE));
    let payload = match decode_body(format, header_str(&headers, CONTENT_ENCODING), body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, ?format, "otlp http traces decode failed");
            return StatusCode::OK;
        }
    };

    let outcome = state.relay.submit(&payload);
    tracing::debug!(
        retained = outcome.retained,
        delivered = outcome.delivered,
        "otlp http traces accepted"
    );
    StatusCode::OK
}

fn header_str(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
