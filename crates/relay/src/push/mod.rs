//! Subscriber-facing endpoints. Every connection holds one [`Subscription`]
//! for its lifetime, so the hub's subscriber set is exactly the set of open
//! push connections.
//!
//! [`Subscription`]: crate::hub::Subscription

pub mod sse;
pub mod ws;

use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde::Serialize;
use tokio::sync::watch;

use crate::hub::{Broadcast, Hub};

/// SSE event name for published batches. Websocket clients get the bare
/// payload as a text frame on `/socket`.
pub const EVENT_NAME: &str = "message";

#[derive(Clone)]
pub struct PushState {
    pub hub: Hub,
    pub keep_alive: Duration,
    pub shutdown: watch::Receiver<bool>,
}

pub fn router(state: PushState) -> Router {
    Router::new()
        .route("/socket", get(ws::socket))
        .route("/events", get(sse::events))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    subscribers: usize,
}

async fn health(State(state): State<PushState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        subscribers: state.hub.subscriber_count(),
    })
}

/// Resolves once shutdown is signalled or the signalling side is dropped.
pub async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
