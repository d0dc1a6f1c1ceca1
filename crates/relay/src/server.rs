use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Method};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracefall_core::error::{RelayError, Result};
use tracing::Level;

use crate::hub::Hub;
use crate::otlp::grpc::GrpcIngest;
use crate::otlp::http;
use crate::push::{self, PushState, shutdown_requested};
use crate::relay::Relay;

pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub grpc_addr: Option<SocketAddr>,
    pub allowed_origin: String,
    pub keep_alive: Duration,
}

/// Builds the single HTTP surface: OTLP ingest plus the push endpoints.
pub fn app(
    relay: Relay,
    hub: Hub,
    cfg: &ServerConfig,
    shutdown: watch::Receiver<bool>,
) -> Router {
    let push_state = PushState {
        hub,
        keep_alive: cfg.keep_alive,
        shutdown,
    };

    http::router(relay)
        .merge(push::router(push_state))
        .layer(cors_layer(&cfg.allowed_origin))
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::DEBUG)),
        )
}

/// `*` opens the relay to any origin without credentials; anything else is
/// the one dashboard origin allowed to read the push feed with credentials.
pub fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let base = CorsLayer::new().allow_methods([Method::GET, Method::POST, Method::OPTIONS]);
    if allowed_origin.trim() == "*" {
        return base.allow_origin(Any).allow_headers(Any);
    }

    match HeaderValue::from_str(allowed_origin.trim()) {
        Ok(origin) => base
            .allow_origin(AllowOrigin::exact(origin))
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
        Err(e) => {
            tracing::warn!(
                error = %e,
                allowed_origin,
                "invalid allowed origin, cross-origin access disabled"
            );
            base
        }
    }
}

/// Binds every listener up front, so a taken port fails the call before
/// anything is served. Runs until `shutdown` flips to `true` or one server
/// stops on its own; either way the sibling server and open push streams are
/// then told to wind down before returning.
pub async fn run_relay_servers(
    relay: Relay,
    hub: Hub,
    cfg: ServerConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let http_listener = TcpListener::bind(cfg.http_addr)
        .await
        .map_err(|e| RelayError::Io(format!("failed to bind {}: {e}", cfg.http_addr)))?;
    let grpc_listener = match cfg.grpc_addr {
        Some(addr) => Some(
            TcpListener::bind(addr)
                .await
                .map_err(|e| RelayError::Io(format!("failed to bind {addr}: {e}")))?,
        ),
        None => None,
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let router = app(relay.clone(), hub, &cfg, stop_rx.clone());
    tracing::info!(addr = %cfg.http_addr, "relay http listening");

    let http_stop = stop_rx.clone();
    let mut http_task = Some(tokio::spawn(async move {
        axum::serve(http_listener, router)
            .with_graceful_shutdown(shutdown_requested(http_stop))
            .await
            .map_err(|e| RelayError::Ingest(format!("HTTP server failed: {e}")))
    }));

    let mut grpc_task = grpc_listener.map(|listener| {
        let grpc = GrpcIngest::new(relay);
        let grpc_stop = stop_rx.clone();
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "relay grpc listening");
        }
        tokio::spawn(async move {
            Server::builder()
                .add_service(grpc.traces_service())
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    shutdown_requested(grpc_stop),
                )
                .await
                .map_err(|e| RelayError::Ingest(format!("gRPC server failed: {e}")))
        })
    });

    let mut result = tokio::select! {
        _ = shutdown_requested(shutdown) => Ok(()),
        res = finish(&mut http_task) => res,
        res = finish(&mut grpc_task) => res,
    };
    if let Err(e) = &result {
        tracing::error!(error = %e, "relay server stopped, shutting down the rest");
    }
    let _ = stop_tx.send(true);

    for task in [&mut http_task, &mut grpc_task] {
        if task.is_some() {
            let res = finish(task).await;
            if result.is_ok() {
                result = res;
            }
        }
    }
    result
}

/// Awaits a server task and clears the slot. An empty slot never resolves.
async fn finish(task: &mut Option<JoinHandle<Result<()>>>) -> Result<()> {
    let Some(handle) = task.as_mut() else {
        return std::future::pending().await;
    };
    let res = handle
        .await
        .map_err(|e| RelayError::Ingest(format!("server task join failed: {e}")))
        .and_then(|inner| inner);
    *task = None;
    res
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;
    use tracefall_core::filter::ExcludeTerms;

    use super::*;
    use crate::publish::Publisher;

    fn cfg(origin: &str) -> ServerConfig {
        ServerConfig {
            http_addr: "127.0.0.1:0".parse().unwrap(),
            grpc_addr: None,
            allowed_origin: origin.to_string(),
            keep_alive: Duration::from_secs(60),
        }
    }

    fn test_app(origin: &str) -> (Router, watch::Sender<bool>) {
        let hub = Hub::new(4);
        let relay = Relay::new(
            ExcludeTerms::default(),
            Publisher::new(Arc::new(hub.clone())),
        );
        let (tx, rx) = watch::channel(false);
        (app(relay, hub, &cfg(origin), rx), tx)
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/events")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn allows_configured_origin_with_credentials() {
        let (app, _tx) = test_app("http://localhost:3000");
        let res = app.oneshot(preflight("http://localhost:3000")).await.unwrap();

        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            res.headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn other_origins_get_no_cors_grant() {
        let (app, _tx) = test_app("http://localhost:3000");
        let res = app.oneshot(preflight("http://evil.example.com")).await.unwrap();
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn wildcard_origin_allows_anyone() {
        let (app, _tx) = test_app("*");
        let res = app.oneshot(preflight("http://elsewhere.example.com")).await.unwrap();
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn ingest_and_push_share_one_router() {
        let (app, _tx) = test_app("*");
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/traces")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn taken_grpc_port_fails_startup() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let hub = Hub::new(4);
        let relay = Relay::new(
            ExcludeTerms::default(),
            Publisher::new(Arc::new(hub.clone())),
        );
        let (_tx, rx) = watch::channel(false);
        let cfg = ServerConfig {
            grpc_addr: Some(taken.local_addr().unwrap()),
            ..cfg("*")
        };

        let res = tokio::time::timeout(
            Duration::from_secs(3),
            run_relay_servers(relay, hub, cfg, rx),
        )
        .await
        .expect("startup did not fail fast");
        let err = res.unwrap_err();
        assert!(matches!(err, RelayError::Io(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn taken_http_port_fails_startup() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let hub = Hub::new(4);
        let relay = Relay::new(
            ExcludeTerms::default(),
            Publisher::new(Arc::new(hub.clone())),
        );
        let (_tx, rx) = watch::channel(false);
        let cfg = ServerConfig {
            http_addr: taken.local_addr().unwrap(),
            ..cfg("*")
        };

        let res = tokio::time::timeout(
            Duration::from_secs(3),
            run_relay_servers(relay, hub, cfg, rx),
        )
        .await
        .expect("startup did not fail fast");
        assert!(matches!(res, Err(RelayError::Io(_))));
    }

    #[tokio::test]
    async fn finished_server_error_is_surfaced_and_slot_cleared() {
        let mut task: Option<JoinHandle<Result<()>>> =
            Some(tokio::spawn(async { Err(RelayError::Ingest("boom".into())) }));
        assert!(finish(&mut task).await.is_err());
        assert!(task.is_none());

        let pending = tokio::time::timeout(Duration::from_millis(50), finish(&mut task)).await;
        assert!(pending.is_err(), "empty slot must never resolve");
    }

    #[tokio::test]
    async fn servers_stop_when_signalled() {
        let hub = Hub::new(4);
        let relay = Relay::new(
            ExcludeTerms::default(),
            Publisher::new(Arc::new(hub.clone())),
        );
        let (tx, rx) = watch::channel(false);
        let cfg = ServerConfig {
            grpc_addr: Some("127.0.0.1:0".parse().unwrap()),
            ..cfg("*")
        };
        let task = tokio::spawn(run_relay_servers(relay, hub, cfg, rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let res = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(res.is_ok());
    }
}
