use std::io::IsTerminal;

use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::{self as sdktrace, SdkTracerProvider};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Owns the process-wide trace export pipeline. Dropping it without calling
/// [`TelemetryGuard::shutdown`] still shuts the provider down, but silently.
#[must_use]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Flushes pending spans and stops the exporter. Failures are logged and
    /// never abort the caller's exit path.
    pub fn shutdown(mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        if let Err(e) = provider.force_flush() {
            tracing::warn!(error = %e, "failed to flush pending spans");
        }
        match provider.shutdown() {
            Ok(()) => tracing::info!("tracing terminated"),
            Err(e) => tracing::warn!(error = %e, "error terminating tracing"),
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            let _ = provider.shutdown();
        }
    }
}

pub fn init_cli_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

pub fn init_run_tracing() -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .compact();

    let (otlp_layer, provider) = match build_otlp_layer() {
        Some((layer, provider)) => (Some(layer), Some(provider)),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otlp_layer)
        .try_init();

    TelemetryGuard { provider }
}

fn build_otlp_layer<S>() -> Option<(OpenTelemetryLayer<S, sdktrace::Tracer>, SdkTracerProvider)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let has_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();
    if !has_endpoint {
        return None;
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .ok()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();
    let tracer = provider.tracer("tracefall");

    Some((tracing_opentelemetry::layer().with_tracer(tracer), provider))
}
