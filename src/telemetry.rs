//! OpenTelemetry telemetry integration.
//!
//! This module is only compiled when the `otel` feature is enabled. Spans from
//! the HTTP layer and the coordinator are exported over OTLP/HTTP.

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "constellation";

/// Global tracer provider for shutdown.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Initialize tracing with OpenTelemetry export.
///
/// Exports traces to the OTLP endpoint configured via `OTEL_EXPORTER_OTLP_ENDPOINT`
/// (defaults to `http://localhost:4318`). `LOG_FORMAT=json` switches console
/// output to JSON lines.
pub fn init_tracing() -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| super::DEFAULT_LOG_FILTER.into());
    let json = super::json_logs();

    let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(
            std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4318".to_string()),
        )
        .build()
        .map_err(|e| format!("Failed to create OTLP exporter: {e}"))?;

    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(SERVICE_NAME)
        .build();

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(otlp_exporter)
        .with_resource(resource)
        .build();

    let otel_layer = OpenTelemetryLayer::new(tracer_provider.tracer(SERVICE_NAME));

    // Store provider for shutdown
    let _ = TRACER_PROVIDER.set(tracer_provider.clone());
    opentelemetry::global::set_tracer_provider(tracer_provider);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(otel_layer)
        .try_init()
        .map_err(|e| format!("Failed to install tracing subscriber: {e}"))
}

/// Shutdown OpenTelemetry and flush remaining spans.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get()
        && let Err(e) = provider.shutdown()
    {
        tracing::error!("Error shutting down tracer provider: {e:?}");
    }
}
