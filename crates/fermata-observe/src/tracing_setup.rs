//! Tracing subscriber setup for the `fermata` binary.
//!
//! One entry point covers both shapes the CLI needs: compact output for
//! one-shot commands, and a span-exporting subscriber for `serve --otel`.
//!
//! ```no_run
//! // One-shot CLI command, RUST_LOG wins when set.
//! fermata_observe::tracing_setup::init_tracing("warn", false).unwrap();
//!
//! // Server with the OpenTelemetry stdout exporter.
//! fermata_observe::tracing_setup::init_tracing("info", true).unwrap();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Held so buffered spans can be flushed on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber. `default_filter` applies only when
/// `RUST_LOG` is unset. With `enable_otel`, tracing spans are bridged to
/// OpenTelemetry through the stdout exporter (swap for OTLP in production)
/// and span close timings are logged.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(
    default_filter: &str,
    enable_otel: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let otel_layer = tracing_opentelemetry::layer().with_tracer(provider.tracer("fermata"));
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .with(otel_layer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()?;
    }
    Ok(())
}

/// Flush buffered spans and shut down the tracer provider. A no-op when
/// OTel was never enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get()
        && let Err(err) = provider.shutdown()
    {
        eprintln!("warning: otel tracer shutdown failed: {err}");
    }
}
