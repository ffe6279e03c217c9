//! Tracing subscriber setup for the `protoreview` binary.
//!
//! Controlled by `OTEL_EXPORTER_OTLP_ENDPOINT`:
//! - unset or empty → no subscriber; review events are dropped
//! - `"stderr"` → JSON events and closed spans on stderr
//! - `"http://..."` → OTLP HTTP export of traces and logs (`otel` feature)
//!
//! The filter comes from `RUST_LOG` and defaults to `info`. When `TRACEPARENT`
//! is set, the command's spans join that remote trace.

use tracing_subscriber::EnvFilter;

/// Flushes and shuts down exporters when dropped. Hold it in `main()`.
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    trace_provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
    #[cfg(feature = "otel")]
    log_provider: Option<opentelemetry_sdk::logs::SdkLoggerProvider>,
}

impl TelemetryGuard {
    const fn inert() -> Self {
        Self {
            #[cfg(feature = "otel")]
            trace_provider: None,
            #[cfg(feature = "otel")]
            log_provider: None,
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        {
            if let Some(provider) = self.trace_provider.take()
                && let Err(e) = provider.shutdown()
            {
                eprintln!("protoreview: trace exporter shutdown failed: {e}");
            }
            if let Some(provider) = self.log_provider.take()
                && let Err(e) = provider.shutdown()
            {
                eprintln!("protoreview: log exporter shutdown failed: {e}");
            }
        }
    }
}

/// Where telemetry goes, decided from the endpoint variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sink {
    /// No subscriber.
    Off,
    /// JSON on stderr.
    Stderr,
    /// OTLP over HTTP.
    Otlp,
}

impl Sink {
    /// Interpret an `OTEL_EXPORTER_OTLP_ENDPOINT` value.
    #[must_use]
    pub fn from_endpoint(endpoint: Option<&str>) -> Self {
        match endpoint.map(str::trim) {
            None | Some("") => Self::Off,
            Some("stderr") => Self::Stderr,
            Some(_) => Self::Otlp,
        }
    }
}

/// Install the global subscriber described by the environment.
#[must_use]
pub fn init() -> TelemetryGuard {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
    match Sink::from_endpoint(endpoint.as_deref()) {
        Sink::Off => TelemetryGuard::inert(),
        Sink::Stderr => init_stderr(),
        #[cfg(feature = "otel")]
        Sink::Otlp => init_otlp(),
        #[cfg(not(feature = "otel"))]
        Sink::Otlp => {
            eprintln!(
                "warning: OTEL_EXPORTER_OTLP_ENDPOINT is set but protoreview was built without the 'otel' feature"
            );
            TelemetryGuard::inert()
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_stderr() -> TelemetryGuard {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
        )
        .init();
    TelemetryGuard::inert()
}

/// OTLP HTTP export. The SDK reads the endpoint itself and appends
/// `/v1/traces` or `/v1/logs`.
#[cfg(feature = "otel")]
fn init_otlp() -> TelemetryGuard {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let span_exporter = match opentelemetry_otlp::SpanExporter::builder().with_http().build() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: OTLP span exporter unavailable: {e}");
            return TelemetryGuard::inert();
        }
    };
    let log_exporter = match opentelemetry_otlp::LogExporter::builder().with_http().build() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: OTLP log exporter unavailable: {e}");
            return TelemetryGuard::inert();
        }
    };

    let resource = resource();
    let trace_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_simple_exporter(span_exporter)
        .with_resource(resource.clone())
        .build();
    let log_provider = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_simple_exporter(log_exporter)
        .with_resource(resource)
        .build();

    let tracer = trace_provider.tracer("protoreview");
    join_remote_trace();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(
            &log_provider,
        ))
        .init();

    TelemetryGuard {
        trace_provider: Some(trace_provider),
        log_provider: Some(log_provider),
    }
}

/// Attach the `TRACEPARENT` context, if any, for the rest of the process.
#[cfg(feature = "otel")]
fn join_remote_trace() {
    use opentelemetry::propagation::TextMapPropagator as _;
    use opentelemetry_sdk::propagation::TraceContextPropagator;
    use std::collections::HashMap;

    let Ok(traceparent) = std::env::var("TRACEPARENT") else {
        return;
    };
    let carrier = HashMap::from([("traceparent".to_owned(), traceparent)]);
    let cx = TraceContextPropagator::new().extract(&carrier);
    // Leaked so the context stays current until exit.
    std::mem::forget(cx.attach());
}

#[cfg(feature = "otel")]
fn resource() -> opentelemetry_sdk::Resource {
    use opentelemetry::KeyValue;
    opentelemetry_sdk::Resource::builder()
        .with_attribute(KeyValue::new("service.name", "protoreview"))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}
