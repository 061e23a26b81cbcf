//! # Telemetry
//!
//! Console logging through `tracing_subscriber::fmt` is always on and filtered
//! with `RUST_LOG` (default `info`). OpenTelemetry export is opt-in.
//!
//! ## Feature matrix
//!
//! - `otel`: exports spans through OpenTelemetry.
//! - `metrics`: exports counters and histograms through OpenTelemetry.
//! - `honeycomb`: enables the Honeycomb OTLP exporter.
//! - `stdout`: enables the stdout exporter.
//!
//! Exporters require at least one of `otel` or `metrics`. `honeycomb` reads
//! `HONEYCOMB_ENDPOINT`, `HONEYCOMB_API_KEY`, `HONEYCOMB_DATASET` and
//! `HONEYCOMB_COMPRESSION` from the environment.
//!
//! ```bash
//! cargo run --bin logauge-controller --features otel,metrics,stdout
//! ```
//!
//! The metric helpers at the bottom of this module compile to no-ops without
//! `metrics`, so call sites never need a `cfg`.

#[cfg(all(feature = "honeycomb", not(any(feature = "otel", feature = "metrics"))))]
compile_error!("The 'honeycomb' feature requires at least one of 'otel' or 'metrics' to be enabled.");

#[cfg(all(feature = "stdout", not(any(feature = "otel", feature = "metrics"))))]
compile_error!("The 'stdout' feature requires at least one of 'otel' or 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(all(feature = "honeycomb", any(feature = "metrics", feature = "otel")))]
use opentelemetry_otlp::{Compression, Protocol, WithExportConfig, WithTonicConfig};
#[cfg(all(feature = "honeycomb", feature = "metrics"))]
use opentelemetry_sdk::metrics::Temporality;
#[cfg(feature = "honeycomb")]
use tonic::metadata::MetadataMap;
#[cfg(all(feature = "honeycomb", any(feature = "metrics", feature = "otel")))]
use tonic::transport::ClientTlsConfig;

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "otel")]
use opentelemetry_sdk::trace as sdktrace;

pub struct TelemetryProviders {
    #[cfg(feature = "otel")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down the exporters. Failures go to stderr since the
    /// subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "otel")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Installs the global subscriber. `service` names the process in exported
/// telemetry, e.g. `logauge-controller`.
pub fn init_telemetry(service: &'static str) -> anyhow::Result<TelemetryProviders> {
    #[cfg(not(any(feature = "metrics", feature = "otel")))]
    let _ = service;

    #[cfg(feature = "otel")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "otel")]
    let tracer_provider = init_tracer(service)?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics(service)?;

    #[cfg(any(feature = "metrics", feature = "otel"))]
    let scope = InstrumentationScope::builder(service)
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "otel")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "otel")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "honeycomb")]
fn honeycomb_metadata() -> anyhow::Result<MetadataMap> {
    use anyhow::Context;

    let mut map = MetadataMap::new();
    let api_key = std::env::var("HONEYCOMB_API_KEY").context("missing `HONEYCOMB_API_KEY`")?;
    let dataset = std::env::var("HONEYCOMB_DATASET").context("missing `HONEYCOMB_DATASET`")?;
    map.insert(
        "x-honeycomb-team",
        api_key.parse().context("invalid API key")?,
    );
    map.insert(
        "x-honeycomb-dataset",
        dataset.parse().context("invalid dataset")?,
    );
    Ok(map)
}

#[cfg(feature = "honeycomb")]
fn honeycomb_endpoint() -> anyhow::Result<(String, Compression)> {
    use anyhow::Context;
    use std::str::FromStr;

    let endpoint = std::env::var("HONEYCOMB_ENDPOINT").context("missing `HONEYCOMB_ENDPOINT`")?;
    let raw = std::env::var("HONEYCOMB_COMPRESSION")
        .context("missing `HONEYCOMB_COMPRESSION`")?
        .to_ascii_lowercase();
    Ok((endpoint, Compression::from_str(&raw)?))
}

#[cfg(any(feature = "metrics", feature = "otel"))]
fn resource(service: &'static str) -> Resource {
    Resource::builder()
        .with_service_name(service)
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics(service: &'static str) -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource(service));

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let (endpoint, compression) = honeycomb_endpoint()?;
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_tls_config(ClientTlsConfig::new().with_native_roots())
            .with_metadata(honeycomb_metadata()?)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(compression)
            .with_endpoint(endpoint)
            .with_protocol(Protocol::Grpc)
            .with_temporality(Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;

        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "otel")]
fn init_tracer(service: &'static str) -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource(service));

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        let exporter = SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let (endpoint, compression) = honeycomb_endpoint()?;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_tls_config(ClientTlsConfig::new().with_native_roots())
            .with_metadata(honeycomb_metadata()?)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_compression(compression)
            .with_endpoint(endpoint)
            .with_protocol(Protocol::Grpc)
            .build()
            .context("failed to build tracer exporter")?;

        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();

        builder.with_span_processor(batch)
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
static WORKERS_REGISTERED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static REGISTRATIONS_REJECTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PHASES_COMPLETED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PHASE_FAILURES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PHASE_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static EVENTS_GENERATED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static BYTES_GENERATED: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = WORKERS_REGISTERED.set(
        meter
            .u64_counter("workers_registered")
            .with_description("Workers accepted into the registry")
            .build(),
    );

    let _ = REGISTRATIONS_REJECTED.set(
        meter
            .u64_counter("registrations_rejected")
            .with_description("Registrations ignored (empty endpoint, full registry)")
            .build(),
    );

    let _ = PHASES_COMPLETED.set(
        meter
            .u64_counter("phases_completed")
            .with_description("Broadcast phases every worker completed")
            .build(),
    );

    let _ = PHASE_FAILURES.set(
        meter
            .u64_counter("phase_failures")
            .with_description("Failed worker outcomes")
            .build(),
    );

    let _ = PHASE_DURATION_MS.set(
        meter
            .f64_histogram("phase_duration")
            .with_unit("ms")
            .with_description("Broadcast-to-gather duration of a phase")
            .build(),
    );

    let _ = EVENTS_GENERATED.set(
        meter
            .u64_counter("events_generated")
            .with_description("Lines written by gendata")
            .build(),
    );

    let _ = BYTES_GENERATED.set(
        meter
            .u64_counter("bytes_generated")
            .with_unit("By")
            .with_description("Bytes written by gendata")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_workers_registered() {
    if let Some(counter) = WORKERS_REGISTERED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_workers_registered() {}

#[cfg(feature = "metrics")]
pub fn increment_registrations_rejected() {
    if let Some(counter) = REGISTRATIONS_REJECTED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_registrations_rejected() {}

#[cfg(feature = "metrics")]
pub fn increment_phases_completed(phase: &'static str) {
    if let Some(counter) = PHASES_COMPLETED.get() {
        counter.add(1, &[KeyValue::new("phase", phase)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_phases_completed(_phase: &'static str) {}

#[cfg(feature = "metrics")]
pub fn increment_phase_failures(phase: &'static str, count: u64) {
    if let Some(counter) = PHASE_FAILURES.get() {
        counter.add(count, &[KeyValue::new("phase", phase)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_phase_failures(_phase: &'static str, _count: u64) {}

#[cfg(feature = "metrics")]
pub fn record_phase_duration(phase: &'static str, duration_ms: f64) {
    if let Some(histogram) = PHASE_DURATION_MS.get() {
        histogram.record(duration_ms, &[KeyValue::new("phase", phase)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_phase_duration(_phase: &'static str, _duration_ms: f64) {}

#[cfg(feature = "metrics")]
pub fn record_generation(events: u64, bytes: u64) {
    if let Some(counter) = EVENTS_GENERATED.get() {
        counter.add(events, &[]);
    }
    if let Some(counter) = BYTES_GENERATED.get() {
        counter.add(bytes, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_generation(_events: u64, _bytes: u64) {}
