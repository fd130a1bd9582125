//! OpenTelemetry integration for coop-cms
//!
//! This module provides observability through OpenTelemetry, including
//! tracing and metrics export to OTLP endpoints.

use crate::config::{LoggingConfig, OtelConfig};
use opentelemetry::{
    global,
    metrics::{Counter, Meter, MeterProvider as _},
    trace::TracerProvider as TracerProviderTrait,
    KeyValue,
};
use opentelemetry_sdk::{
    metrics::MeterProvider as SdkMeterProvider, trace::TracerProvider, Resource,
};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// OpenTelemetry provider for coop-cms
///
/// Manages tracing and metrics providers with OTLP export capability.
pub struct OtelProvider {
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
    config: OtelConfig,
}

impl OtelProvider {
    /// Create a new OtelProvider with the given configuration
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let (tracer_provider, meter_provider) = if config.enabled {
            let endpoint = config.endpoint.as_ref().ok_or_else(|| {
                OtelError::Config("OTLP endpoint is required when enabled".into())
            })?;

            let tracer_provider = Self::init_tracer_provider(endpoint, &resource)?;
            let meter_provider = Self::init_meter_provider(endpoint, &resource)?;

            (Some(tracer_provider), meter_provider)
        } else {
            // Use no-op meter provider when disabled
            let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
            (None, meter_provider)
        };

        if let Some(ref tp) = tracer_provider {
            global::set_tracer_provider(tp.clone());
        }

        Ok(Self {
            tracer_provider,
            meter_provider,
            config: config.clone(),
        })
    }

    /// Initialize the tracer provider with OTLP exporter
    fn init_tracer_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<TracerProvider, OtelError> {
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::runtime;
        use opentelemetry_sdk::trace::{Config, Sampler};

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_span_exporter()
            .map_err(|e| OtelError::TracerInit(e.to_string()))?;

        let trace_config = Config::default()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(resource.clone());

        let tracer_provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(trace_config)
            .build();

        Ok(tracer_provider)
    }

    /// Initialize the meter provider with OTLP exporter
    fn init_meter_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, OtelError> {
        use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
        use opentelemetry_sdk::metrics::reader::{
            DefaultAggregationSelector, DefaultTemporalitySelector,
        };
        use opentelemetry_sdk::{metrics::PeriodicReader, runtime};

        let exporter = MetricsExporterBuilder::from(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .build_metrics_exporter(
            Box::new(DefaultTemporalitySelector::new()),
            Box::new(DefaultAggregationSelector::new()),
        )
        .map_err(|e| OtelError::MeterInit(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio).build();

        let meter_provider = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(reader)
            .build();

        Ok(meter_provider)
    }

    /// Get a tracer from the provider
    pub fn tracer(&self, name: &'static str) -> opentelemetry_sdk::trace::Tracer {
        if let Some(ref tp) = self.tracer_provider {
            tp.tracer(name)
        } else {
            TracerProvider::builder().build().tracer(name)
        }
    }

    /// Get the meter for creating metrics
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.config.service_name.clone())
    }

    /// Check if OpenTelemetry is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Shutdown the OpenTelemetry providers gracefully
    pub fn shutdown(&self) -> Result<(), OtelError> {
        if let Err(e) = self.meter_provider.shutdown() {
            return Err(OtelError::Shutdown(format!(
                "Meter shutdown failed: {:?}",
                e
            )));
        }

        // Force flush any remaining spans
        if let Some(ref tp) = self.tracer_provider {
            for result in tp.force_flush() {
                if let Err(e) = result {
                    return Err(OtelError::Shutdown(format!("Tracer flush failed: {:?}", e)));
                }
            }
        }

        Ok(())
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Outcome label attached to login attempt counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcomeLabel {
    Success,
    MissingCredentials,
    InvalidCredentials,
    Locked,
    Error,
}

impl LoginOutcomeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginOutcomeLabel::Success => "success",
            LoginOutcomeLabel::MissingCredentials => "missing_credentials",
            LoginOutcomeLabel::InvalidCredentials => "invalid_credentials",
            LoginOutcomeLabel::Locked => "locked",
            LoginOutcomeLabel::Error => "error",
        }
    }
}

/// Authentication metrics
#[derive(Clone)]
pub struct AuthMetrics {
    /// Login attempts by outcome
    pub login_attempts_total: Counter<u64>,

    /// Accounts locked after repeated failures
    pub lockouts_total: Counter<u64>,

    /// Requests refused by the gatekeepers
    pub gatekeeper_rejections_total: Counter<u64>,
}

impl AuthMetrics {
    /// Create new metrics with the given meter
    pub fn new(meter: &Meter) -> Self {
        let login_attempts_total = meter
            .u64_counter("coop_cms_login_attempts_total")
            .with_description("Total number of login attempts by outcome")
            .init();

        let lockouts_total = meter
            .u64_counter("coop_cms_lockouts_total")
            .with_description("Total number of accounts locked after failed logins")
            .init();

        let gatekeeper_rejections_total = meter
            .u64_counter("coop_cms_gatekeeper_rejections_total")
            .with_description("Total number of requests refused by the gatekeepers")
            .init();

        Self {
            login_attempts_total,
            lockouts_total,
            gatekeeper_rejections_total,
        }
    }

    /// Record a login attempt
    pub fn record_login(&self, outcome: LoginOutcomeLabel) {
        self.login_attempts_total
            .add(1, &[KeyValue::new("outcome", outcome.as_str())]);
    }

    /// Record an account lockout
    pub fn record_lockout(&self) {
        self.lockouts_total.add(1, &[]);
    }

    /// Record a gatekeeper rejection for the "ui" or "api" tree
    pub fn record_rejection(&self, tree: &'static str) {
        self.gatekeeper_rejections_total
            .add(1, &[KeyValue::new("tree", tree)]);
    }
}

/// Initialize tracing subscriber with OpenTelemetry integration
pub fn init_tracing(otel: &OtelProvider, logging: &LoggingConfig) -> Result<(), OtelError> {
    let level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = tracing_subscriber::filter::LevelFilter::from_level(level);
    let json = !logging.format.eq_ignore_ascii_case("pretty");

    let otel_layer = otel
        .is_enabled()
        .then(|| tracing_opentelemetry::layer().with_tracer(otel.tracer("coop-cms")));
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());
    let pretty_layer = (!json).then(|| tracing_subscriber::fmt::layer().pretty());

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))?;

    Ok(())
}
