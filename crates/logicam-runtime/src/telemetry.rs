//! Log and span output for logicam hosts.
//!
//! [`init_tracing`] installs one global subscriber made of three layers:
//!
//! * an [`EnvFilter`] read from `RUST_LOG` (default `info`),
//! * a stderr formatter, compact or JSON (`LOGICAM_LOG_FORMAT=json`),
//! * an OTLP/HTTP span exporter, only when `OTEL_EXPORTER_OTLP_ENDPOINT`
//!   names a collector such as `http://localhost:4318`.
//!
//! Stdout stays free for report lines.
//!
//! ```rust,no_run
//! let _guard = logicam_runtime::telemetry::init_tracing("logicam");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FORMAT_VAR: &str = "LOGICAM_LOG_FORMAT";
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Console log encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// `json` selects [`LogFormat::Json`]; anything else is compact.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(FORMAT_VAR).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global subscriber.  Keep the returned guard alive until the
/// process exits; dropping it flushes exported spans.
///
/// A second call leaves the first subscriber in place.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer().with_writer(std::io::stderr);
    let console = match LogFormat::from_env() {
        LogFormat::Json => console.json().boxed(),
        LogFormat::Compact => console.compact().boxed(),
    };

    let provider = std::env::var(OTLP_ENDPOINT_VAR)
        .ok()
        .and_then(|endpoint| otlp_provider(service_name, endpoint));
    let spans = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("logicam")));

    if let Err(e) = tracing_subscriber::registry()
        .with(console)
        .with(spans)
        .with(filter)
        .try_init()
    {
        eprintln!("[logicam] tracing already initialised: {e}");
    }

    TracerProviderGuard(provider)
}

/// Shuts the span exporter down on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// Whether spans are being exported.
    pub fn exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("[logicam] OpenTelemetry provider shutdown error: {e}");
        }
    }
}

/// `None` when the exporter cannot be built; the error goes to stderr and
/// logging continues without spans.
fn otlp_provider(service_name: &str, endpoint: String) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[logicam] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Ticks run synchronously; there is no async runtime for a batch exporter.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}
