//! OpenTelemetry integration for scriptorium.
//!
//! # Activation
//!
//! Export is compiled in with the `telemetry` feature and switched on at
//! runtime by the standard OTel environment variables:
//!
//! ```bash
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 scriptorium --transport http
//! ```
//!
//! Set `OTEL_SDK_DISABLED=true` to explicitly disable even when the endpoint is set.

#[cfg(feature = "telemetry")]
mod otel;

#[cfg(feature = "telemetry")]
pub use otel::{OtelGuard, otel_layer};

/// Errors while building the exporter pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to create exporter runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to build OTLP exporter: {0}")]
    Exporter(String),
}

/// Check whether OTel export should be enabled.
///
/// Returns `true` when the `telemetry` feature is compiled in and:
/// - `OTEL_SDK_DISABLED` is NOT set to `"true"`
/// - AND at least one of:
///   - `OTEL_EXPORTER_OTLP_ENDPOINT` is set
///   - `OTEL_TRACES_EXPORTER` is set (and not `"none"`)
pub fn otel_enabled() -> bool {
    cfg!(feature = "telemetry") && env_requests_export(|key| std::env::var(key).ok())
}

fn env_requests_export(var: impl Fn(&str) -> Option<String>) -> bool {
    // Explicit disable takes priority
    if var("OTEL_SDK_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return false;
    }

    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        return true;
    }

    if let Some(exporter) = var("OTEL_TRACES_EXPORTER") {
        return !exporter.eq_ignore_ascii_case("none");
    }

    false
}
