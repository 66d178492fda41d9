//! OTel internals: tracing layer and sampling.

use opentelemetry::trace::{
    Link, SamplingDecision, SamplingResult, SpanKind, TraceContextExt, TraceId, TraceState,
    TracerProvider as _,
};
use opentelemetry::{Context, KeyValue, global};
use opentelemetry_otlp::SpanExporter;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider, ShouldSample, SpanLimits};
use tracing_opentelemetry::OpenTelemetryLayer;

use crate::TelemetryError;

/// Guard that shuts down the OTel tracer provider on drop, flushing pending spans.
/// Also keeps the Tokio runtime alive when one was created for tonic channel
/// setup, since the process main thread does not run inside a runtime.
pub struct OtelGuard {
    provider: SdkTracerProvider,
    // Order matters: enter guard must drop before runtime
    _runtime_enter: Option<tokio::runtime::EnterGuard<'static>>,
    _runtime: Option<&'static tokio::runtime::Runtime>,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!("OTel shutdown error: {e}");
        }
    }
}

/// Build an OpenTelemetry tracing layer and guard.
///
/// The layer plugs into `tracing_subscriber::registry()`. The guard must be
/// held alive for the lifetime of the process to ensure spans are flushed.
pub fn otel_layer<S>(
    service_name: &str,
) -> Result<(OpenTelemetryLayer<S, opentelemetry_sdk::trace::SdkTracer>, OtelGuard), TelemetryError>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    let build = || {
        SpanExporter::builder()
            .with_tonic()
            .build()
            .map_err(|e| TelemetryError::Exporter(e.to_string()))
    };

    let (exporter, runtime_ref, enter_guard) = match tokio::runtime::Handle::try_current() {
        Ok(_handle) => (build()?, None, None),
        Err(_) => {
            let rt: &'static tokio::runtime::Runtime =
                Box::leak(Box::new(tokio::runtime::Runtime::new()?));
            let guard = rt.enter();
            let exporter = rt.block_on(async { build() })?;
            (exporter, Some(rt), Some(guard))
        }
    };

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(ScriptoriumSampler)
        .with_resource(resource)
        .with_span_limits(SpanLimits::default())
        .build();

    global::set_tracer_provider(provider.clone());

    let tracer = provider.tracer("scriptorium");
    let layer = tracing_opentelemetry::layer().with_tracer(tracer);

    Ok((layer, OtelGuard { provider, _runtime_enter: enter_guard, _runtime: runtime_ref }))
}

// ============================================================================
// ScriptoriumSampler: differentiated sampling by span category
// ============================================================================

/// Custom sampler with differentiated rates by span name prefix.
///
/// | Prefix       | Rate | Rationale                                 |
/// |--------------|------|-------------------------------------------|
/// | `tool.*`     | 100% | Remote tool calls, the unit of work       |
/// | `auth.*`     | 100% | Bearer checks, rejections are audited     |
/// | errors       | 100% | Always capture failures                   |
/// | other        | 10%  | Default for unclassified spans            |
#[derive(Debug, Clone)]
struct ScriptoriumSampler;

impl ShouldSample for ScriptoriumSampler {
    fn should_sample(
        &self,
        parent_context: Option<&Context>,
        trace_id: TraceId,
        name: &str,
        span_kind: &SpanKind,
        attributes: &[KeyValue],
        links: &[Link],
    ) -> SamplingResult {
        // If parent is sampled, always sample (maintain trace continuity)
        if let Some(cx) = parent_context {
            let parent_span = cx.span();
            let parent_ctx = parent_span.span_context();
            if parent_ctx.is_sampled() {
                return SamplingResult {
                    decision: SamplingDecision::RecordAndSample,
                    attributes: vec![],
                    trace_state: parent_ctx.trace_state().clone(),
                };
            }
        }

        let is_error = attributes.iter().any(|kv| {
            (kv.key.as_str() == "otel.status_code" && kv.value.as_str() == "ERROR")
                || (kv.key.as_str() == "error" && kv.value.as_str() == "true")
        });

        if is_error {
            return SamplingResult {
                decision: SamplingDecision::RecordAndSample,
                attributes: vec![],
                trace_state: TraceState::default(),
            };
        }

        let rate = sample_rate(name);

        // Delegate to trace-id ratio sampler for deterministic decisions
        Sampler::TraceIdRatioBased(rate).should_sample(
            parent_context,
            trace_id,
            name,
            span_kind,
            attributes,
            links,
        )
    }
}

fn sample_rate(span_name: &str) -> f64 {
    if span_name.starts_with("tool") || span_name.starts_with("auth") {
        1.0
    } else {
        0.1
    }
}
