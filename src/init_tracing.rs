use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, Resource};
use tracing::subscriber::set_global_default;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, Layer, Registry};

use crate::config::{LogFormat, Tracing};

pub(super) fn init_tracing(tracing: &Tracing) -> color_eyre::Result<()> {
    color_eyre::install()?;

    LogTracer::init()?;

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let span_events = if tracing.logging.log_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let targets = tracing.logging.targets.targets.clone();
    let fmt_layer = tracing_subscriber::fmt::layer().with_span_events(span_events);

    let format_layer: Box<dyn Layer<Registry> + Send + Sync> = match tracing.logging.format {
        LogFormat::Compact => fmt_layer.compact().with_filter(targets).boxed(),
        LogFormat::Json => fmt_layer
            .json()
            .flatten_event(true)
            .with_filter(targets)
            .boxed(),
        LogFormat::Normal => fmt_layer.with_filter(targets).boxed(),
        LogFormat::Pretty => fmt_layer.pretty().with_filter(targets).boxed(),
    };

    let otel_layer = if let Some(url) = tracing.opentelemetry.url.as_ref() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_trace_config(
                opentelemetry_sdk::trace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", tracing.opentelemetry.service_name.clone()),
                ])),
            )
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(url.as_str()),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        Some(
            tracing_opentelemetry::layer()
                .with_tracer(tracer)
                .with_filter(tracing.opentelemetry.targets.targets.clone()),
        )
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(format_layer)
        .with(ErrorLayer::default())
        .with(otel_layer);

    set_global_default(subscriber)?;

    Ok(())
}
