use crate::prediction::Verdict;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    predictions: Counter<u64>,
    prediction_errors: Counter<u64>,
    prediction_duration: Histogram<u64>,
    provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("golden_batch");

        let predictions = meter
            .u64_counter("predictions_total")
            .with_description("Number of classified batches by verdict")
            .build();

        let prediction_errors = meter
            .u64_counter("prediction_errors_total")
            .with_description("Number of rejected or failed prediction requests")
            .build();

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(generate_boundaries((1, 5, 25, 100, 1000)))
            .with_description("Duration of model inference in milliseconds")
            .build();

        Ok(Metrics {
            predictions,
            prediction_errors,
            prediction_duration,
            provider,
            registry,
        })
    }

    /// Routes instruments created through the global API, such as the HTTP
    /// layer's, into this registry. Call once before building the router.
    pub fn install_global(&self) {
        global::set_meter_provider(self.provider.clone());
    }

    pub fn record_prediction(&self, verdict: Verdict) {
        let attributes = [KeyValue::new("verdict", verdict.as_str())];
        self.predictions.add(1, &attributes);
    }

    pub fn record_error(&self, kind: &'static str) {
        let attributes = [KeyValue::new("kind", kind)];
        self.prediction_errors.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64) {
        self.prediction_duration.record(duration_ms, &[]);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 1;
    let middle_step: usize = 5;
    let end_step: usize = 25;
    let tail_step: usize = 300;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
