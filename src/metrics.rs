//! Prometheus metrics

use crate::aggregate::AggregationKind;
use crate::error::UsageError;

use axum::{
    body::{Body, BoxBody},
    http::Request,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
};
use tracing::Span;

lazy_static! {
    // Registry for holding metric state
    pub static ref REGISTRY: Registry = Registry::new();
    // Simple request counter
    pub static ref INCOMING_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("incoming_requests", "The number of HTTP requests received"),
        &["http_method"]
    ).expect("valid metric options");
    // Request counter by status code
    pub static ref RESPONSE_CODE_COLLECTOR: IntCounterVec = IntCounterVec::new(
        Opts::new("outgoing_response", "The number of responses sent."),
        &["status_code"]
    ).expect("valid metric options");
    // Request histogram by response time
    pub static ref RESPONSE_TIME_COLLECTOR: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new("response_time", "The time taken to respond to each request"),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        },
        &[],
    ).expect("valid metric options");
    // Number of records in the loaded dataset
    pub static ref DATASET_RECORDS: IntGauge = IntGauge::new(
        "dataset_records", "The number of usage records loaded at startup"
    ).expect("valid metric options");
    // Aggregation histogram by execution time
    pub static ref AGGREGATION_TIME_COLLECTOR: HistogramVec = HistogramVec::new(
        HistogramOpts{
            common_opts: Opts::new("aggregation_time", "The time taken to compute each aggregation"),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        },
        &["aggregation"],
    ).expect("valid metric options");
}

/// Register all collectors with [REGISTRY].
pub fn register_metrics() -> Result<(), UsageError> {
    REGISTRY.register(Box::new(INCOMING_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(RESPONSE_CODE_COLLECTOR.clone()))?;
    REGISTRY.register(Box::new(RESPONSE_TIME_COLLECTOR.clone()))?;
    REGISTRY.register(Box::new(DATASET_RECORDS.clone()))?;
    REGISTRY.register(Box::new(AGGREGATION_TIME_COLLECTOR.clone()))?;
    Ok(())
}

/// Render all registered metrics in the Prometheus text format.
pub async fn metrics_handler() -> Result<String, UsageError> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the size of the loaded dataset.
pub fn record_dataset_size(records: usize) {
    DATASET_RECORDS.set(i64::try_from(records).unwrap_or(i64::MAX));
}

/// Start timing an aggregation. The time is observed when the returned timer is dropped.
pub fn aggregation_timer(kind: AggregationKind) -> prometheus::HistogramTimer {
    AGGREGATION_TIME_COLLECTOR
        .with_label_values(&[&kind.to_string()])
        .start_timer()
}

/// Increments the prometheus counter on all incoming requests, labelled by http method
pub fn request_counter(request: &Request<Body>, _span: &Span) {
    INCOMING_REQUESTS
        .with_label_values(&[&request.method().to_string().to_ascii_uppercase()])
        .inc();
}

/// Increment the prometheus counter on all outgoing responses, labelled by status code
pub fn record_response_metrics(
    response: &Response<BoxBody>,
    latency: std::time::Duration,
    _span: &Span,
) {
    RESPONSE_CODE_COLLECTOR
        .with_label_values(&[response.status().as_str()])
        .inc();

    RESPONSE_TIME_COLLECTOR
        .with_label_values(&[])
        .observe(latency.as_secs_f64());
}
