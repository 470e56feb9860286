use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{Mutex, OnceLock};

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// HTTP metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Domain metrics
pub static CHANGE_BATCHES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static CHANGE_RECORDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static VERIFICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Register all collectors. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;
    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;
    let change_batches = IntCounterVec::new(
        Opts::new("kms_change_batches_total", "Change batches processed by outcome"),
        &["outcome"],
    )?;
    let change_records = IntCounterVec::new(
        Opts::new("kms_change_records_total", "Change records applied"),
        &["table", "operation"],
    )?;
    let verifications = IntCounterVec::new(
        Opts::new("kms_verifications_total", "API key verifications by result"),
        &["result"],
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(change_batches.clone()))?;
    registry.register(Box::new(change_records.clone()))?;
    registry.register(Box::new(verifications.clone()))?;

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = CHANGE_BATCHES_TOTAL.set(change_batches);
    let _ = CHANGE_RECORDS_TOTAL.set(change_records);
    let _ = VERIFICATIONS_TOTAL.set(verifications);

    Ok(())
}

pub fn record_batch(outcome: &str) {
    if let Some(counter) = CHANGE_BATCHES_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_change(table: &str, operation: &str) {
    if let Some(counter) = CHANGE_RECORDS_TOTAL.get() {
        counter.with_label_values(&[table, operation]).inc();
    }
}

pub fn record_verification(result: &str) {
    if let Some(counter) = VERIFICATIONS_TOTAL.get() {
        counter.with_label_values(&[result]).inc();
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
