//! Metrics module
//!
//! Prometheus metrics for uploads, multipart sessions and request signing,
//! registered in the default registry.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "obs_uploads_total",
        "Total number of uploads",
        &["bucket", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "obs_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "obs_upload_duration_seconds",
        "Upload duration in seconds",
        &["bucket", "method"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0, 300.0, 1800.0]
    ).unwrap();

    // Multipart metrics
    pub static ref MULTIPART_UPLOADS: CounterVec = register_counter_vec!(
        "obs_multipart_uploads_total",
        "Total multipart uploads",
        &["bucket", "status"]
    ).unwrap();

    pub static ref MULTIPART_PARTS: Histogram = register_histogram!(
        "obs_multipart_parts",
        "Number of parts per multipart upload",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 10000.0]
    ).unwrap();

    pub static ref SEGMENT_UPLOADS: CounterVec = register_counter_vec!(
        "obs_segment_uploads_total",
        "Segment upload attempts",
        &["status"]
    ).unwrap();

    pub static ref SEGMENT_RETRIES: Counter = register_counter!(
        "obs_segment_retries_total",
        "Segments sent a second time after a failed attempt"
    ).unwrap();

    pub static ref COMPLETE_RETRIES: Counter = register_counter!(
        "obs_complete_retries_total",
        "CompleteMultipartUpload attempts after the first"
    ).unwrap();

    pub static ref ABORTS: CounterVec = register_counter_vec!(
        "obs_multipart_aborts_total",
        "Multipart aborts",
        &["outcome"]
    ).unwrap();

    // Signing metrics
    pub static ref SIGNED_REQUESTS: CounterVec = register_counter_vec!(
        "obs_signed_requests_total",
        "Requests signed with SigV4",
        &["method"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "obs_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(bucket: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
pub fn record_upload_failure(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "failure"]).inc();
}

/// Record an upload skipped because the remote object is unchanged
pub fn record_upload_skipped(bucket: &str) {
    UPLOADS_TOTAL.with_label_values(&[bucket, "skipped"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(bucket: &str, method: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[bucket, method])
        .observe(duration_secs);
}

/// Record a successful multipart upload
pub fn record_multipart_upload_success(bucket: &str, parts_count: usize) {
    MULTIPART_UPLOADS
        .with_label_values(&[bucket, "success"])
        .inc();
    MULTIPART_PARTS.observe(parts_count as f64);
}

/// Record a failed multipart upload
pub fn record_multipart_upload_failure(bucket: &str) {
    MULTIPART_UPLOADS
        .with_label_values(&[bucket, "failure"])
        .inc();
}

/// Record one segment upload attempt
pub fn record_segment_upload(success: bool) {
    let status = if success { "success" } else { "failure" };
    SEGMENT_UPLOADS.with_label_values(&[status]).inc();
}

/// Record segments queued for their second attempt
pub fn record_segment_retries(count: usize) {
    SEGMENT_RETRIES.inc_by(count as f64);
}

pub fn record_complete_retry() {
    COMPLETE_RETRIES.inc();
}

/// Record an abort attempt
pub fn record_abort(success: bool) {
    let outcome = if success { "aborted" } else { "failed" };
    ABORTS.with_label_values(&[outcome]).inc();
}

pub fn record_signed_request(method: &str) {
    SIGNED_REQUESTS.with_label_values(&[method]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8_lossy(&buffer).into_owned()
}
