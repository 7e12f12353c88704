//! Job metrics.
//!
//! Only the `metrics` facade is used; without an installed recorder the
//! calls are no-ops.

use std::time::Duration;

use metrics::{counter, histogram};
use vedit_models::OperationKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "vedit_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vedit_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vedit_jobs_failed_total";
    pub const JOBS_DISCARDED_TOTAL: &str = "vedit_jobs_discarded_total";
    pub const JOB_DURATION_SECONDS: &str = "vedit_job_duration_seconds";
}

/// Record a job accepted into the queue.
pub fn record_job_enqueued(operation: OperationKind) {
    counter!(names::JOBS_ENQUEUED_TOTAL, "operation" => operation.as_str()).increment(1);
}

/// Record a job that was delivered.
pub fn record_job_completed(operation: OperationKind, elapsed: Duration) {
    counter!(names::JOBS_COMPLETED_TOTAL, "operation" => operation.as_str()).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "operation" => operation.as_str())
        .record(elapsed.as_secs_f64());
}

/// Record a job that failed.
pub fn record_job_failed(operation: OperationKind, input_error: bool) {
    let reason = if input_error { "input" } else { "internal" };
    counter!(
        names::JOBS_FAILED_TOTAL,
        "operation" => operation.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a job dropped without processing.
pub fn record_job_discarded() {
    counter!(names::JOBS_DISCARDED_TOTAL).increment(1);
}
