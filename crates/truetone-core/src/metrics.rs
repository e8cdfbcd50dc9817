//! Generation gate metrics.
//!
//! # Metrics
//!
//! - `quota_decisions_total` - Counter of quota decisions by outcome and tier
//! - `generation_requests_total` - Counter of generation requests by outcome
//! - `cross_product_redirects_total` - Counter of cross-product redirects by source product
//! - `generation_operation_duration_seconds` - Histogram of core operation latencies
//!
//! Calls are no-ops until a recorder such as `metrics-exporter-prometheus`
//! is installed.

use std::time::Instant;

use metrics::{counter, histogram};
use truetone_types::{Product, QuotaDecision};

/// Metric name for quota decisions.
pub const QUOTA_DECISIONS_TOTAL: &str = "quota_decisions_total";

/// Metric name for generation requests.
pub const GENERATION_REQUESTS_TOTAL: &str = "generation_requests_total";

/// Metric name for cross-product redirects.
pub const CROSS_PRODUCT_REDIRECTS_TOTAL: &str = "cross_product_redirects_total";

/// Metric name for the operation duration histogram.
pub const OPERATION_DURATION_SECONDS: &str = "generation_operation_duration_seconds";

/// Timed core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    QuotaCheck,
    SubscriptionResolve,
    ProductAccess,
    Generation,
    PersistArtifact,
}

impl Operation {
    /// Get the operation name as a string for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuotaCheck => "quota_check",
            Self::SubscriptionResolve => "subscription_resolve",
            Self::ProductAccess => "product_access",
            Self::Generation => "generation",
            Self::PersistArtifact => "persist_artifact",
        }
    }
}

/// Generation request outcome for metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed,
    QuotaExceeded,
    Redirected,
    ProviderFailed,
    StreamFailed,
}

impl GenerationOutcome {
    /// Get the outcome as a string for metrics labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Redirected => "redirected",
            Self::ProviderFailed => "provider_failed",
            Self::StreamFailed => "stream_failed",
        }
    }
}

/// Record a quota decision.
pub fn record_quota_decision(decision: &QuotaDecision) {
    let outcome = if decision.allowed { "allowed" } else { "denied" };
    counter!(
        QUOTA_DECISIONS_TOTAL,
        "outcome" => outcome,
        "tier" => decision.tier.as_str()
    )
    .increment(1);
}

/// Record the end state of a generation request.
pub fn record_generation(outcome: GenerationOutcome) {
    counter!(GENERATION_REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Record a cross-product redirect.
pub fn record_cross_product_redirect(source_product: Product) {
    counter!(CROSS_PRODUCT_REDIRECTS_TOTAL, "source" => source_product.as_str()).increment(1);
}

fn record_duration(operation: Operation, result: &'static str, duration_seconds: f64) {
    histogram!(
        OPERATION_DURATION_SECONDS,
        "operation" => operation.as_str(),
        "result" => result
    )
    .record(duration_seconds);
}

/// Timer guard for core operation latency.
///
/// Records as `cancelled` when dropped without an explicit result, which is
/// what happens when a client disconnects mid-request.
#[must_use]
pub struct OperationTimer {
    operation: Operation,
    start: Instant,
    recorded: bool,
}

impl OperationTimer {
    /// Start a new operation timer.
    pub fn start(operation: Operation) -> Self {
        Self {
            operation,
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Record success and return the duration.
    pub fn success(self) -> std::time::Duration {
        self.finish("success")
    }

    /// Record an error and return the duration.
    pub fn error(self) -> std::time::Duration {
        self.finish("error")
    }

    /// Record success or error from a result.
    pub fn observe<T, E>(self, result: &Result<T, E>) {
        if result.is_ok() {
            self.success();
        } else {
            self.error();
        }
    }

    fn finish(mut self, result: &'static str) -> std::time::Duration {
        let duration = self.start.elapsed();
        record_duration(self.operation, result, duration.as_secs_f64());
        self.recorded = true;
        duration
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.recorded {
            record_duration(
                self.operation,
                "cancelled",
                self.start.elapsed().as_secs_f64(),
            );
        }
    }
}

/// Describe all metrics for registration with a recorder.
///
/// Call this during application startup, after installing the recorder.
pub fn describe_metrics() {
    use metrics::{describe_counter, describe_histogram, Unit};

    describe_counter!(
        QUOTA_DECISIONS_TOTAL,
        Unit::Count,
        "Quota gate decisions by outcome and metered tier"
    );

    describe_counter!(
        GENERATION_REQUESTS_TOTAL,
        Unit::Count,
        "Generation requests by final outcome"
    );

    describe_counter!(
        CROSS_PRODUCT_REDIRECTS_TOTAL,
        Unit::Count,
        "Requests redirected because the user belongs to another product"
    );

    describe_histogram!(
        OPERATION_DURATION_SECONDS,
        Unit::Seconds,
        "Duration of generation gate operations in seconds"
    );
}
