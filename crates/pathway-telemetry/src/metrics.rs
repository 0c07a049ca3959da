//! Metric names and recording helpers

use std::time::Instant;

use opentelemetry::metrics::{Histogram, Meter};

/// Instrumentation scope for every Pathway metric
pub const METER_NAME: &str = "pathway";

/// Meter from the globally installed provider (no-op when none is set)
pub fn meter() -> Meter {
    opentelemetry::global::meter(METER_NAME)
}

/// Record elapsed seconds since `start` on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[opentelemetry::KeyValue]) {
    histogram.record(start.elapsed().as_secs_f64(), attributes);
}

// HTTP
pub const HTTP_REQUEST_DURATION: &str = "http.server.request.duration";

// Routing and execution
pub const ROUTE_COUNT: &str = "pathway.route.count";
pub const ATTEMPT_COUNT: &str = "pathway.attempt.count";
pub const ATTEMPT_DURATION: &str = "pathway.attempt.duration";
pub const EXECUTION_COUNT: &str = "pathway.execution.count";
pub const EXECUTION_DURATION: &str = "pathway.execution.duration";
pub const CACHE_HIT_COUNT: &str = "pathway.cache.hit.count";
