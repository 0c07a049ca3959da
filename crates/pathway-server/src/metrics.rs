use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use pathway_telemetry::metrics;
use pathway_telemetry::{Histogram, KeyValue};

/// Middleware recording request duration by route and status
pub async fn http_metrics_middleware(histogram: Histogram<f64>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_owned(), |p| p.as_str().to_owned());

    let response = next.run(request).await;

    let attributes = [
        KeyValue::new("http.request.method", method),
        KeyValue::new("http.route", route),
        KeyValue::new("http.response.status_code", i64::from(response.status().as_u16())),
    ];
    metrics::record_duration(&histogram, start, &attributes);

    response
}

pub fn request_duration_histogram() -> Histogram<f64> {
    metrics::meter()
        .f64_histogram(metrics::HTTP_REQUEST_DURATION)
        .with_unit("s")
        .with_description("Duration of HTTP requests")
        .build()
}
