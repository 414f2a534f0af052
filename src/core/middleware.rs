//! HTTP middleware for request metrics.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

use crate::core::metrics::get_metrics;

/// Middleware that records request count, duration, and in-flight gauge.
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    /// Track metrics for a request.
    pub async fn track_metrics(request: Request, next: Next) -> Response {
        let path = request.uri().path().to_string();
        let method = request.method().to_string();

        // Skip the metrics endpoint itself to avoid recursion
        if path == "/metrics" {
            return next.run(request).await;
        }

        let metrics = get_metrics();
        metrics.active_requests.with_label_values(&[&path]).inc();

        let start = Instant::now();
        let response = next.run(request).await;
        let duration = start.elapsed().as_secs_f64();

        let status = response.status().as_u16().to_string();
        metrics
            .request_count
            .with_label_values(&[&method, &path, &status])
            .inc();
        metrics
            .request_duration
            .with_label_values(&[&path])
            .observe(duration);
        metrics.active_requests.with_label_values(&[&path]).dec();

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_track_metrics_passes_response_through() {
        crate::core::metrics::init_metrics();

        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn(MetricsMiddleware::track_metrics));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
