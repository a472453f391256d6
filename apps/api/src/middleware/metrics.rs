//! HTTP metrics collection.
//!
//! Every tracked request (anything but `OPTIONS`) records a duration
//! histogram, a request counter and byte-size histograms, keyed by
//! {method, route, status_code}. The route label is the matched route
//! pattern (`/web/users/:id`), never the concrete path, so label
//! cardinality stays bounded. Recording never affects the request path.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

const PREFIX: &str = "boilerplate_";

const DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];
const SIZE_BUCKETS: &[f64] = &[
    100.0, 1_000.0, 5_000.0, 10_000.0, 50_000.0, 100_000.0, 500_000.0, 1_000_000.0,
];

/// Per-request HTTP metrics backed by a dedicated Prometheus registry.
#[derive(Clone)]
pub struct HttpMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    request_size_bytes: HistogramVec,
    response_size_bytes: HistogramVec,
}

impl HttpMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                format!("{PREFIX}http_requests_total"),
                "Total number of HTTP requests",
            ),
            &["method", "route", "status_code"],
        )
        .expect("metric can be created");

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                format!("{PREFIX}http_request_duration_seconds"),
                "Duration of HTTP requests in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["method", "route", "status_code"],
        )
        .expect("metric can be created");

        let request_size_bytes = HistogramVec::new(
            HistogramOpts::new(
                format!("{PREFIX}http_request_size_bytes"),
                "Size of HTTP requests in bytes",
            )
            .buckets(SIZE_BUCKETS.to_vec()),
            &["method", "route"],
        )
        .expect("metric can be created");

        let response_size_bytes = HistogramVec::new(
            HistogramOpts::new(
                format!("{PREFIX}http_response_size_bytes"),
                "Size of HTTP responses in bytes",
            )
            .buckets(SIZE_BUCKETS.to_vec()),
            &["method", "route", "status_code"],
        )
        .expect("metric can be created");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(request_size_bytes.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(response_size_bytes.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                requests_total,
                request_duration_seconds,
                request_size_bytes,
                response_size_bytes,
            }),
        }
    }

    /// Record one completed request.
    pub fn record(
        &self,
        method: &str,
        route: &str,
        status: u16,
        duration_secs: f64,
        request_size: Option<f64>,
        response_size: Option<f64>,
    ) {
        let status = status.to_string();

        self.inner
            .requests_total
            .with_label_values(&[method, route, &status])
            .inc();
        self.inner
            .request_duration_seconds
            .with_label_values(&[method, route, &status])
            .observe(duration_secs);

        if let Some(bytes) = request_size {
            self.inner
                .request_size_bytes
                .with_label_values(&[method, route])
                .observe(bytes);
        }
        if let Some(bytes) = response_size {
            self.inner
                .response_size_bytes
                .with_label_values(&[method, route, &status])
                .observe(bytes);
        }
    }

    /// Gather all metrics and encode to the Prometheus text format.
    /// Families with no samples yet are skipped; the encoder treats them
    /// as an error.
    pub fn encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let families: Vec<_> = self
            .inner
            .registry
            .gather()
            .into_iter()
            .filter(|family| !family.get_metric().is_empty())
            .collect();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics output is not UTF-8: {e}"))
    }
}

impl Default for HttpMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware recording duration, count and sizes for every tracked request.
///
/// CORS pre-flight (`OPTIONS`) is not tracked. The request size comes from
/// the `content-length` header; the response size from the body's exact size
/// hint, when one exists.
pub async fn track_http(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let request_size = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok());

    let start = Instant::now();
    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();
    let response_size = http_body::Body::size_hint(response.body())
        .exact()
        .map(|bytes| bytes as f64);

    state
        .metrics
        .record(&method, &route, status, duration, request_size, response_size);

    response
}
