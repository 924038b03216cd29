//! Access log for every request.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::http::header::CONTENT_LENGTH;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

/// Logs route, status, response size and latency; 5xx responses at warn.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status();
    let response_bytes = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);

    if status.is_server_error() {
        warn!(%method, %route, status = status.as_u16(), response_bytes, latency_ms, "Request failed");
    } else {
        info!(%method, %route, status = status.as_u16(), response_bytes, latency_ms, "Request served");
    }

    response
}
