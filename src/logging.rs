use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{debug, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. Output goes to stderr so the stdio
/// transport keeps stdout for protocol frames only.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = info_span!("http", method = %method, path = %path);
    let started_at = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;
    let status = response.status().as_u16();
    let elapsed_ms = started_at.elapsed().as_millis();

    span.in_scope(|| {
        if path == "/health" {
            debug!(status, duration_ms = elapsed_ms, "health probe");
        } else {
            info!(status, duration_ms = elapsed_ms, "request summary");
        }

        if status == 401 {
            warn!("authentication failure");
        }
    });

    response
}
