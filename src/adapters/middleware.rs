//! Axum middleware attached to the gateway router.
//!
//! Both layers are stateless: one tags every request with an id and a
//! `request` span, the other logs start and completion with latency.
use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::tracing_setup::create_request_span;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Tag the request with an id and run it inside a `request` span.
///
/// A client supplied `X-Request-ID` is kept, otherwise a UUID is generated.
/// The id is echoed on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = create_request_span(req.method().as_str(), req.uri().path(), &request_id);

    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &header_value {
        req.headers_mut().insert(X_REQUEST_ID.clone(), value.clone());
    }

    let mut response = next.run(req).instrument(span.clone()).await;
    span.record("http.status_code", response.status().as_u16());

    if let Some(value) = header_value {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}

/// Log start/end of a request including latency.
pub async fn request_timing_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    tracing::debug!("Started processing {} {}", method, uri);

    let response = next.run(req).await;
    let duration = start.elapsed();

    tracing::Span::current().record("duration_ms", duration.as_millis() as u64);
    tracing::info!(
        "Completed {} {} - {} in {:?}",
        method,
        uri.path(),
        response.status(),
        duration
    );

    response
}
