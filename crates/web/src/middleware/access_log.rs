//! Access logging stage.
//!
//! One structured `tracing` event per completed request, carrying the fields
//! of the combined access log format. Each request also gets a unique ID:
//! taken from an upstream `x-request-id` header when present (load balancer,
//! reverse proxy), generated otherwise. The ID is recorded on the request
//! span, tagged in the Sentry scope and echoed in the response headers.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Request},
    http::{HeaderValue, Response, header},
    middleware::{self, Next},
};
use tower::Layer;
use tower_http::trace::TraceLayer;
use tracing::{Span, field::Empty};
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tracing target of the per-request completion event.
pub const ACCESS_LOG_TARGET: &str = "hearth::access";

/// Wrap `inner` with the access log and request ID middleware.
pub fn wrap(inner: Router) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(make_span)
        .on_response(on_response);

    let service = trace.layer(middleware::from_fn(request_id_middleware).layer(inner));
    Router::new().fallback_service(service)
}

fn make_span(request: &Request<Body>) -> Span {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_owned(), |ConnectInfo(addr)| addr.ip().to_string());
    let header_or_dash = |name: header::HeaderName| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-")
            .to_owned()
    };

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        remote_addr = %remote_addr,
        referrer = %header_or_dash(header::REFERER),
        user_agent = %header_or_dash(header::USER_AGENT),
        request_id = Empty,
        user_id = Empty,
        status = Empty,
        latency_ms = Empty,
    )
}

fn on_response(response: &Response<Body>, latency: Duration, span: &Span) {
    let status = response.status().as_u16();
    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    span.record("status", status);
    span.record("latency_ms", latency_ms);

    tracing::info!(
        target: ACCESS_LOG_TARGET,
        status,
        content_length,
        latency_ms,
        "request completed"
    );
}

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> axum::response::Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
