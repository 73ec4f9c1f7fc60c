use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;
use crate::rate_limit::RateDecision;
use crate::server::AppState;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

// Ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let req_id_value = req
        .headers()
        .get(&REQUEST_ID)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    if let Some(value) = &req_id_value {
        req.extensions_mut().insert(value.clone());
    }

    let mut res = next.run(req).await;
    if let Some(value) = req_id_value {
        res.headers_mut().insert(REQUEST_ID, value);
    }
    res
}

pub async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let res = next.run(req).await;
    metrics::record_http_request(&method, &route, res.status().as_u16(), started.elapsed());
    res
}

/// Client identity for rate limiting: first `x-forwarded-for` hop, else shared bucket.
fn client_key(req: &Request<Body>) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

/// Limit mutating requests; reads are never throttled.
pub async fn rate_limit_writes(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(req).await;
    };
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(req).await;
    }

    let key = client_key(&req);
    match limiter.check(&key) {
        RateDecision::Allowed { .. } => next.run(req).await,
        RateDecision::Limited { retry_after_secs } => {
            tracing::warn!(client = %key, path = %req.uri().path(), "write rate limit exceeded");
            ApiError::rate_limited(retry_after_secs).into_response()
        }
    }
}
