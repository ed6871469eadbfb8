//! HTTP transport for the gateway.
//!
//! [`deliver_handler`] is the Axum fallback: the in-process "next
//! handler" that hands a request, already annotated by the collaboration
//! middleware, to the local upstream service. Submodules build the
//! outgoing headers ([`headers`]) and replay buffered requests to a
//! single target ([`forward`]).

pub mod forward;
pub mod headers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::server::AppState;
use forward::{ForwardRequest, Forwarded};
use headers::CORRELATION_HEADER;

/// Correlation id from the request, or a fresh UUID v4.
#[must_use]
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from)
}

/// `base` with `uri`'s path and query appended.
#[must_use]
pub fn join_url(base: &str, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    format!("{}{path_and_query}", base.trim_end_matches('/'))
}

/// Turn a collected upstream response into an Axum response.
pub fn relay_response(forwarded: Forwarded, correlation_id: &str) -> Response {
    let Forwarded {
        status,
        mut headers,
        body,
        ..
    } = forwarded;
    headers::strip_response_hop_by_hop(&mut headers);
    headers.remove(CORRELATION_HEADER);

    let mut builder = Response::builder().status(status);
    for (key, value) in &headers {
        builder = builder.header(key, value);
    }
    builder
        .header(CORRELATION_HEADER, correlation_id)
        .body(axum::body::Body::from(body))
        .unwrap_or_else(|e| {
            tracing::error!(
                correlation_id = %correlation_id,
                error = %e,
                "failed to build response"
            );
            StatusCode::BAD_GATEWAY.into_response()
        })
}

#[allow(clippy::significant_drop_tightening)]
pub async fn deliver_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = correlation_id(&req_headers);
    let config = Arc::clone(&state.config.read().await.config);

    let target = join_url(&config.upstream.url, &uri);
    let parsed = match url::Url::parse(&target) {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(correlation_id = %correlation_id, target = %target, error = %e, "invalid upstream URL");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let headers =
        headers::build_forwarded_headers(&req_headers, &parsed, &config.defaults, &correlation_id);
    let timeout = Duration::from_millis(config.upstream.timeout.unwrap_or(config.defaults.timeout));

    let result = forward::send(ForwardRequest {
        client: &state.http_client,
        method: &method,
        url: &target,
        headers: &headers,
        body,
        timeout,
    })
    .await;

    match result {
        Ok(forwarded) => {
            tracing::info!(
                correlation_id = %correlation_id,
                target = %target,
                status = forwarded.status.as_u16(),
                latency_ms = forwarded.latency_ms,
                "delivered to upstream"
            );
            state.stats.delivered.fetch_add(1, Ordering::Relaxed);
            relay_response(forwarded, &correlation_id)
        }
        Err(e) => {
            tracing::error!(
                correlation_id = %correlation_id,
                target = %target,
                error = %e,
                "upstream delivery failed"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            e.status().into_response()
        }
    }
}
