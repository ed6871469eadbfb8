//! Collaboration routing middleware.
//!
//! [`collaborate`] wraps the local delivery handler. For every request it
//! asks [`collab::decide`](crate::collab::decide) what this gateway's
//! role is, writes the route and attribution chain onto the request, and
//! then either runs the inner handler (destination) or sends the request
//! on to the next center's gateway (origin and relay).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::collab::{
    decide, read_header, CoCenterInfo, CocoAgent, HopAction, InboundHop, CHAIN_HEADER,
    ROUTE_HEADER,
};
use crate::config::model::{Config, ForwardMode};
use crate::error::CollabError;
use crate::proxy::forward::{self, ForwardRequest};
use crate::proxy::headers::{build_forwarded_headers, CORRELATION_HEADER};
use crate::proxy::{self, relay_response};
use crate::server::AppState;

pub const EXPECTATION_FAILED_BODY: &str = "417 Expectation Failed\n";

/// The uniform answer to any routing failure.
#[must_use]
pub fn exception_response() -> Response {
    (
        StatusCode::EXPECTATION_FAILED,
        [(CONTENT_TYPE, "text/plain")],
        EXPECTATION_FAILED_BODY,
    )
        .into_response()
}

/// Value of query parameter `key`, percent-decoded.
#[must_use]
pub fn query_param(uri: &Uri, key: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

pub async fn collaborate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let config = state.config().await;
    let gateway = &config.gateway;

    let correlation_id = proxy::correlation_id(req.headers());
    if let Ok(val) = HeaderValue::from_str(&correlation_id) {
        req.headers_mut().insert(CORRELATION_HEADER, val);
    }

    let destination = query_param(req.uri(), &gateway.destination_param);
    let route = match read_header(req.headers(), ROUTE_HEADER) {
        Ok(route) => route,
        Err(e) => return reject(&state, &correlation_id, &e),
    };
    let routed = destination.as_deref().is_some_and(|d| !d.is_empty())
        || route.as_deref().is_some_and(|r| !r.is_empty());
    let chain = match read_header(req.headers(), CHAIN_HEADER) {
        Ok(chain) => chain,
        Err(e) if routed => return reject(&state, &correlation_id, &e),
        // Unrouted requests never extend the chain.
        Err(_) => None,
    };
    let inbound = InboundHop {
        destination: destination.as_deref(),
        route: route.as_deref(),
        chain: chain.as_deref(),
    };

    let agent = CocoAgent::new(
        state.http_client.clone(),
        &gateway.agent_url,
        Duration::from_millis(gateway.lookup_timeout),
    );

    let decision = match decide(&agent, &agent, inbound, gateway.on_missing_destination).await {
        Ok(Some(decision)) => decision,
        Ok(None) => {
            tracing::debug!(
                correlation_id = %correlation_id,
                path = %req.uri().path(),
                "no destination center, passing through"
            );
            return next.run(req).await;
        }
        Err(e) => return reject(&state, &correlation_id, &e),
    };

    if let Err(e) = decision.write_headers(req.headers_mut()) {
        return reject(&state, &correlation_id, &e);
    }

    let next_code = match &decision.action {
        HopAction::Forward(next_hop) => next_hop.code.as_str(),
        HopAction::Deliver => "",
    };
    tracing::info!(
        correlation_id = %correlation_id,
        local = %decision.local.code,
        role = %decision.role,
        route = %decision.route,
        planned = decision.planned,
        next = next_code,
        "hop resolved"
    );

    match decision.action {
        HopAction::Deliver => next.run(req).await,
        HopAction::Forward(next_hop) => {
            forward_to_next_hop(&state, &config, req, &next_hop, &correlation_id).await
        }
    }
}

fn reject(state: &AppState, correlation_id: &str, error: &CollabError) -> Response {
    tracing::error!(
        correlation_id = %correlation_id,
        kind = error.kind(),
        error = %error,
        "collaboration routing failed"
    );
    state.stats.rejected.fetch_add(1, Ordering::Relaxed);
    exception_response()
}

async fn forward_to_next_hop(
    state: &AppState,
    config: &Config,
    req: Request,
    next_hop: &CoCenterInfo,
    correlation_id: &str,
) -> Response {
    let path_and_query = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
    let target = next_hop.url_for(&config.gateway.hop_scheme, path_and_query);

    if config.gateway.forward_mode == ForwardMode::Redirect {
        return redirect_to(state, req.headers(), &target, correlation_id);
    }

    let parsed = match url::Url::parse(&target) {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(correlation_id = %correlation_id, target = %target, error = %e, "invalid next hop URL");
            state.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return exception_response();
        }
    };

    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(correlation_id = %correlation_id, error = %e, "failed to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let headers = build_forwarded_headers(&parts.headers, &parsed, &config.defaults, correlation_id);
    let result = forward::send(ForwardRequest {
        client: &state.http_client,
        method: &parts.method,
        url: &target,
        headers: &headers,
        body,
        timeout: Duration::from_millis(config.defaults.timeout),
    })
    .await;

    match result {
        Ok(forwarded) => {
            tracing::info!(
                correlation_id = %correlation_id,
                next = %next_hop.code,
                target = %target,
                status = forwarded.status.as_u16(),
                latency_ms = forwarded.latency_ms,
                "forwarded to next hop"
            );
            state.stats.relayed.fetch_add(1, Ordering::Relaxed);
            relay_response(forwarded, correlation_id)
        }
        Err(e) => {
            tracing::error!(
                correlation_id = %correlation_id,
                next = %next_hop.code,
                target = %target,
                error = %e,
                "next hop unreachable"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            e.status().into_response()
        }
    }
}

/// `308 Permanent Redirect` to the next hop. The route and chain are
/// echoed on the response since a redirect cannot rewrite request headers.
fn redirect_to(state: &AppState, headers: &HeaderMap, target: &str, correlation_id: &str) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::PERMANENT_REDIRECT)
        .header(LOCATION, target)
        .header(CORRELATION_HEADER, correlation_id);
    for name in [ROUTE_HEADER, CHAIN_HEADER] {
        if let Some(value) = headers.get(name) {
            builder = builder.header(name, value);
        }
    }

    match builder.body(Body::empty()) {
        Ok(response) => {
            tracing::info!(correlation_id = %correlation_id, target = %target, "redirected to next hop");
            state.stats.relayed.fetch_add(1, Ordering::Relaxed);
            response
        }
        Err(e) => {
            tracing::error!(correlation_id = %correlation_id, target = %target, error = %e, "failed to build redirect");
            state.stats.rejected.fetch_add(1, Ordering::Relaxed);
            exception_response()
        }
    }
}
