//! Header construction, forwarding, and hop-by-hop stripping.
//!
//! [`build_forwarded_headers`] clones the inbound headers (when
//! forwarding is enabled), strips hop-by-hop headers, rewrites `Host`,
//! adds proxy metadata (`X-Forwarded-Proto`, `X-Forwarded-Host`, `Via`,
//! `X-Correlation-Id`), and applies the default header rules. The route
//! and attribution-chain headers are owned by the collaboration
//! middleware and pass through untouched.

use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::collab::{CHAIN_HEADER, ROUTE_HEADER};
use crate::config::model::Defaults;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Strip hop-by-hop headers and `content-length` from an upstream response.
///
/// The body has already been fully collected, so `transfer-encoding` and
/// `content-length` from the origin are no longer accurate. Axum sets the
/// correct `content-length` from the actual body bytes.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(hyper::header::CONTENT_LENGTH);
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    target_url: &url::Url,
    defaults: &Defaults,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = if defaults.forward_headers {
        original.clone()
    } else {
        // The collaboration headers must reach the next hop regardless.
        let mut kept = HeaderMap::new();
        for name in [ROUTE_HEADER, CHAIN_HEADER] {
            if let Some(value) = original.get(name) {
                kept.insert(name, value.clone());
            }
        }
        kept
    };

    if defaults.strip_hop_by_hop {
        for header_name in HOP_BY_HOP.iter() {
            headers.remove(header_name);
        }
    }
    // Body is re-sent from a buffer; hyper computes the length.
    headers.remove(hyper::header::CONTENT_LENGTH);

    if let Some(host) = target_url.host_str() {
        let host_value = target_url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
        if let Ok(val) = HeaderValue::from_str(&host_value) {
            headers.insert("host", val);
        }
    }

    if defaults.proxy_headers {
        let proto = if target_url.scheme() == "https" {
            "https"
        } else {
            "http"
        };
        headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));

        if !headers.contains_key("x-forwarded-host") {
            if let Some(original_host) = original.get("host") {
                headers.insert("x-forwarded-host", original_host.clone());
            }
        }

        headers.append("via", HeaderValue::from_static("1.1 hopgate"));

        if let Ok(val) = HeaderValue::from_str(correlation_id) {
            headers.insert(CORRELATION_HEADER, val);
        }
    }

    for (key, value) in &defaults.headers.add {
        match (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            (Ok(name), _) if name == ROUTE_HEADER || name == CHAIN_HEADER => {
                tracing::warn!(header = %key, "defaults.headers.add cannot override hop routing headers, skipping");
            }
            (Ok(name), Ok(val)) => {
                headers.insert(name, val);
            }
            _ => {
                tracing::warn!(header = %key, "invalid header name or value in defaults.headers.add, skipping");
            }
        }
    }

    for key in &defaults.headers.strip {
        if let Ok(name) = key.parse::<HeaderName>() {
            if name == ROUTE_HEADER || name == CHAIN_HEADER {
                continue;
            }
            headers.remove(&name);
        }
    }

    headers
}
