//! Single-target request replay.
//!
//! [`send`] replays a buffered request (method, headers, body) to one
//! absolute URL through the shared client and collects the response.
//! Used both for hops to the next gateway and for delivery to the local
//! upstream.

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;

use crate::server::HttpClient;

#[derive(Debug)]
pub struct Forwarded {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub latency_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid request: {0}")]
    Build(#[from] hyper::http::Error),

    #[error("{0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("body read error: {0}")]
    Body(#[from] hyper::Error),

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl ForwardError {
    /// Status returned to the caller when the forward fails.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

pub struct ForwardRequest<'a> {
    pub client: &'a HttpClient,
    pub method: &'a Method,
    pub url: &'a str,
    pub headers: &'a HeaderMap,
    pub body: Bytes,
    pub timeout: Duration,
}

#[allow(clippy::cast_possible_truncation)]
pub async fn send(req: ForwardRequest<'_>) -> Result<Forwarded, ForwardError> {
    let start = Instant::now();

    let mut builder = hyper::Request::builder()
        .method(req.method.clone())
        .uri(req.url);
    for (key, value) in req.headers {
        builder = builder.header(key, value);
    }
    let request = builder.body(Full::new(req.body))?;

    let exchange = async {
        let response = req.client.request(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await?.to_bytes();
        Ok::<_, ForwardError>((status, headers, body))
    };

    let (status, headers, body) = tokio::time::timeout(req.timeout, exchange)
        .await
        .map_err(|_| ForwardError::Timeout(req.timeout))??;

    Ok(Forwarded {
        status,
        headers,
        body,
        latency_ms: start.elapsed().as_millis() as u64,
    })
}
