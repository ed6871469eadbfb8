//! HTTP client for the collaboration agent.
//!
//! The agent answers both center-info lookups and path-planning queries
//! from one base URL. [`CocoAgent`] wraps the shared hyper client with a
//! per-call timeout and decodes the agent's `{status, memo, result}`
//! envelope into explicit schemas.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::LookupError;
use crate::server::HttpClient;

pub const CO_CENTER_LOCAL_PATH: &str = "/co/center/local";
pub const CO_CENTER_NEXT_PATH: &str = "/co/center/next";
pub const OPTIMAL_NET_PATH_PATH: &str = "/net/path/optimum";

/// Response envelope shared by every agent endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub memo: Option<String>,
    pub result: T,
}

#[derive(Clone)]
pub struct CocoAgent {
    client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl CocoAgent {
    #[must_use]
    pub fn new(client: HttpClient, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `<base><path>` with an optional single query pair.
    pub(crate) fn endpoint(&self, path: &str, query: Option<(&str, &str)>) -> String {
        match query {
            Some((key, value)) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair(key, value)
                    .finish();
                format!("{}{path}?{encoded}", self.base_url)
            }
            None => format!("{}{path}", self.base_url),
        }
    }

    /// GET `url` and decode the envelope's `result`.
    ///
    /// The timeout bounds the whole exchange, body included.
    pub(crate) async fn get_result<T: DeserializeOwned>(&self, url: &str) -> Result<T, LookupError> {
        let uri: hyper::Uri = url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| LookupError::Transport(Box::new(e)))?;

        let req = hyper::Request::get(uri)
            .header(ACCEPT, "application/json")
            .body(Full::new(Bytes::new()))
            .map_err(|e| LookupError::Transport(Box::new(e)))?;

        let exchange = async {
            let response = self
                .client
                .request(req)
                .await
                .map_err(|e| LookupError::Transport(Box::new(e)))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| LookupError::Transport(Box::new(e)))?
                .to_bytes();
            Ok::<_, LookupError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| LookupError::Timeout(self.timeout))??;

        if !status.is_success() {
            return Err(LookupError::Status(status));
        }

        let envelope = decode_envelope::<T>(&body)?;
        tracing::trace!(
            url = %url,
            status = ?envelope.status,
            memo = envelope.memo.as_deref().unwrap_or(""),
            "agent responded"
        );
        Ok(envelope.result)
    }
}

pub fn decode_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<Envelope<T>, LookupError> {
    serde_json::from_slice(body).map_err(|e| LookupError::Decode(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_http_client;

    #[tokio::test]
    async fn endpoint_trims_base_and_encodes_query() {
        let agent = CocoAgent::new(
            build_http_client(),
            "http://agent:9000/",
            Duration::from_secs(1),
        );
        assert_eq!(
            agent.endpoint(CO_CENTER_LOCAL_PATH, None),
            "http://agent:9000/co/center/local"
        );
        assert_eq!(
            agent.endpoint(CO_CENTER_NEXT_PATH, Some(("coCenterCode", "dc east&1"))),
            "http://agent:9000/co/center/next?coCenterCode=dc+east%261"
        );
    }

    #[test]
    fn envelope_without_result_is_decode_error() {
        let err = decode_envelope::<String>(br#"{"status": 0, "memo": "ok"}"#).unwrap_err();
        assert!(matches!(err, LookupError::Decode(_)));
    }

    #[test]
    fn envelope_tolerates_missing_status_and_memo() {
        let envelope = decode_envelope::<String>(br#"{"result": "A,B"}"#).unwrap();
        assert_eq!(envelope.result, "A,B");
        assert!(envelope.status.is_none());
    }

    #[test]
    fn non_json_body_is_decode_error() {
        let err = decode_envelope::<String>(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, LookupError::Decode(_)));
    }
}
