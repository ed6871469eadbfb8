//! Center-info lookups.
//!
//! [`CenterRegistry`] answers "where is the gateway of center X". `None`
//! asks for the local center. Answers are fetched fresh for every
//! request; nothing is cached here.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use super::agent::{CocoAgent, CO_CENTER_LOCAL_PATH, CO_CENTER_NEXT_PATH};
use super::route::CenterCode;
use crate::error::CollabError;

pub const CENTER_CODE_PARAM: &str = "coCenterCode";

/// Network endpoint of a center's gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoCenterInfo {
    pub code: CenterCode,
    pub gateway_ip: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub gateway_port: u16,
}

impl CoCenterInfo {
    /// `host:port`, with IPv6 literals bracketed.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.gateway_ip.contains(':') && !self.gateway_ip.starts_with('[') {
            format!("[{}]:{}", self.gateway_ip, self.gateway_port)
        } else {
            format!("{}:{}", self.gateway_ip, self.gateway_port)
        }
    }

    /// Absolute URL of `path_and_query` on this gateway.
    #[must_use]
    pub fn url_for(&self, scheme: &str, path_and_query: &str) -> String {
        format!("{scheme}://{}{path_and_query}", self.authority())
    }
}

/// Ports arrive as a number, a string, or a `:`-prefixed string.
fn deserialize_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => Ok(port),
        PortRepr::Text(text) => text
            .trim()
            .trim_start_matches(':')
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid gateway port '{text}'"))),
    }
}

#[async_trait]
pub trait CenterRegistry: Send + Sync {
    async fn lookup(&self, code: Option<&str>) -> Result<CoCenterInfo, CollabError>;
}

#[async_trait]
impl CenterRegistry for CocoAgent {
    async fn lookup(&self, code: Option<&str>) -> Result<CoCenterInfo, CollabError> {
        let url = match code {
            Some(code) => self.endpoint(CO_CENTER_NEXT_PATH, Some((CENTER_CODE_PARAM, code))),
            None => self.endpoint(CO_CENTER_LOCAL_PATH, None),
        };

        self.get_result::<CoCenterInfo>(&url)
            .await
            .map_err(|source| CollabError::RegistryUnavailable {
                code: code.map(String::from),
                source,
            })
    }
}
