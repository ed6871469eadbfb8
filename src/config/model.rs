//! Serde data structures for the hopgate configuration file.
//!
//! Contains [`Config`] (the root), [`GatewayConfig`], [`Upstream`],
//! [`Defaults`], and [`HeaderRules`]. All types derive `Serialize` and
//! `Deserialize` with `deny_unknown_fields` for strict parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const fn default_timeout() -> u64 {
    5000
}

const fn default_lookup_timeout() -> u64 {
    15_000
}

const fn default_true() -> bool {
    true
}

fn default_destination_param() -> String {
    crate::collab::planner::DESTINATION_CODE_PARAM.to_string()
}

fn default_hop_scheme() -> String {
    "http".to_string()
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_default_lookup_timeout(v: &u64) -> bool {
    *v == default_lookup_timeout()
}

fn is_default_destination_param(v: &str) -> bool {
    v == default_destination_param()
}

fn is_default_hop_scheme(v: &str) -> bool {
    v == "http"
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_default_defaults(v: &Defaults) -> bool {
    v.timeout == default_timeout()
        && v.forward_headers
        && v.proxy_headers
        && v.strip_hop_by_hop
        && v.headers.is_default()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub gateway: GatewayConfig,

    pub upstream: Upstream,

    #[serde(default, skip_serializing_if = "is_default_defaults")]
    pub defaults: Defaults,
}

/// What to do with a request that names no destination and carries no route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDestinationPolicy {
    #[default]
    PassThrough,
    Reject,
}

/// How a request reaches the next gateway on its route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardMode {
    /// Replay the request to the next hop and relay its response.
    #[default]
    Proxy,
    /// Answer `308 Permanent Redirect` pointing at the next hop.
    ///
    /// The route and chain are echoed as headers on the 308 response only.
    /// Clients do not copy response headers onto the redirected request, so
    /// unless the caller carries them over itself the next gateway plans the
    /// route again and starts a new chain.
    Redirect,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Base URL of the collaboration agent (registry and path planner).
    pub agent_url: String,

    #[serde(
        default = "default_lookup_timeout",
        skip_serializing_if = "is_default_lookup_timeout"
    )]
    pub lookup_timeout: u64,

    #[serde(
        default = "default_destination_param",
        skip_serializing_if = "is_default_destination_param"
    )]
    pub destination_param: String,

    #[serde(default)]
    pub on_missing_destination: MissingDestinationPolicy,

    #[serde(default)]
    pub forward_mode: ForwardMode,

    #[serde(
        default = "default_hop_scheme",
        skip_serializing_if = "is_default_hop_scheme"
    )]
    pub hop_scheme: String,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(agent_url: impl Into<String>) -> Self {
        Self {
            agent_url: agent_url.into(),
            lookup_timeout: default_lookup_timeout(),
            destination_param: default_destination_param(),
            on_missing_destination: MissingDestinationPolicy::default(),
            forward_mode: ForwardMode::default(),
            hop_scheme: default_hop_scheme(),
        }
    }
}

/// The local service behind this gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Upstream {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    #[serde(
        default = "default_timeout",
        skip_serializing_if = "is_default_timeout"
    )]
    pub timeout: u64,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub forward_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub proxy_headers: bool,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub strip_hop_by_hop: bool,

    #[serde(default, skip_serializing_if = "HeaderRules::is_default")]
    pub headers: HeaderRules,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            forward_headers: default_true(),
            proxy_headers: default_true(),
            strip_hop_by_hop: default_true(),
            headers: HeaderRules::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderRules {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub add: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strip: Vec<String>,
}

impl HeaderRules {
    fn is_default(&self) -> bool {
        self.add.is_empty() && self.strip.is_empty()
    }
}
