//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the gateway
//! version, uptime, config source metadata, the agent and upstream it
//! talks to, and cumulative routing statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
    pub agent_url: String,
    pub upstream_url: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_delivered: u64,
    pub requests_relayed: u64,
    pub requests_rejected: u64,
    pub requests_failed: u64,
    pub config_reloads: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (config, source_name, version_str, loaded_ago) = {
        let loaded = state.config.read().await;
        let version_str = match &loaded.version {
            crate::config::ConfigVersion::Hash(h) => h.get(..8).unwrap_or(h).to_string(),
        };
        (
            Arc::clone(&loaded.config),
            loaded.source_name.clone(),
            version_str,
            loaded.loaded_at.elapsed().as_secs(),
        )
    };

    let stats = &state.stats;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: source_name,
            version: version_str,
            loaded_ago_seconds: loaded_ago,
            agent_url: config.gateway.agent_url.clone(),
            upstream_url: config.upstream.url.clone(),
        },
        stats: StatsResponse {
            requests_delivered: stats.delivered.load(Ordering::Relaxed),
            requests_relayed: stats.relayed.load(Ordering::Relaxed),
            requests_rejected: stats.rejected.load(Ordering::Relaxed),
            requests_failed: stats.failed.load(Ordering::Relaxed),
            config_reloads: stats.config_reloads.load(Ordering::Relaxed),
        },
    })
}
