//! Shared harness: fake collaboration agents, echo upstreams, and gateways
//! listening on ephemeral loopback ports.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use hopgate::config::model::{Config, Defaults, GatewayConfig, Upstream};
use hopgate::config::ConfigVersion;
use hopgate::server::{self, AppState, LoadedConfig};

pub const LOOPBACK: &str = "127.0.0.1";

/// Serve `router` on an ephemeral port until the returned sender fires or drops.
pub async fn serve(router: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    serve_on(listener, router)
}

pub fn serve_on(listener: TcpListener, router: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

/// URL of a port nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn gateway_config(agent_url: &str, upstream_url: &str) -> Config {
    let mut gateway = GatewayConfig::new(agent_url);
    gateway.lookup_timeout = 2000;
    Config {
        gateway,
        upstream: Upstream {
            url: upstream_url.into(),
            timeout: None,
        },
        defaults: Defaults {
            timeout: 5000,
            ..Defaults::default()
        },
    }
}

pub fn gateway_state(config: Config) -> Arc<AppState> {
    Arc::new(AppState::new(
        LoadedConfig {
            config: Arc::new(config),
            version: ConfigVersion::Hash("0123456789abcdef".into()),
            source_name: "test".into(),
            loaded_at: Instant::now(),
        },
        server::build_http_client(),
    ))
}

pub fn start_gateway_on(
    listener: TcpListener,
    config: Config,
) -> (SocketAddr, Arc<AppState>, oneshot::Sender<()>) {
    let state = gateway_state(config);
    let router = server::build_router(Arc::clone(&state), 1_048_576);
    let (addr, shutdown) = serve_on(listener, router);
    (addr, state, shutdown)
}

pub async fn start_gateway(config: Config) -> (SocketAddr, Arc<AppState>, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    start_gateway_on(listener, config)
}

// -- Fake collaboration agent --

#[derive(Clone)]
pub struct FakeAgent {
    pub local: String,
    /// Center code to gateway port; every gateway listens on loopback.
    pub centers: Arc<HashMap<String, u16>>,
    /// Destination code to planned route.
    pub routes: Arc<HashMap<String, String>>,
    pub optimum_calls: Arc<AtomicUsize>,
    pub delay: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextParams {
    co_center_code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptimumParams {
    dest_center_code: String,
}

fn envelope(result: serde_json::Value) -> Response {
    Json(json!({"status": 0, "memo": "ok", "result": result})).into_response()
}

fn center_json(code: &str, port: u16) -> serde_json::Value {
    // Alternate numeric and ":port" string encodings, both seen in the wild.
    if code.bytes().next().unwrap_or(0) % 2 == 0 {
        json!({"code": code, "gatewayIp": LOOPBACK, "gatewayPort": format!(":{port}")})
    } else {
        json!({"code": code, "gatewayIp": LOOPBACK, "gatewayPort": port})
    }
}

async fn local_center(State(agent): State<FakeAgent>) -> Response {
    tokio::time::sleep(agent.delay).await;
    match agent.centers.get(&agent.local) {
        Some(port) => envelope(center_json(&agent.local, *port)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn next_center(State(agent): State<FakeAgent>, Query(params): Query<NextParams>) -> Response {
    match agent.centers.get(&params.co_center_code) {
        Some(port) => envelope(center_json(&params.co_center_code, *port)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn optimum_path(
    State(agent): State<FakeAgent>,
    Query(params): Query<OptimumParams>,
) -> Response {
    agent.optimum_calls.fetch_add(1, Ordering::SeqCst);
    match agent.routes.get(&params.dest_center_code) {
        Some(route) => envelope(json!(route)),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

impl FakeAgent {
    pub fn router(self) -> Router {
        Router::new()
            .route("/co/center/local", get(local_center))
            .route("/co/center/next", get(next_center))
            .route("/net/path/optimum", get(optimum_path))
            .with_state(self)
    }
}

// -- Echo upstream --

/// An upstream that reports what it received, tagged with its center code.
pub fn echo_upstream(center: &'static str) -> Router {
    Router::new().fallback(
        move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| async move {
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            };
            Json(json!({
                "center": center,
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query(),
                "route": header("x-route-path"),
                "chain": header("x-forwarded-for"),
                "correlation_id": header("x-correlation-id"),
                "body": String::from_utf8_lossy(&body),
            }))
        },
    )
}

// -- A mesh of gateways, one per center --

pub struct Node {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub optimum_calls: Arc<AtomicUsize>,
}

impl Node {
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{path_and_query}", self.addr)
    }

    pub fn planned(&self) -> usize {
        self.optimum_calls.load(Ordering::SeqCst)
    }
}

pub struct Mesh {
    pub nodes: HashMap<&'static str, Node>,
    shutdowns: Vec<oneshot::Sender<()>>,
}

impl Mesh {
    /// One gateway, agent, and echo upstream per center in `codes`.
    /// `routes` maps destination codes to the route the planner returns.
    pub async fn start(
        codes: &[&'static str],
        routes: &[(&str, &str)],
        configure: impl Fn(&mut Config),
    ) -> Self {
        let mut listeners = Vec::new();
        let mut ports = HashMap::new();
        for code in codes {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            ports.insert((*code).to_string(), listener.local_addr().unwrap().port());
            listeners.push((*code, listener));
        }

        let centers = Arc::new(ports);
        let routes: Arc<HashMap<String, String>> = Arc::new(
            routes
                .iter()
                .map(|(dest, route)| ((*dest).to_string(), (*route).to_string()))
                .collect(),
        );

        let mut nodes = HashMap::new();
        let mut shutdowns = Vec::new();
        for (code, listener) in listeners {
            let optimum_calls = Arc::new(AtomicUsize::new(0));
            let agent = FakeAgent {
                local: code.to_string(),
                centers: Arc::clone(&centers),
                routes: Arc::clone(&routes),
                optimum_calls: Arc::clone(&optimum_calls),
                delay: Duration::ZERO,
            };
            let (agent_addr, tx) = serve(agent.router()).await;
            shutdowns.push(tx);
            let (upstream_addr, tx) = serve(echo_upstream(code)).await;
            shutdowns.push(tx);

            let mut config =
                gateway_config(&format!("http://{agent_addr}"), &format!("http://{upstream_addr}"));
            configure(&mut config);
            let (addr, state, tx) = start_gateway_on(listener, config);
            shutdowns.push(tx);

            nodes.insert(
                code,
                Node {
                    addr,
                    state,
                    optimum_calls,
                },
            );
        }

        Self { nodes, shutdowns }
    }

    pub fn node(&self, code: &str) -> &Node {
        &self.nodes[code]
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        for tx in self.shutdowns.drain(..) {
            let _ = tx.send(());
        }
    }
}
