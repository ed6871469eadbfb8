//! `hopgate run`: start the gateway.
//!
//! Loads configuration from a file source, applies CLI overrides, starts
//! the Axum HTTP server with graceful shutdown, and spawns a background
//! config refresh loop for hot-reloading.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::RunArgs;
use crate::config::model::Config;
use crate::config::sources::FileSource;
use crate::config::{validation, ConfigSource};
use crate::error::GatewayError;
use crate::logging;
use crate::server::{self, AppState, LoadedConfig};

/// CLI values that win over the config file, re-applied on every reload.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub agent_url: Option<String>,
    pub lookup_timeout: Option<u64>,
}

impl Overrides {
    #[must_use]
    pub fn from_args(args: &RunArgs) -> Self {
        Self {
            agent_url: args.agent_url.clone(),
            lookup_timeout: args.lookup_timeout,
        }
    }

    pub fn apply(&self, mut config: Config) -> Result<Config, GatewayError> {
        if let Some(ref url) = self.agent_url {
            config.gateway.agent_url.clone_from(url);
        }
        if let Some(timeout) = self.lookup_timeout {
            config.gateway.lookup_timeout = timeout;
        }
        validation::validate(&config).map_err(|errors| GatewayError::ConfigValidation { errors })?;
        Ok(config)
    }
}

pub async fn execute(args: RunArgs) -> Result<(), GatewayError> {
    logging::init(&args.log_level, logging::resolve_format(args.pretty, args.json));

    let source = resolve_config_source(&args).await?;
    let overrides = Overrides::from_args(&args);
    let (config, version) = source.load().await?;
    let config = overrides.apply(config)?;

    let agent_url = config.gateway.agent_url.clone();
    let upstream_url = config.upstream.url.clone();

    let state = Arc::new(AppState::new(
        LoadedConfig {
            config: Arc::new(config),
            version,
            source_name: source.name().to_string(),
            loaded_at: Instant::now(),
        },
        server::build_http_client(),
    ));

    // Shutdown signal: dropping shutdown_tx closes the channel and stops the refresh loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let refresh_state = Arc::clone(&state);
    let poll_interval = args.poll_interval;
    let refresh_handle = tokio::spawn(async move {
        config_refresh_loop(refresh_state, source, overrides, poll_interval, shutdown_rx).await;
    });

    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        agent = %agent_url,
        upstream = %upstream_url,
        "hopgate started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "config refresh task failed");
    }

    tracing::info!("hopgate stopped");
    Ok(())
}

async fn resolve_config_source(args: &RunArgs) -> Result<Box<dyn ConfigSource>, GatewayError> {
    resolve_file_source(args.config.as_deref())
        .await?
        .ok_or_else(|| GatewayError::NoConfigSource {
            hint: "Provide --config <file>.\n  \
                   Run 'hopgate init' to create a config file."
                .into(),
        })
}

async fn resolve_file_source(
    explicit: Option<&Path>,
) -> Result<Option<Box<dyn ConfigSource>>, GatewayError> {
    if let Some(path) = explicit {
        return create_file_source(path).map(Some);
    }

    let candidates = ["hopgate.yaml", "hopgate.yml", "hopgate.json", "hopgate.toml"];

    for name in &candidates {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return create_file_source(&path).map(Some);
        }
    }

    Ok(None)
}

fn create_file_source(path: &Path) -> Result<Box<dyn ConfigSource>, GatewayError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(FileSource::yaml(path.to_path_buf()))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(FileSource::json(path.to_path_buf()))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(FileSource::toml(path.to_path_buf()))),

        other => Err(GatewayError::UnsupportedFormat(other.to_string())),
    }
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    source: Box<dyn ConfigSource>,
    overrides: Overrides,
    interval_secs: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        let current_version = state.config.read().await.version.clone();

        match source.has_changed(&current_version).await {
            Ok(true) => {
                tracing::info!("config change detected, reloading");
                let reloaded = match source.load().await {
                    Ok((config, version)) => overrides.apply(config).map(|c| (c, version)),
                    Err(e) => Err(e),
                };
                match reloaded {
                    Ok((config, version)) => {
                        let agent = config.gateway.agent_url.clone();
                        let mut loaded = state.config.write().await;
                        loaded.config = Arc::new(config);
                        loaded.version = version;
                        loaded.loaded_at = Instant::now();
                        drop(loaded);
                        state.stats.config_reloads.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(agent = %agent, "config reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "config reload failed, keeping current config");
                    }
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "config change check failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{Defaults, GatewayConfig, Upstream};

    fn config() -> Config {
        Config {
            gateway: GatewayConfig::new("http://agent:9000"),
            upstream: Upstream {
                url: "http://app:8080".into(),
                timeout: None,
            },
            defaults: Defaults::default(),
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let overrides = Overrides {
            agent_url: Some("http://coco:9100".into()),
            lookup_timeout: Some(2000),
        };
        let config = overrides.apply(config()).unwrap();
        assert_eq!(config.gateway.agent_url, "http://coco:9100");
        assert_eq!(config.gateway.lookup_timeout, 2000);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let overrides = Overrides {
            agent_url: Some("coco".into()),
            lookup_timeout: None,
        };
        assert!(matches!(
            overrides.apply(config()),
            Err(GatewayError::ConfigValidation { .. })
        ));
    }

    #[cfg(feature = "yaml")]
    #[tokio::test]
    async fn explicit_file_is_loaded_and_tracked() {
        let dir = std::env::temp_dir().join(format!("hopgate-run-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("edge.yaml");
        std::fs::write(
            &path,
            "gateway:\n  agent_url: http://coco:9000\nupstream:\n  url: http://app:8080\n",
        )
        .unwrap();

        let source = resolve_file_source(Some(&path)).await.unwrap().unwrap();
        assert_eq!(source.name(), "yaml");
        let (config, version) = source.load().await.unwrap();
        assert_eq!(config.gateway.agent_url, "http://coco:9000");
        assert!(!source.has_changed(&version).await.unwrap());

        std::fs::write(
            &path,
            "gateway:\n  agent_url: http://coco:9100\nupstream:\n  url: http://app:8080\n",
        )
        .unwrap();
        assert!(source.has_changed(&version).await.unwrap());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[cfg(feature = "yaml")]
    #[tokio::test]
    async fn missing_explicit_file_fails_to_load() {
        let source = resolve_file_source(Some(Path::new("/nonexistent/hopgate.yaml")))
            .await
            .unwrap()
            .unwrap();
        assert!(source.load().await.is_err());
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let result = create_file_source(Path::new("edge.ini"));
        assert!(matches!(result, Err(GatewayError::UnsupportedFormat(ref e)) if e == "ini"));
    }
}
