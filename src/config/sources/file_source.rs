//! Generic async file-based config source with SHA256 change detection.
//!
//! [`FileSource`] implements [`ConfigSource`] for any file format by
//! accepting a deserialization function at construction time. Every
//! load re-reads the file, validates the gateway config, and hashes the
//! raw bytes so the refresh loop can tell when the file was edited.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::sha256_hex;
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::{ConfigSource, ConfigVersion};
use crate::error::GatewayError;

pub type DeserializeFn = fn(&str) -> Result<Config, Box<dyn std::error::Error + Send + Sync>>;

pub struct FileSource {
    path: PathBuf,
    name: &'static str,
    deserialize: DeserializeFn,
}

impl FileSource {
    #[must_use]
    pub fn new(path: PathBuf, name: &'static str, deserialize: DeserializeFn) -> Self {
        Self {
            path,
            name,
            deserialize,
        }
    }

    #[cfg(feature = "yaml")]
    #[must_use]
    pub fn yaml(path: PathBuf) -> Self {
        Self::new(path, "yaml", |content| {
            serde_yml::from_str::<Config>(content)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
    }

    #[cfg(feature = "json")]
    #[must_use]
    pub fn json(path: PathBuf) -> Self {
        Self::new(path, "json", |content| {
            serde_json::from_str::<Config>(content)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
    }

    #[cfg(feature = "toml")]
    #[must_use]
    pub fn toml(path: PathBuf) -> Self {
        Self::new(path, "toml", |content| {
            toml::from_str::<Config>(content)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_content(&self) -> Result<String, GatewayError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => GatewayError::ConfigFileNotFound {
                    path: self.path.clone(),
                },
                _ => GatewayError::Io(e),
            })
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn load(&self) -> Result<(Config, ConfigVersion), GatewayError> {
        let content = self.read_content().await?;

        let config = (self.deserialize)(&content).map_err(|source| GatewayError::ConfigParse {
            path: self.path.display().to_string(),
            source,
        })?;
        validate(&config).map_err(|errors| GatewayError::ConfigValidation { errors })?;

        tracing::debug!(
            path = %self.path.display(),
            agent = %config.gateway.agent_url,
            upstream = %config.upstream.url,
            "config file loaded"
        );

        Ok((config, ConfigVersion::Hash(sha256_hex(content.as_bytes()))))
    }

    async fn has_changed(&self, current: &ConfigVersion) -> Result<bool, GatewayError> {
        let content = self.read_content().await?;
        Ok(*current != ConfigVersion::Hash(sha256_hex(content.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_source(path: PathBuf) -> FileSource {
        FileSource::new(path, "json", |content| {
            serde_json::from_str::<Config>(content)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
    }

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hopgate-{}-{name}", std::process::id()))
    }

    const VALID: &str = r#"{"gateway": {"agent_url": "http://agent:9000"}, "upstream": {"url": "http://app:8080"}}"#;

    #[tokio::test]
    async fn loads_and_detects_edits() {
        let path = scratch("edits.json");
        tokio::fs::write(&path, VALID).await.unwrap();
        let source = json_source(path.clone());

        let (config, version) = source.load().await.unwrap();
        assert_eq!(config.gateway.agent_url, "http://agent:9000");
        assert!(!source.has_changed(&version).await.unwrap());

        tokio::fs::write(&path, VALID.replace("9000", "9001"))
            .await
            .unwrap();
        assert!(source.has_changed(&version).await.unwrap());

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_file_is_reported_by_path() {
        let path = scratch("absent.json");
        let err = json_source(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, GatewayError::ConfigFileNotFound { path: ref p } if *p == path));
    }

    #[tokio::test]
    async fn invalid_config_fails_validation() {
        let path = scratch("invalid.json");
        tokio::fs::write(&path, VALID.replace("http://app:8080", "app"))
            .await
            .unwrap();
        let err = json_source(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, GatewayError::ConfigValidation { .. }));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
