//! Unified error types for hopgate.
//!
//! Defines [`GatewayError`] (process-level failures), [`ValidationError`]
//! for config validation, [`CollabError`] for the per-request routing
//! pipeline, and [`LookupError`] describing why an agent call failed.
//! All use `thiserror` for `Display` and `Error` derives.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub section: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}.{}: {}", self.section, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}

/// Why a single call to the collaboration agent failed.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("unexpected status {0}")]
    Status(hyper::StatusCode),

    #[error("undecodable response: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Failures of the collaboration routing pipeline. Every variant is
/// surfaced to the client as `417 Expectation Failed`.
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("center info lookup for {} failed: {source}", .code.as_deref().unwrap_or("local center"))]
    RegistryUnavailable {
        code: Option<String>,
        #[source]
        source: LookupError,
    },

    #[error("path planning to '{destination}' failed: {source}")]
    PlanningUnavailable {
        destination: String,
        #[source]
        source: LookupError,
    },

    #[error("center '{code}' is not on route '{route}'")]
    NotOnRoute { code: String, route: String },

    #[error("request carries neither a destination center nor a route")]
    MissingDestination,

    #[error("header '{header}' is not a valid visible-ASCII value")]
    InvalidHeader { header: &'static str },
}

impl CollabError {
    /// Short machine-friendly label for structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RegistryUnavailable { .. } => "registry_unavailable",
            Self::PlanningUnavailable { .. } => "planning_unavailable",
            Self::NotOnRoute { .. } => "not_on_route",
            Self::MissingDestination => "missing_destination",
            Self::InvalidHeader { .. } => "invalid_header",
        }
    }
}
