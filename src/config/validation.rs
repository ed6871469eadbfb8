//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as malformed agent or upstream URLs, an unusable
//! destination parameter, bad hop schemes, zero timeouts, and invalid
//! header rules. Returns a list of [`ValidationError`] values with
//! per-field suggestions.

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use super::model::{Config, HeaderRules};
use crate::collab::{CHAIN_HEADER, ROUTE_HEADER};
use crate::error::ValidationError;

/// Validate a base URL. Returns `Ok(())` or a human-readable error.
pub fn validate_http_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.query().is_some() || parsed.fragment().is_some() {
                Err("base URL cannot carry a query or fragment".into())
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

/// Validate the destination query parameter name.
pub fn validate_query_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("parameter name cannot be empty".into());
    }
    if key
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '&' | '=' | '#' | '?'))
    {
        return Err(format!("'{key}' is not usable as a query parameter name"));
    }
    Ok(())
}

fn push(errors: &mut Vec<ValidationError>, section: &str, field: &str, message: String) {
    errors.push(ValidationError {
        section: section.into(),
        field: field.into(),
        message,
        suggestion: None,
    });
}

fn is_collaboration_header(name: &HeaderName) -> bool {
    *name == ROUTE_HEADER || *name == CHAIN_HEADER
}

fn validate_header_rules(errors: &mut Vec<ValidationError>, rules: &HeaderRules) {
    for (key, value) in &rules.add {
        match key.parse::<HeaderName>() {
            Err(_) => {
                push(errors, "defaults", "headers.add", format!("'{key}' is not a valid header name"));
            }
            Ok(name) if is_collaboration_header(&name) => {
                push(errors, "defaults", "headers.add", format!("'{key}' is set by hop routing and cannot be added"));
            }
            Ok(_) if HeaderValue::from_str(value).is_err() => {
                push(errors, "defaults", "headers.add", format!("value for '{key}' is not a valid header value"));
            }
            Ok(_) => {}
        }
    }
    for key in &rules.strip {
        match key.parse::<HeaderName>() {
            Err(_) => {
                push(errors, "defaults", "headers.strip", format!("'{key}' is not a valid header name"));
            }
            Ok(name) if is_collaboration_header(&name) => {
                push(errors, "defaults", "headers.strip", format!("'{key}' is set by hop routing and cannot be stripped"));
            }
            Ok(_) => {}
        }
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let gateway = &config.gateway;

    if let Err(msg) = validate_http_url(&gateway.agent_url) {
        errors.push(ValidationError {
            section: "gateway".into(),
            field: "agent_url".into(),
            message: msg,
            suggestion: if gateway.agent_url.contains("://") {
                None
            } else {
                Some(format!("did you mean 'http://{}'?", gateway.agent_url))
            },
        });
    }

    if gateway.lookup_timeout == 0 {
        push(&mut errors, "gateway", "lookup_timeout", "must be greater than 0".into());
    }

    if let Err(msg) = validate_query_key(&gateway.destination_param) {
        push(&mut errors, "gateway", "destination_param", msg);
    }

    if gateway.hop_scheme != "http" && gateway.hop_scheme != "https" {
        errors.push(ValidationError {
            section: "gateway".into(),
            field: "hop_scheme".into(),
            message: format!("unsupported scheme '{}'", gateway.hop_scheme),
            suggestion: Some("expected http or https".into()),
        });
    }

    if let Err(msg) = validate_http_url(&config.upstream.url) {
        errors.push(ValidationError {
            section: "upstream".into(),
            field: "url".into(),
            message: msg,
            suggestion: if config.upstream.url.contains("://") {
                None
            } else {
                Some(format!("did you mean 'http://{}'?", config.upstream.url))
            },
        });
    }

    if config.upstream.timeout == Some(0) {
        push(&mut errors, "upstream", "timeout", "must be greater than 0".into());
    }

    if config.defaults.timeout == 0 {
        push(&mut errors, "defaults", "timeout", "must be greater than 0".into());
    }

    validate_header_rules(&mut errors, &config.defaults.headers);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let gateway = &config.gateway;
    let upstream_timeout = config.upstream.timeout.map_or_else(
        || format!("{}ms (default)", config.defaults.timeout),
        |t| format!("{t}ms"),
    );

    let lines = [
        format!("  agent:       {}", gateway.agent_url),
        format!("  lookups:     {}ms timeout", gateway.lookup_timeout),
        format!(
            "  destination: ?{}= (missing: {:?})",
            gateway.destination_param, gateway.on_missing_destination
        ),
        format!(
            "  next hop:    {:?} over {}",
            gateway.forward_mode, gateway.hop_scheme
        ),
        format!("  upstream:    {} ({upstream_timeout})", config.upstream.url),
    ];

    format!("{} is valid\n{}", path, lines.join("\n"))
}
