//! `hopgate init`: generate a starter configuration file.
//!
//! Creates a YAML, JSON, or TOML config file with either minimal
//! or fully documented templates.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::GatewayError;

pub fn execute(args: &InitArgs) -> Result<(), GatewayError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("hopgate.{}", args.format.extension())));

    if output.exists() {
        return Err(GatewayError::FileExists { path: output });
    }

    std::fs::write(&output, template(&args.format, args.full))?;
    println!("Created {}", output.display());
    Ok(())
}

#[must_use]
pub const fn template(format: &ConfigFormat, full: bool) -> &'static str {
    match (format, full) {
        (ConfigFormat::Yaml, false) => YAML_MINIMAL,
        (ConfigFormat::Yaml, true) => YAML_FULL,
        // JSON has no comments; the full template spells out every default.
        (ConfigFormat::Json, false) => JSON_MINIMAL,
        (ConfigFormat::Json, true) => JSON_FULL,
        (ConfigFormat::Toml, false) => TOML_MINIMAL,
        (ConfigFormat::Toml, true) => TOML_FULL,
    }
}

const YAML_MINIMAL: &str = r#"# hopgate config

gateway:
  agent_url: "http://localhost:9000"

upstream:
  url: "http://localhost:8080"
"#;

const YAML_FULL: &str = r#"# hopgate config
#
# All values shown are defaults unless marked required.

gateway:
  # Collaboration agent serving /co/center/* and /net/path/optimum (required)
  agent_url: "http://localhost:9000"
  # lookup_timeout: 15000              # ms, bounds every agent call
  # destination_param: destCenterCode  # query parameter naming the destination center
  # on_missing_destination: pass_through   # or: reject (answers 417)
  # forward_mode: proxy                # or: redirect (308 to the next gateway)
  # hop_scheme: http                   # scheme used to reach the next gateway

# Local service that receives requests addressed to this center (required)
upstream:
  url: "http://localhost:8080"
  # timeout: 5000                      # ms, defaults.timeout when unset

# defaults:
#   timeout: 5000              # ms, for forwarded and delivered requests
#   forward_headers: true      # Forward client headers
#   proxy_headers: true        # Add X-Forwarded-Proto/Host, Via, X-Correlation-Id
#   strip_hop_by_hop: true     # Strip Connection, TE, etc.
#   headers:
#     add: {}                  # Headers added to every outgoing request
#     strip: []                # Headers removed from every outgoing request
"#;

const JSON_MINIMAL: &str = r#"{
  "gateway": {
    "agent_url": "http://localhost:9000"
  },
  "upstream": {
    "url": "http://localhost:8080"
  }
}
"#;

const JSON_FULL: &str = r#"{
  "gateway": {
    "agent_url": "http://localhost:9000",
    "lookup_timeout": 15000,
    "destination_param": "destCenterCode",
    "on_missing_destination": "pass_through",
    "forward_mode": "proxy",
    "hop_scheme": "http"
  },
  "upstream": {
    "url": "http://localhost:8080",
    "timeout": 5000
  },
  "defaults": {
    "timeout": 5000,
    "forward_headers": true,
    "proxy_headers": true,
    "strip_hop_by_hop": true,
    "headers": {
      "add": {},
      "strip": []
    }
  }
}
"#;

const TOML_MINIMAL: &str = r#"# hopgate config

[gateway]
agent_url = "http://localhost:9000"

[upstream]
url = "http://localhost:8080"
"#;

const TOML_FULL: &str = r#"# hopgate config
#
# All values shown are defaults unless marked required.

[gateway]
# Collaboration agent serving /co/center/* and /net/path/optimum (required)
agent_url = "http://localhost:9000"
# lookup_timeout = 15000
# destination_param = "destCenterCode"
# on_missing_destination = "pass_through"   # or "reject"
# forward_mode = "proxy"                     # or "redirect"
# hop_scheme = "http"

# Local service that receives requests addressed to this center (required)
[upstream]
url = "http://localhost:8080"
# timeout = 5000

[defaults]
# timeout = 5000
# forward_headers = true
# proxy_headers = true
# strip_hop_by_hop = true

# [defaults.headers]
# add = {}
# strip = []
"#;
