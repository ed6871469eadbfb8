//! Hopgate is a multi-hop collaboration gateway.
//!
//! Each instance fronts one center. It asks the local collaboration agent
//! which center it is, reads or plans the ordered route a request must take,
//! records itself in the forwarding chain, and either delivers the request to
//! the local upstream or relays it to the next center's gateway.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`collab`] -- Route resolution, chain bookkeeping, and the agent client
//!   behind the [`CenterRegistry`](collab::CenterRegistry) and
//!   [`PathPlanner`](collab::PathPlanner) traits.
//! - [`config`] -- Configuration loading, validation, and hot-reloading via the
//!   [`ConfigSource`](config::ConfigSource) trait.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`middleware`] -- The collaboration middleware that decides every hop.
//! - [`proxy`] -- HTTP forwarding to the next gateway or the local upstream.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `file-backends` | All file format backends |
//! | `full` | All features |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod collab;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod proxy;
pub mod server;
