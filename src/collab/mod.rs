//! Multi-hop collaboration routing.
//!
//! A request bound for a remote collaboration center passes through a
//! chain of gateways. Each gateway works out whether it is the origin, a
//! relay or the destination of the request's route, extends the
//! attribution chain, and either delivers locally or forwards to the
//! next center's gateway.
//!
//! - [`route`] -- route parsing and position resolution.
//! - [`chain`] -- attribution chain extension.
//! - [`agent`] -- HTTP client for the collaboration agent.
//! - [`registry`] -- center gateway lookups.
//! - [`planner`] -- path planning for unrouted requests.
//! - [`dispatch`] -- the per-request decision pipeline.

pub mod agent;
pub mod chain;
pub mod dispatch;
pub mod planner;
pub mod registry;
pub mod route;

pub use agent::CocoAgent;
pub use dispatch::{decide, read_header, HopAction, HopDecision, InboundHop};
pub use planner::PathPlanner;
pub use registry::{CenterRegistry, CoCenterInfo};
pub use route::{resolve, CenterCode, GatewayRole, Route};

/// Header carrying the comma-delimited route between gateways.
pub const ROUTE_HEADER: &str = "x-route-path";

/// Header carrying the attribution chain.
pub const CHAIN_HEADER: &str = "x-forwarded-for";
