//! Per-request routing decision.
//!
//! [`decide`] runs the hop pipeline: local center lookup, optional path
//! planning, position resolution, optional next-hop lookup and chain
//! extension. Each step short-circuits on failure, so a returned
//! [`HopDecision`] always carries exactly one terminal action.

use axum::http::{HeaderMap, HeaderValue};

use super::chain;
use super::planner::PathPlanner;
use super::registry::{CenterRegistry, CoCenterInfo};
use super::route::{resolve, GatewayRole, Route, ROUTE_DELIMITER};
use super::{CHAIN_HEADER, ROUTE_HEADER};
use crate::config::model::MissingDestinationPolicy;
use crate::error::CollabError;

/// The parts of an inbound request the pipeline reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct InboundHop<'a> {
    pub destination: Option<&'a str>,
    pub route: Option<&'a str>,
    pub chain: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopAction {
    /// Hand the request to the local handler.
    Deliver,
    /// Send the request on to the next center's gateway.
    Forward(CoCenterInfo),
}

#[derive(Debug, Clone)]
pub struct HopDecision {
    pub local: CoCenterInfo,
    pub role: GatewayRole,
    pub route: Route,
    pub planned: bool,
    pub chain: String,
    pub action: HopAction,
}

impl HopDecision {
    /// Install the route and attribution chain on outgoing headers,
    /// replacing every inbound line of either header.
    pub fn write_headers(&self, headers: &mut HeaderMap) -> Result<(), CollabError> {
        let route = HeaderValue::from_str(&self.route.to_string())
            .map_err(|_| CollabError::InvalidHeader { header: ROUTE_HEADER })?;
        let chain = HeaderValue::from_str(&self.chain)
            .map_err(|_| CollabError::InvalidHeader { header: CHAIN_HEADER })?;
        headers.insert(ROUTE_HEADER, route);
        headers.insert(CHAIN_HEADER, chain);
        Ok(())
    }
}

/// Every line of header `name`, joined with the route delimiter.
///
/// Any line that is not visible ASCII is an [`CollabError::InvalidHeader`].
pub fn read_header(headers: &HeaderMap, name: &'static str) -> Result<Option<String>, CollabError> {
    let mut joined: Option<String> = None;
    for value in headers.get_all(name) {
        let text = value
            .to_str()
            .map_err(|_| CollabError::InvalidHeader { header: name })?;
        match joined.as_mut() {
            Some(acc) => {
                acc.push(ROUTE_DELIMITER);
                acc.push_str(text);
            }
            None => joined = Some(text.to_string()),
        }
    }
    Ok(joined)
}

/// Decide what this gateway does with a request.
///
/// Returns `Ok(None)` when the request names no destination and carries
/// no route and the policy is to pass it through untouched.
pub async fn decide(
    registry: &dyn CenterRegistry,
    planner: &dyn PathPlanner,
    inbound: InboundHop<'_>,
    policy: MissingDestinationPolicy,
) -> Result<Option<HopDecision>, CollabError> {
    let existing = inbound.route.map(Route::parse).unwrap_or_default();
    let destination = inbound.destination.filter(|d| !d.is_empty());

    if destination.is_none() && existing.is_empty() {
        return match policy {
            MissingDestinationPolicy::PassThrough => Ok(None),
            MissingDestinationPolicy::Reject => Err(CollabError::MissingDestination),
        };
    }

    let local = registry.lookup(None).await?;

    let (route, planned) = match destination {
        Some(dest) if existing.is_empty() => (planner.plan(dest).await?, true),
        _ => (existing, false),
    };

    let position = resolve(&local.code, &route)?;

    // A single-element route resolves as origin with nowhere to go.
    let action = match (position.role, position.next.as_deref()) {
        (GatewayRole::Destination, _) | (_, None) => HopAction::Deliver,
        (_, Some(next)) => HopAction::Forward(registry.lookup(Some(next)).await?),
    };

    let chain = chain::append(inbound.chain.unwrap_or(""), position.role, &local.gateway_ip);

    Ok(Some(HopDecision {
        local,
        role: position.role,
        route,
        planned,
        chain,
        action,
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::LookupError;

    fn center(code: &str, last_octet: u8) -> CoCenterInfo {
        CoCenterInfo {
            code: code.into(),
            gateway_ip: format!("10.0.0.{last_octet}"),
            gateway_port: 8000 + u16::from(last_octet),
        }
    }

    struct FakeRegistry {
        local: Option<CoCenterInfo>,
        centers: HashMap<String, CoCenterInfo>,
        lookups: Mutex<Vec<Option<String>>>,
    }

    impl FakeRegistry {
        fn at(local: &str) -> Self {
            let centers: HashMap<String, CoCenterInfo> = [("A", 1), ("B", 2), ("C", 3), ("Z", 26)]
                .into_iter()
                .map(|(code, octet)| (code.to_string(), center(code, octet)))
                .collect();
            Self {
                local: centers.get(local).cloned().or_else(|| Some(center(local, 99))),
                centers,
                lookups: Mutex::new(Vec::new()),
            }
        }

        fn broken() -> Self {
            Self {
                local: None,
                centers: HashMap::new(),
                lookups: Mutex::new(Vec::new()),
            }
        }

        fn lookups(&self) -> Vec<Option<String>> {
            self.lookups.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CenterRegistry for FakeRegistry {
        async fn lookup(&self, code: Option<&str>) -> Result<CoCenterInfo, CollabError> {
            self.lookups.lock().unwrap().push(code.map(String::from));
            let found = match code {
                None => self.local.clone(),
                Some(code) => self.centers.get(code).cloned(),
            };
            found.ok_or_else(|| CollabError::RegistryUnavailable {
                code: code.map(String::from),
                source: LookupError::Timeout(Duration::from_secs(1)),
            })
        }
    }

    struct FakePlanner {
        route: &'static str,
        calls: AtomicUsize,
    }

    impl FakePlanner {
        fn returning(route: &'static str) -> Self {
            Self {
                route,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PathPlanner for FakePlanner {
        async fn plan(&self, destination: &str) -> Result<Route, CollabError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.route.is_empty() {
                return Err(CollabError::PlanningUnavailable {
                    destination: destination.into(),
                    source: LookupError::Decode("planned route is empty".into()),
                });
            }
            Ok(Route::parse(self.route))
        }
    }

    fn with_route(route: &str) -> InboundHop<'_> {
        InboundHop {
            destination: Some("C"),
            route: Some(route),
            chain: None,
        }
    }

    async fn run(
        registry: &FakeRegistry,
        planner: &FakePlanner,
        inbound: InboundHop<'_>,
    ) -> Result<Option<HopDecision>, CollabError> {
        decide(registry, planner, inbound, MissingDestinationPolicy::PassThrough).await
    }

    #[tokio::test]
    async fn origin_forwards_to_next_center() {
        let registry = FakeRegistry::at("A");
        let planner = FakePlanner::returning("A,B,C");
        let decision = run(&registry, &planner, with_route("A,B,C"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(decision.role, GatewayRole::Origin);
        assert_eq!(decision.action, HopAction::Forward(center("B", 2)));
        assert_eq!(decision.chain, "10.0.0.1");
        assert!(!decision.planned);
        assert_eq!(planner.calls(), 0);
        assert_eq!(registry.lookups(), vec![None, Some("B".to_string())]);
    }

    #[tokio::test]
    async fn relay_forwards_and_extends_chain() {
        let registry = FakeRegistry::at("B");
        let planner = FakePlanner::returning("A,B,C");
        let inbound = InboundHop {
            chain: Some("10.0.0.1"),
            ..with_route("A,B,C")
        };
        let decision = run(&registry, &planner, inbound).await.unwrap().unwrap();

        assert_eq!(decision.role, GatewayRole::Relay);
        assert_eq!(decision.action, HopAction::Forward(center("C", 3)));
        assert_eq!(decision.chain, "10.0.0.1,10.0.0.2");
    }

    #[tokio::test]
    async fn destination_delivers_without_next_lookup() {
        let registry = FakeRegistry::at("C");
        let planner = FakePlanner::returning("A,B,C");
        let inbound = InboundHop {
            chain: Some("10.0.0.1,10.0.0.2"),
            ..with_route("A,B,C")
        };
        let decision = run(&registry, &planner, inbound).await.unwrap().unwrap();

        assert_eq!(decision.role, GatewayRole::Destination);
        assert_eq!(decision.action, HopAction::Deliver);
        assert_eq!(decision.chain, "10.0.0.1,10.0.0.2,10.0.0.3");
        assert_eq!(registry.lookups(), vec![None]);
    }

    #[tokio::test]
    async fn empty_route_is_planned_once_and_used() {
        let registry = FakeRegistry::at("A");
        let planner = FakePlanner::returning("A,B,Z");
        let inbound = InboundHop {
            destination: Some("Z"),
            route: Some(""),
            chain: None,
        };
        let decision = run(&registry, &planner, inbound).await.unwrap().unwrap();

        assert_eq!(planner.calls(), 1);
        assert!(decision.planned);
        assert_eq!(decision.route.to_string(), "A,B,Z");
        assert_eq!(decision.action, HopAction::Forward(center("B", 2)));
    }

    #[tokio::test]
    async fn local_lookup_failure_aborts_before_planning() {
        let registry = FakeRegistry::broken();
        let planner = FakePlanner::returning("A,B,C");
        let inbound = InboundHop {
            destination: Some("C"),
            route: None,
            chain: None,
        };
        let err = run(&registry, &planner, inbound).await.unwrap_err();

        assert!(matches!(err, CollabError::RegistryUnavailable { code: None, .. }));
        assert_eq!(planner.calls(), 0);
    }

    #[tokio::test]
    async fn planning_failure_aborts() {
        let registry = FakeRegistry::at("A");
        let planner = FakePlanner::returning("");
        let inbound = InboundHop {
            destination: Some("C"),
            ..InboundHop::default()
        };
        let err = run(&registry, &planner, inbound).await.unwrap_err();
        assert!(matches!(err, CollabError::PlanningUnavailable { .. }));
        assert_eq!(registry.lookups(), vec![None]);
    }

    #[tokio::test]
    async fn next_lookup_failure_aborts() {
        let registry = FakeRegistry::at("A");
        let planner = FakePlanner::returning("A,Q");
        let err = run(&registry, &planner, with_route("A,Q")).await.unwrap_err();
        assert!(matches!(
            err,
            CollabError::RegistryUnavailable { code: Some(ref c), .. } if c == "Q"
        ));
    }

    #[tokio::test]
    async fn local_center_off_route_is_rejected() {
        let registry = FakeRegistry::at("X");
        let planner = FakePlanner::returning("A,B,C");
        let err = run(&registry, &planner, with_route("A,B,C")).await.unwrap_err();
        assert!(matches!(err, CollabError::NotOnRoute { ref code, .. } if code == "X"));
        assert_eq!(registry.lookups(), vec![None]);
    }

    #[tokio::test]
    async fn single_center_route_delivers_locally() {
        let registry = FakeRegistry::at("A");
        let planner = FakePlanner::returning("A");
        let decision = run(&registry, &planner, with_route("A"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.role, GatewayRole::Origin);
        assert_eq!(decision.action, HopAction::Deliver);
        assert_eq!(decision.chain, "10.0.0.1");
    }

    #[tokio::test]
    async fn missing_destination_follows_policy() {
        let registry = FakeRegistry::at("A");
        let planner = FakePlanner::returning("A,B");
        let bare = InboundHop::default();

        let passed = decide(&registry, &planner, bare, MissingDestinationPolicy::PassThrough)
            .await
            .unwrap();
        assert!(passed.is_none());

        let err = decide(&registry, &planner, bare, MissingDestinationPolicy::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, CollabError::MissingDestination));
        assert!(registry.lookups().is_empty());
    }

    #[tokio::test]
    async fn existing_route_without_destination_is_routed() {
        let registry = FakeRegistry::at("B");
        let planner = FakePlanner::returning("A,B,C");
        let inbound = InboundHop {
            destination: None,
            route: Some("A,B,C"),
            chain: Some("10.0.0.1"),
        };
        let decision = decide(&registry, &planner, inbound, MissingDestinationPolicy::Reject)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decision.role, GatewayRole::Relay);
    }

    fn decision(route: &str, chain: &str) -> HopDecision {
        HopDecision {
            local: center("A", 1),
            role: GatewayRole::Origin,
            route: Route::parse(route),
            planned: true,
            chain: chain.into(),
            action: HopAction::Forward(center("B", 2)),
        }
    }

    #[test]
    fn write_headers_replaces_every_inbound_line() {
        let mut headers = HeaderMap::new();
        headers.append(CHAIN_HEADER, HeaderValue::from_static("stale"));
        headers.append(CHAIN_HEADER, HeaderValue::from_static("older"));
        decision("A,B", "10.0.0.1").write_headers(&mut headers).unwrap();
        assert_eq!(headers.get(ROUTE_HEADER).unwrap(), "A,B");
        let chain: Vec<_> = headers.get_all(CHAIN_HEADER).iter().collect();
        assert_eq!(chain, ["10.0.0.1"]);
    }

    #[test]
    fn unencodable_route_fails_instead_of_keeping_old_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ROUTE_HEADER, HeaderValue::from_static("A,B"));
        let err = decision("A,B\nC", "10.0.0.1")
            .write_headers(&mut headers)
            .unwrap_err();
        assert!(matches!(err, CollabError::InvalidHeader { header } if header == ROUTE_HEADER));
        assert_eq!(headers.get(ROUTE_HEADER).unwrap(), "A,B");
    }

    #[test]
    fn read_header_joins_every_line() {
        let mut headers = HeaderMap::new();
        assert_eq!(read_header(&headers, CHAIN_HEADER).unwrap(), None);

        headers.append(CHAIN_HEADER, HeaderValue::from_static("1.1.1.1"));
        headers.append(CHAIN_HEADER, HeaderValue::from_static("2.2.2.2, 3.3.3.3"));
        assert_eq!(
            read_header(&headers, CHAIN_HEADER).unwrap().as_deref(),
            Some("1.1.1.1,2.2.2.2, 3.3.3.3")
        );
    }

    #[test]
    fn read_header_rejects_non_ascii_values() {
        let mut headers = HeaderMap::new();
        headers.append(CHAIN_HEADER, HeaderValue::from_static("1.1.1.1"));
        headers.append(
            CHAIN_HEADER,
            HeaderValue::from_bytes(b"h\xe9te").unwrap(),
        );
        let err = read_header(&headers, CHAIN_HEADER).unwrap_err();
        assert!(matches!(err, CollabError::InvalidHeader { header } if header == CHAIN_HEADER));
    }
}
