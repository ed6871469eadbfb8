//! Path planning for requests that arrive without a route.

use async_trait::async_trait;

use super::agent::{CocoAgent, OPTIMAL_NET_PATH_PATH};
use super::route::Route;
use crate::error::{CollabError, LookupError};

pub const DESTINATION_CODE_PARAM: &str = "destCenterCode";

#[async_trait]
pub trait PathPlanner: Send + Sync {
    /// Planned route from the local center to `destination`, both inclusive.
    async fn plan(&self, destination: &str) -> Result<Route, CollabError>;
}

#[async_trait]
impl PathPlanner for CocoAgent {
    async fn plan(&self, destination: &str) -> Result<Route, CollabError> {
        let url = self.endpoint(
            OPTIMAL_NET_PATH_PATH,
            Some((DESTINATION_CODE_PARAM, destination)),
        );

        let planning_failed = |source| CollabError::PlanningUnavailable {
            destination: destination.to_string(),
            source,
        };

        let text = self.get_result::<String>(&url).await.map_err(planning_failed)?;
        let route = parse_planned(&text).map_err(planning_failed)?;

        tracing::debug!(destination = %destination, route = %route, "path planned");
        Ok(route)
    }
}

fn parse_planned(text: &str) -> Result<Route, LookupError> {
    let route = Route::parse(text);
    if route.is_empty() {
        return Err(LookupError::Decode("planned route is empty".into()));
    }
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_route_is_split_in_order() {
        let route = parse_planned("A,B,C").unwrap();
        assert_eq!(route.codes(), ["A", "B", "C"]);
    }

    #[test]
    fn empty_plan_is_rejected() {
        assert!(matches!(parse_planned(""), Err(LookupError::Decode(_))));
    }
}
