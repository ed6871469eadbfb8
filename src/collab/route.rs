//! Route parsing and gateway position resolution.
//!
//! A [`Route`] is the ordered list of center codes a request traverses,
//! carried between gateways as a comma-delimited header value.
//! [`resolve`] locates the local center on the route and derives its
//! [`GatewayRole`] plus the code of the next center, if any.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::CollabError;

/// Delimiter between center codes on the wire.
pub const ROUTE_DELIMITER: char = ',';

/// Opaque identifier of a collaboration center.
pub type CenterCode = String;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route(Vec<CenterCode>);

impl Route {
    #[must_use]
    pub fn new(codes: Vec<CenterCode>) -> Self {
        Self(codes)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn codes(&self) -> &[CenterCode] {
        &self.0
    }

    /// Split a comma-delimited route. An empty string is the empty route.
    /// Codes are kept verbatim, so any code without a comma survives a
    /// display/parse round trip.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::default();
        }
        Self(s.split(ROUTE_DELIMITER).map(String::from).collect())
    }

    /// Index of the first exact match for `code`.
    #[must_use]
    pub fn position(&self, code: &str) -> Option<usize> {
        self.0.iter().position(|c| c == code)
    }
}

impl FromStr for Route {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{ROUTE_DELIMITER}")?;
            }
            f.write_str(code)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayRole {
    Origin,
    Relay,
    Destination,
}

impl GatewayRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Relay => "relay",
            Self::Destination => "destination",
        }
    }
}

impl fmt::Display for GatewayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of locating the local center on a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub role: GatewayRole,
    pub index: usize,
    pub next: Option<CenterCode>,
}

/// Determine this gateway's role on `route` and the next center code.
///
/// The origin test runs before the terminal test, so a single-element
/// route resolves to [`GatewayRole::Origin`] with no next code.
pub fn resolve(local: &str, route: &Route) -> Result<Position, CollabError> {
    let index = route
        .position(local)
        .ok_or_else(|| CollabError::NotOnRoute {
            code: local.to_string(),
            route: route.to_string(),
        })?;

    let next = route.codes().get(index + 1).cloned();
    let role = if index == 0 {
        GatewayRole::Origin
    } else if index == route.len() - 1 {
        GatewayRole::Destination
    } else {
        GatewayRole::Relay
    };

    Ok(Position { role, index, next })
}
