//! Forwarding table: route name -> forwarder, validated once at startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use super::upstream::Forwarder;
use crate::config::WebhookRoute;

/// Paths served by the gateway itself; a webhook route may not shadow them.
pub const RESERVED_ROUTES: &[&str] = &["newToken", "deleteUser", "promoteUser", "healthz", "metrics"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("no webhook routes configured")]
    Empty,

    #[error("route name '{0}' must be a single non-empty path segment")]
    InvalidName(String),

    #[error("route name '{0}' is reserved by the gateway")]
    Reserved(String),

    #[error("route '{0}' is configured more than once")]
    Duplicate(String),

    #[error("route '{route}' has an invalid target URL: {reason}")]
    InvalidUrl { route: String, reason: String },
}

#[derive(Default)]
pub struct ForwardingTable {
    routes: BTreeMap<String, Arc<Forwarder>>,
}

impl ForwardingTable {
    /// Validate every route and build its forwarder. Any invalid entry fails
    /// the whole table; there is no partially-configured result.
    pub fn from_routes(
        routes: &[WebhookRoute],
        client: reqwest::Client,
        forward_query: bool,
    ) -> Result<Self, RouteError> {
        if routes.is_empty() {
            return Err(RouteError::Empty);
        }

        let mut table = BTreeMap::new();
        for route in routes {
            validate_name(&route.name)?;
            let target = parse_target(&route.name, &route.url)?;
            if table.contains_key(&route.name) {
                return Err(RouteError::Duplicate(route.name.clone()));
            }
            let forwarder = Forwarder::new(route.name.clone(), target, client.clone(), forward_query);
            table.insert(route.name.clone(), Arc::new(forwarder));
        }
        Ok(Self { routes: table })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Forwarder>)> {
        self.routes.iter().map(|(name, f)| (name.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn validate_name(name: &str) -> Result<(), RouteError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
    if !valid {
        return Err(RouteError::InvalidName(name.to_string()));
    }
    if RESERVED_ROUTES.contains(&name) {
        return Err(RouteError::Reserved(name.to_string()));
    }
    Ok(())
}

fn parse_target(route: &str, raw: &str) -> Result<Url, RouteError> {
    let invalid = |reason: String| RouteError::InvalidUrl {
        route: route.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}
