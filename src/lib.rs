//! hookgate: token-gated reverse proxy for webhook endpoints.
//!
//! Requests carry an opaque `token` query parameter that is checked against
//! a user registry on every call. Valid tokens may use any configured webhook
//! route; admin tokens may also issue, delete and promote users.

use std::sync::Arc;

use anyhow::Context;

pub mod api;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod proxy;
pub mod store;
pub mod token;

use config::Config;
use middleware::Authorizer;
use proxy::ForwardingTable;
use store::UserStore;

/// Shared application state passed to handlers.
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub authorizer: Authorizer,
    pub routes: ForwardingTable,
    pub config: Config,
}

impl AppState {
    /// Validate the forwarding configuration and wire the shared components.
    /// Fails on any configuration error; nothing is served from a partial table.
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let client = proxy::upstream::build_client(config.upstream_timeout)
            .context("failed to build upstream HTTP client")?;
        let routes = ForwardingTable::from_routes(&config.webhooks, client, config.forward_query)
            .context("invalid webhook configuration")?;

        Ok(Self {
            authorizer: Authorizer::new(store.clone()),
            store,
            routes,
            config,
        })
    }
}
