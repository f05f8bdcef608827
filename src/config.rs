use std::time::Duration;

use anyhow::Context;

use crate::token::MIN_TOKEN_BYTES;

/// One `name=url` entry of the webhook mapping, before URL validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRoute {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: Option<String>,
    /// Set from FIRESTORE_BASE_URL, or derived from FIRESTORE_EMULATOR_HOST.
    pub base_url: String,
    pub collection: String,
    /// Fixed OAuth bearer token. When unset, tokens come from Google
    /// application default credentials and are refreshed as they expire.
    pub access_token: Option<String>,
    /// Talking to the local emulator, which takes no credentials.
    pub emulator: bool,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            base_url: "https://firestore.googleapis.com".into(),
            collection: "users".into(),
            access_token: None,
            emulator: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Configured forwarding routes, in declaration order.
    pub webhooks: Vec<WebhookRoute>,
    pub store: StoreBackend,
    pub firestore: FirestoreConfig,
    /// Append the inbound query string (minus `token`) to the upstream URL.
    pub forward_query: bool,
    /// Total timeout for one upstream forward. `None` keeps the client default.
    pub upstream_timeout: Option<Duration>,
    /// Total timeout for one registry call. `None` keeps the client default.
    pub store_timeout: Option<Duration>,
    /// Random bytes per issued token.
    pub token_bytes: usize,
    /// With the memory store, seed one admin with this name at startup.
    pub bootstrap_admin: Option<String>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            webhooks: Vec::new(),
            store: StoreBackend::Firestore,
            firestore: FirestoreConfig::default(),
            forward_query: false,
            upstream_timeout: None,
            store_timeout: None,
            token_bytes: MIN_TOKEN_BYTES,
            bootstrap_admin: None,
            log_format: LogFormat::Text,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a [`Config`] from an arbitrary variable lookup.
pub fn from_lookup<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());
    let defaults = Config::default();

    let webhooks = match var("HOOKGATE_WEBHOOK_URLS").or_else(|| var("DISCORD_WEBHOOK_URLS")) {
        Some(raw) => parse_webhooks(&raw)?,
        None => Vec::new(),
    };

    let port = match var("PORT") {
        Some(p) => p.trim().parse().with_context(|| format!("invalid PORT: {}", p))?,
        None => defaults.port,
    };

    let store = match var("HOOKGATE_STORE").as_deref().map(str::trim) {
        None | Some("firestore") => StoreBackend::Firestore,
        Some("memory") => StoreBackend::Memory,
        Some(other) => anyhow::bail!(
            "invalid HOOKGATE_STORE: {}. Must be 'firestore' or 'memory'",
            other
        ),
    };

    let emulator_host = var("FIRESTORE_EMULATOR_HOST");
    let emulator = emulator_host.is_some();
    let base_url = match (var("FIRESTORE_BASE_URL"), emulator_host) {
        (Some(url), _) => url,
        (None, Some(host)) => format!("http://{}", host.trim()),
        (None, None) => defaults.firestore.base_url,
    };
    let firestore = FirestoreConfig {
        project_id: var("PROJECT_ID"),
        base_url,
        collection: var("HOOKGATE_USERS_COLLECTION").unwrap_or(defaults.firestore.collection),
        access_token: var("FIRESTORE_ACCESS_TOKEN"),
        emulator,
    };

    let token_bytes = match var("HOOKGATE_TOKEN_BYTES") {
        Some(raw) => {
            let n: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid HOOKGATE_TOKEN_BYTES: {}", raw))?;
            if n < MIN_TOKEN_BYTES {
                anyhow::bail!(
                    "HOOKGATE_TOKEN_BYTES must be at least {}, got {}",
                    MIN_TOKEN_BYTES,
                    n
                );
            }
            n
        }
        None => defaults.token_bytes,
    };

    let log_format = match var("HOOKGATE_LOG_FORMAT").as_deref().map(str::trim) {
        None | Some("text") => LogFormat::Text,
        Some("json") => LogFormat::Json,
        Some(other) => anyhow::bail!("invalid HOOKGATE_LOG_FORMAT: {}", other),
    };

    Ok(Config {
        port,
        webhooks,
        store,
        firestore,
        forward_query: parse_bool("HOOKGATE_FORWARD_QUERY", var("HOOKGATE_FORWARD_QUERY"))?
            .unwrap_or(defaults.forward_query),
        upstream_timeout: parse_secs("UPSTREAM_TIMEOUT_SECS", var("UPSTREAM_TIMEOUT_SECS"))?,
        store_timeout: parse_secs("STORE_TIMEOUT_SECS", var("STORE_TIMEOUT_SECS"))?,
        token_bytes,
        bootstrap_admin: var("HOOKGATE_BOOTSTRAP_ADMIN").map(|n| n.trim().to_string()),
        log_format,
    })
}

/// Parse the `name=url;name=url` webhook mapping.
///
/// Only the first `=` separates name from URL, so URLs may carry query strings.
/// Blank entries (e.g. a trailing `;`) are skipped; an entry without `=`, or
/// with an empty name or URL, is an error.
pub fn parse_webhooks(raw: &str) -> anyhow::Result<Vec<WebhookRoute>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> anyhow::Result<WebhookRoute> {
            let (name, url) = entry
                .split_once('=')
                .with_context(|| format!("webhook entry '{}' is not of the form name=url", entry))?;
            let (name, url) = (name.trim(), url.trim());
            if name.is_empty() || url.is_empty() {
                anyhow::bail!("webhook entry '{}' has an empty name or URL", entry);
            }
            Ok(WebhookRoute {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

fn parse_secs(key: &str, raw: Option<String>) -> anyhow::Result<Option<Duration>> {
    raw.map(|v| {
        v.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .with_context(|| format!("invalid {}: {}", key, v))
    })
    .transpose()
}

fn parse_bool(key: &str, raw: Option<String>) -> anyhow::Result<Option<bool>> {
    raw.map(|v| -> anyhow::Result<bool> {
        match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("invalid {}: {}", key, v),
        }
    })
    .transpose()
}
