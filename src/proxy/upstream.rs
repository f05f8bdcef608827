//! HTTP client and per-route forwarder for relaying requests to webhook upstreams.
//! One attempt per inbound request: no retry middleware, no redirect following.
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::response::Response;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream timed out")]
    Timeout,

    #[error("failed to relay upstream response: {0}")]
    Response(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::Timeout
        } else {
            // webhook URLs embed their own secrets, keep them out of logs
            ProxyError::Unreachable(e.without_url().to_string())
        }
    }
}

/// Build the client shared by every forwarder.
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(10));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Relays requests for one route to its fixed upstream URL.
pub struct Forwarder {
    route: String,
    target: Url,
    client: reqwest::Client,
    forward_query: bool,
}

impl Forwarder {
    pub fn new(
        route: impl Into<String>,
        target: Url,
        client: reqwest::Client,
        forward_query: bool,
    ) -> Self {
        Self {
            route: route.into(),
            target,
            client,
            forward_query,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Destination for one request. The inbound path never leaks through; the
    /// inbound query is appended only when enabled, and never its `token`.
    pub fn outbound_url(&self, inbound_query: Option<&str>) -> Url {
        let mut url = self.target.clone();
        if !self.forward_query {
            return url;
        }
        let extra: Vec<(String, String)> = url::form_urlencoded::parse(
            inbound_query.unwrap_or_default().as_bytes(),
        )
        .filter(|(k, _)| k != "token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
        if !extra.is_empty() {
            url.query_pairs_mut().extend_pairs(extra);
        }
        url
    }

    /// Send `req` upstream once and stream the response back unchanged.
    pub async fn forward(&self, req: Request) -> Result<Response, ProxyError> {
        let (parts, body) = req.into_parts();
        let url = self.outbound_url(parts.uri.query());

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let mut upstream = self
            .client
            .request(parts.method, url)
            .headers(headers);
        if body.size_hint().exact() != Some(0) {
            upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let resp = upstream.send().await?;
        tracing::debug!(route = %self.route, status = resp.status().as_u16(), "upstream responded");

        let mut builder = Response::builder().status(resp.status());
        if let Some(out) = builder.headers_mut() {
            let mut resp_headers = resp.headers().clone();
            strip_hop_by_hop(&mut resp_headers);
            out.extend(resp_headers);
        }
        builder
            .body(Body::from_stream(resp.bytes_stream()))
            .map_err(|e| ProxyError::Response(e.to_string()))
    }
}

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
