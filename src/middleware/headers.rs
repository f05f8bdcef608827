use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

/// Middleware: tags every request with a unique id, both in the tracing span
/// and as an `x-request-id` response header. An upstream-supplied id on a
/// proxied response is left as is.
pub async fn request_id(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %req_id);
    let mut resp = next.run(req).instrument(span).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().entry("x-request-id").or_insert(val);
    }
    resp
}

/// Middleware: hardening headers for gateway-native responses.
/// Not applied to proxied responses, which are relayed as the upstream sent them.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    // Prevent MIME-type sniffing (e.g., interpreting a .txt as HTML)
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));

    // Issued tokens must not be cached anywhere
    headers.insert("cache-control", HeaderValue::from_static("no-store"));

    // Tokens travel in query strings, never hand them on as a Referer
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));

    resp
}
