use std::sync::Arc;

use axum::extract::{RawQuery, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::errors::AppError;
use crate::middleware::authz::{redact_token, Authorizer, Privilege};
use crate::middleware::metrics;
use crate::models::UserRecord;
use crate::proxy::Forwarder;
use crate::token;
use crate::AppState;

/// Query parameters of the user-management routes.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AdminParams {
    pub token: Option<String>,
    pub name: Option<String>,
}

impl AdminParams {
    pub fn from_query(query: Option<&str>) -> Self {
        Self {
            token: first_value(query, "token"),
            name: first_value(query, "name"),
        }
    }
}

/// Query parameters of a forwarding route. Anything besides `token` is
/// ignored here and handled by the forwarder.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ForwardParams {
    pub token: Option<String>,
}

impl ForwardParams {
    pub fn from_query(query: Option<&str>) -> Self {
        Self {
            token: first_value(query, "token"),
        }
    }
}

/// First decoded value of `key`. Repeated keys are not an error, later
/// occurrences are ignored.
fn first_value(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Values are used exactly as sent; only an absent or empty one is missing.
fn required<'a>(value: &'a Option<String>, param: &'static str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(AppError::MissingParameter(param))
}

/// Issue a new token for `name`. Admin only.
pub async fn new_token(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let params = AdminParams::from_query(query.as_deref());
    let name = required(&params.name, "name")?;
    let admin_token = required(&params.token, "token")?;
    let admin = state
        .authorizer
        .require(Some(admin_token), Privilege::Admin)
        .await?;

    let issued = token::generate_token(state.config.token_bytes)?;
    let record = UserRecord::new(issued.clone(), name);
    state.store.create_or_replace(&record).await?;

    tracing::info!(
        admin = %admin.name,
        name,
        token = %redact_token(&issued),
        "issued new token"
    );
    Ok((
        StatusCode::CREATED,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        issued,
    )
        .into_response())
}

/// Delete every record named `name`. Admin only.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<StatusCode, AppError> {
    let params = AdminParams::from_query(query.as_deref());
    let name = required(&params.name, "name")?;
    let admin_token = required(&params.token, "token")?;
    let admin = state
        .authorizer
        .require(Some(admin_token), Privilege::Admin)
        .await?;

    let deleted = state.store.delete_by_name(name).await?;
    tracing::info!(admin = %admin.name, name, deleted, "deleted users");
    Ok(StatusCode::OK)
}

/// Grant admin to every record named `name`. Admin only.
pub async fn promote_user(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<StatusCode, AppError> {
    let params = AdminParams::from_query(query.as_deref());
    let name = required(&params.name, "name")?;
    let admin_token = required(&params.token, "token")?;
    let admin = state
        .authorizer
        .require(Some(admin_token), Privilege::Admin)
        .await?;

    let promoted = state.store.promote_by_name(name).await?;
    tracing::info!(admin = %admin.name, name, promoted, "promoted users");
    Ok(StatusCode::OK)
}

/// Authorize at user level, then relay the whole request through `forwarder`.
pub async fn forward(
    authorizer: &Authorizer,
    forwarder: &Forwarder,
    params: ForwardParams,
    req: Request,
) -> Result<Response, AppError> {
    let user = authorizer
        .require(params.token.as_deref(), Privilege::User)
        .await?;

    match forwarder.forward(req).await {
        Ok(resp) => {
            tracing::info!(
                route = forwarder.route(),
                user = %user.name,
                status = resp.status().as_u16(),
                "forwarded request"
            );
            Ok(resp)
        }
        Err(e) => {
            metrics::record_upstream_error(forwarder.route());
            tracing::warn!(
                route = forwarder.route(),
                token = %redact_token(&user.token),
                error = %e,
                "upstream forward failed"
            );
            Err(e.into())
        }
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}
