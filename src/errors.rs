use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::proxy::upstream::ProxyError;
use crate::store::StoreError;
use crate::token::TokenError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("registry error: {0}")]
    Store(#[from] StoreError),

    #[error("token generation failed: {0}")]
    Token(#[from] TokenError),

    #[error("upstream error: {0}")]
    Upstream(#[from] ProxyError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::MissingParameter(param) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_parameter",
                format!("missing required query parameter '{}'", param),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthorized",
                "invalid, missing or insufficiently privileged token".to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!("Registry error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "registry_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Token(e) => {
                tracing::error!("Token generation error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Upstream(ProxyError::Timeout) => (
                StatusCode::GATEWAY_TIMEOUT,
                "upstream_error",
                "upstream_timeout",
                "upstream request timed out".to_string(),
            ),
            AppError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "upstream_failed",
                "upstream request failed".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
