use std::sync::Arc;

use crate::errors::AppError;
use crate::middleware::metrics;
use crate::models::UserRecord;
use crate::store::UserStore;

/// Privilege levels a route can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    User,
    Admin,
}

impl Privilege {
    /// Check if `record` has this privilege level.
    pub fn is_satisfied_by(self, record: &UserRecord) -> bool {
        match self {
            Privilege::User => true, // any registered token
            Privilege::Admin => record.is_admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingToken,
    UnknownToken,
    StoreUnavailable,
    InsufficientPrivilege,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::MissingToken => "missing_token",
            DenyReason::UnknownToken => "unknown_token",
            DenyReason::StoreUnavailable => "store_unavailable",
            DenyReason::InsufficientPrivilege => "insufficient_privilege",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow(UserRecord),
    Deny(DenyReason),
}

/// Decides whether a token may use a route. Every call is a fresh registry
/// read: no cache, no rate limiting, no lockout.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn UserStore>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn authorize(&self, token: Option<&str>, privilege: Privilege) -> AuthDecision {
        let decision = self.decide(token, privilege).await;
        if let AuthDecision::Deny(reason) = decision {
            metrics::record_denial(reason);
        }
        decision
    }

    async fn decide(&self, token: Option<&str>, privilege: Privilege) -> AuthDecision {
        // exact match only, no normalization
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => {
                tracing::debug!(?privilege, "request without token");
                return AuthDecision::Deny(DenyReason::MissingToken);
            }
        };

        let record = match self.store.get_by_token(token).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!(token = %redact_token(token), ?privilege, "unknown token");
                return AuthDecision::Deny(DenyReason::UnknownToken);
            }
            Err(e) => {
                tracing::error!(
                    token = %redact_token(token),
                    ?privilege,
                    error = %e,
                    "registry lookup failed, denying"
                );
                return AuthDecision::Deny(DenyReason::StoreUnavailable);
            }
        };

        if !privilege.is_satisfied_by(&record) {
            tracing::warn!(
                user = %record.name,
                token = %redact_token(token),
                "non-admin attempted an admin request"
            );
            return AuthDecision::Deny(DenyReason::InsufficientPrivilege);
        }

        AuthDecision::Allow(record)
    }

    /// [`authorize`](Self::authorize), mapping any denial to `AppError::Unauthorized`.
    pub async fn require(
        &self,
        token: Option<&str>,
        privilege: Privilege,
    ) -> Result<UserRecord, AppError> {
        match self.authorize(token, privilege).await {
            AuthDecision::Allow(record) => Ok(record),
            AuthDecision::Deny(_) => Err(AppError::Unauthorized),
        }
    }
}

/// Loggable form of a token: a short prefix only.
// SECURITY: never log a full token, it is the whole credential
pub fn redact_token(token: &str) -> String {
    match token.get(..4) {
        Some(prefix) if token.len() > 8 => format!("{}…", prefix),
        _ => "****".to_string(),
    }
}
