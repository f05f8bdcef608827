//! Bearer credentials for the Firestore registry.
//!
//! A token is fetched for every registry request, so a refreshing source
//! keeps a long-running gateway authorized past the lifetime of any one token.

use std::sync::Arc;

use async_trait::async_trait;

use super::StoreError;

/// OAuth scope covering Firestore document reads and writes.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// A currently valid bearer token.
    async fn access_token(&self) -> Result<String, StoreError>;
}

/// A fixed token from `FIRESTORE_ACCESS_TOKEN`. It is never refreshed.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

/// Google application default credentials (service account key, workload
/// identity, metadata server or gcloud user). The provider caches tokens and
/// refreshes them shortly before they expire.
pub struct GoogleCredentials {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl GoogleCredentials {
    /// Discover credentials from the environment.
    pub async fn discover() -> Result<Self, gcp_auth::Error> {
        Ok(Self {
            provider: gcp_auth::provider().await?,
        })
    }

    /// Project the credentials belong to, used when PROJECT_ID is unset.
    pub async fn project_id(&self) -> Result<String, gcp_auth::Error> {
        Ok(self.provider.project_id().await?.to_string())
    }
}

#[async_trait]
impl AccessTokenSource for GoogleCredentials {
    async fn access_token(&self) -> Result<String, StoreError> {
        let token = self
            .provider
            .token(&[DATASTORE_SCOPE])
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?;
        Ok(token.as_str().to_string())
    }
}
