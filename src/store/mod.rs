pub mod auth;
pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;

use crate::models::UserRecord;

pub use auth::{AccessTokenSource, GoogleCredentials, StaticToken};
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("registry request failed: {0}")]
    Transport(String),

    #[error("registry returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("registry credentials unavailable: {0}")]
    Auth(String),

    #[error("malformed registry document: {0}")]
    Decode(String),

    #[error("{operation} failed for {failed} of {total} records")]
    Partial {
        operation: &'static str,
        failed: usize,
        total: usize,
    },
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.without_url().to_string())
    }
}

/// Abstraction over the user registry.
/// Implementations: FirestoreStore (Cloud Firestore REST), MemoryStore (in-process).
///
/// `Ok(None)` from [`get_by_token`](UserStore::get_by_token) means "not found";
/// every `Err` is a communication or decoding failure.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Upsert keyed by `record.token`.
    async fn create_or_replace(&self, record: &UserRecord) -> Result<(), StoreError>;

    async fn find_all_by_name(&self, name: &str) -> Result<Vec<UserRecord>, StoreError>;

    /// Delete one record. Deleting a missing record is not an error.
    async fn delete(&self, token: &str) -> Result<(), StoreError>;

    /// Update only the admin flag of an existing record.
    /// Returns `false` if the record no longer exists.
    async fn update_admin_flag(&self, token: &str, is_admin: bool) -> Result<bool, StoreError>;

    /// Delete every given record, reporting any partial failure.
    async fn delete_all(&self, records: &[UserRecord]) -> Result<usize, StoreError> {
        let results = join_all(records.iter().map(|r| self.delete(&r.token))).await;
        let mut failed = 0;
        for err in results.into_iter().filter_map(Result::err) {
            tracing::warn!(error = %err, "registry delete failed");
            failed += 1;
        }
        if failed > 0 {
            return Err(StoreError::Partial {
                operation: "delete",
                failed,
                total: records.len(),
            });
        }
        Ok(records.len())
    }

    /// Set the admin flag on every given record, leaving names untouched.
    /// Returns how many records were updated.
    async fn set_admin_flag(
        &self,
        records: &[UserRecord],
        is_admin: bool,
    ) -> Result<usize, StoreError> {
        let results = join_all(
            records
                .iter()
                .map(|r| self.update_admin_flag(&r.token, is_admin)),
        )
        .await;
        let mut failed = 0;
        let mut updated = 0;
        for result in results {
            match result {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "registry admin flag update failed");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(StoreError::Partial {
                operation: "admin flag update",
                failed,
                total: records.len(),
            });
        }
        Ok(updated)
    }

    /// Revoke every credential belonging to `name`.
    async fn delete_by_name(&self, name: &str) -> Result<usize, StoreError> {
        let records = self.find_all_by_name(name).await?;
        self.delete_all(&records).await
    }

    /// Elevate every credential belonging to `name` to admin.
    async fn promote_by_name(&self, name: &str) -> Result<usize, StoreError> {
        let records = self.find_all_by_name(name).await?;
        self.set_admin_flag(&records, true).await
    }
}
