use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{StoreError, UserStore};
use crate::models::UserRecord;

/// In-process registry backed by a concurrent map.
/// Used for local development (`HOOKGATE_STORE=memory`) and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<DashMap<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_token(&self, token: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.get(token).map(|entry| entry.value().clone()))
    }

    async fn create_or_replace(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.users.insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn find_all_by_name(&self, name: &str) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self
            .users
            .iter()
            .filter(|entry| entry.name == name)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.users.remove(token);
        Ok(())
    }

    async fn update_admin_flag(&self, token: &str, is_admin: bool) -> Result<bool, StoreError> {
        match self.users.get_mut(token) {
            Some(mut entry) => {
                entry.is_admin = is_admin;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
