use super::{timed, StoreError, UserStore};
use crate::models::{NewUser, User};
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local user store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, username: &str) -> Result<Option<User>, StoreError> {
        timed(self.backend(), "get", async {
            Ok(self.users.read().await.get(username).cloned())
        })
        .await
    }

    async fn create(&self, user: &NewUser) -> Result<(), StoreError> {
        timed(self.backend(), "create", async {
            match self.users.write().await.entry(user.username.clone()) {
                Entry::Occupied(_) => Err(StoreError::Duplicate {
                    username: user.username.clone(),
                }),
                Entry::Vacant(slot) => {
                    slot.insert(User::from(user.clone()));
                    Ok(())
                }
            }
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
