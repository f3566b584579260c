//! InMemoryUserStore - 開発用のユーザーストア

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::ports::{StoreError, User, UserStore};

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new user. Usernames are unique.
    pub async fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(StoreError::Conflict(user.username));
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, username: &str) -> Result<User, StoreError> {
        self.users
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(username.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            username: "alice".into(),
            full_name: "Alice Liddell".into(),
            email: "alice@example.com".into(),
        }
    }

    #[tokio::test]
    async fn insert_then_get() {
        let store = InMemoryUserStore::new();
        store.insert(alice()).await.unwrap();
        assert_eq!(store.get_user("alice").await.unwrap(), alice());
        assert_eq!(
            store.get_user("bob").await,
            Err(StoreError::NotFound("bob".into()))
        );
    }

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let store = InMemoryUserStore::new();
        store.insert(alice()).await.unwrap();
        assert_eq!(
            store.insert(alice()).await,
            Err(StoreError::Conflict("alice".into()))
        );
        assert_eq!(store.len().await, 1);
    }
}
