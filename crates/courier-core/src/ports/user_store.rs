//! UserStore port - ユーザー情報の参照
//!
//! The relational store lives outside this crate; handlers only need to
//! read a user by name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("user {0:?} not found")]
    NotFound(String),

    #[error("user store unavailable: {0}")]
    Unavailable(String),

    #[error("user {0:?} already exists")]
    Conflict(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, username: &str) -> Result<User, StoreError>;
}
