//! In-memory repository used when PostgreSQL persistence is disabled.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Repository, UsernameUpdate};
use crate::domain::{Message, NewMessage, User};
use crate::error::GatewayError;

/// Process-local user and message storage.
///
/// Users are keyed by ID in a `RwLock<HashMap<...>>`; messages are kept in
/// insertion order.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<String, User>>,
    messages: RwLock<Vec<Message>>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository seeded with `users`.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: RwLock::new(users),
            messages: RwLock::default(),
        }
    }

    /// Returns a copy of every stored message, oldest first.
    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), GatewayError> {
        let mut users = self.users.write().await;
        let stored = users
            .entry(user.id.clone())
            .or_insert_with(|| User::new(user.id.clone()));
        stored.email.clone_from(&user.email);
        stored.name.clone_from(&user.name);
        stored.image.clone_from(&user.image);
        if stored.username.is_none() {
            stored.username.clone_from(&user.username);
        }
        Ok(())
    }

    async fn search_users(
        &self,
        query: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, GatewayError> {
        let needle = query.to_lowercase();
        let users = self.users.read().await;
        let mut found: Vec<User> = users
            .values()
            .filter(|u| u.id != exclude_user_id)
            .filter(|u| {
                u.username
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(found)
    }

    async fn set_username(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<UsernameUpdate, GatewayError> {
        let mut users = self.users.write().await;
        let taken = users
            .values()
            .any(|u| u.id != user_id && u.username.as_deref() == Some(username));
        if taken {
            return Ok(UsernameUpdate::Taken);
        }
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| GatewayError::UserNotFound(user_id.to_string()))?;
        user.username = Some(username.to_string());
        Ok(UsernameUpdate::Updated)
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, GatewayError> {
        let stored = Message {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            body: message.body,
            created_at: Utc::now(),
        };
        self.messages.write().await.push(stored.clone());
        Ok(stored)
    }
}
