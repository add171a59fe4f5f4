//! Authenticated identity as resolved by the session provider.
//!
//! The shape mirrors the NextAuth session payload the web client and the
//! `/api/auth/session` endpoint exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user record, shared by sessions and the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user identifier.
    pub id: String,
    /// Chosen username; `None` until the user picks one.
    #[serde(default)]
    pub username: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub image: Option<String>,
}

impl User {
    /// Creates a user with only an identifier set.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            name: None,
            image: None,
        }
    }

    /// Sets the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// A resolved authentication session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The authenticated user.
    pub user: User,
    /// Expiry instant; sessions without one never expire on this side.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a non-expiring session for `user`.
    #[must_use]
    pub fn new(user: User) -> Self {
        Self {
            user,
            expires: None,
        }
    }

    /// Returns `true` if the session expired before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}
