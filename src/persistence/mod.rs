//! Persistence layer: the shared database handle behind every context.
//!
//! [`Repository`] is the seam to the storage backend. The gateway builds
//! exactly one [`Database`] at startup, either PostgreSQL-backed
//! ([`PostgresRepository`]) or in-memory ([`MemoryRepository`]), and hands
//! clones of it to every execution context.

pub mod memory;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Message, NewMessage, User};
use crate::error::GatewayError;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Outcome of a username change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameUpdate {
    /// The username now belongs to the user.
    Updated,
    /// Another user already owns the username.
    Taken,
}

/// Storage operations the resolvers need.
#[async_trait]
pub trait Repository: Send + Sync + fmt::Debug {
    /// Records the session's user, creating it on first sight.
    ///
    /// Profile fields (email, name, image) follow the session; an existing
    /// username is kept, since the session may predate a rename.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on backend failure.
    async fn upsert_user(&self, user: &User) -> Result<(), GatewayError>;

    /// Finds users whose username contains `query` (case-insensitive),
    /// excluding `exclude_user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on backend failure.
    async fn search_users(
        &self,
        query: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, GatewayError>;

    /// Assigns `username` to `user_id` unless another user owns it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UserNotFound`] if the user does not exist and
    /// [`GatewayError::Persistence`] on backend failure.
    async fn set_username(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<UsernameUpdate, GatewayError>;

    /// Stores a message and returns it with its identifier and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] on backend failure.
    async fn insert_message(&self, message: NewMessage) -> Result<Message, GatewayError>;
}

/// Cloneable handle to the process-wide repository.
#[derive(Clone)]
pub struct Database {
    repository: Arc<dyn Repository>,
}

impl Database {
    /// Wraps a repository in a shareable handle.
    #[must_use]
    pub fn new(repository: impl Repository + 'static) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Returns the repository behind the handle.
    #[must_use]
    pub fn repository(&self) -> &dyn Repository {
        self.repository.as_ref()
    }

    /// Returns `true` if both handles point at the same repository instance.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.repository, &other.repository)
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Database").field(&self.repository).finish()
    }
}
