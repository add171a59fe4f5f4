//! PostgreSQL implementation of the repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::{Repository, UsernameUpdate};
use crate::config::GatewayConfig;
use crate::domain::{Message, NewMessage, User};
use crate::error::GatewayError;

/// PostgreSQL-backed repository using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `config.database_url` and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] if the database is unreachable
    /// or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| GatewayError::Persistence(e.to_string()))?;

        Ok(Self::new(pool))
    }
}

type UserRow = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn user_from_row((id, username, email, name, image): UserRow) -> User {
    User {
        id,
        username,
        email,
        name,
        image,
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, name, image) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
               email = EXCLUDED.email, name = EXCLUDED.name, image = EXCLUDED.image, \
               username = COALESCE(users.username, EXCLUDED.username)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.image)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search_users(
        &self,
        query: &str,
        exclude_user_id: &str,
    ) -> Result<Vec<User>, GatewayError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, name, image FROM users \
             WHERE username ILIKE $1 AND id <> $2 ORDER BY username ASC",
        )
        .bind(format!("%{}%", escape_like(query)))
        .bind(exclude_user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(user_from_row).collect())
    }

    async fn set_username(
        &self,
        user_id: &str,
        username: &str,
    ) -> Result<UsernameUpdate, GatewayError> {
        let owner = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        if owner.is_some_and(|id| id != user_id) {
            return Ok(UsernameUpdate::Taken);
        }

        let result = sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
            .bind(username)
            .bind(user_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(GatewayError::UserNotFound(user_id.to_string()))
            }
            Ok(_) => Ok(UsernameUpdate::Updated),
            // Lost a race against a concurrent claim of the same name.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(UsernameUpdate::Taken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, GatewayError> {
        let id = Uuid::new_v4();
        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            "INSERT INTO messages (id, conversation_id, sender_id, body) \
             VALUES ($1, $2, $3, $4) RETURNING created_at",
        )
        .bind(id)
        .bind(&message.conversation_id)
        .bind(&message.sender_id)
        .bind(&message.body)
        .fetch_one(&self.pool)
        .await?;

        Ok(Message {
            id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            body: message.body,
            created_at,
        })
    }
}

/// Escapes `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
