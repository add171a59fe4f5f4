//! Per-operation execution context and its builder.
//!
//! Every HTTP operation and every subscription connection gets a fresh
//! [`ExecutionContext`]. Only the identity varies between contexts; the
//! database and event bus handles are the process-wide instances the
//! [`ContextBuilder`] was constructed with.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::{SessionProvider, has_session_cookie};
use crate::config::SubscriptionIdentity;
use crate::domain::{EventBus, Session};
use crate::error::GatewayError;
use crate::persistence::Database;

/// Bundle handed to resolvers: identity, database, and event bus.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    session: Option<Session>,
    database: Database,
    event_bus: EventBus,
}

impl ExecutionContext {
    /// Returns the caller's session, if authenticated.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns the caller's session or [`GatewayError::Unauthorized`].
    ///
    /// # Errors
    ///
    /// Fails when the context has no identity.
    pub fn require_session(&self) -> Result<&Session, GatewayError> {
        self.session.as_ref().ok_or(GatewayError::Unauthorized)
    }

    /// Returns the shared database handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns the shared event bus.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

/// `connection_init` payload sent by the web client.
#[derive(Debug, Default, Deserialize)]
struct ConnectionParams {
    #[serde(default)]
    session: Option<Session>,
}

/// Derives execution contexts from requests and socket handshakes.
///
/// Construction never fails: any problem resolving an identity leaves the
/// context unauthenticated.
#[derive(Debug)]
pub struct ContextBuilder {
    database: Database,
    event_bus: EventBus,
    sessions: Arc<dyn SessionProvider>,
    subscription_identity: SubscriptionIdentity,
}

impl ContextBuilder {
    /// Creates a builder over the process-wide handles.
    #[must_use]
    pub fn new(
        database: Database,
        event_bus: EventBus,
        sessions: Arc<dyn SessionProvider>,
        subscription_identity: SubscriptionIdentity,
    ) -> Self {
        Self {
            database,
            event_bus,
            sessions,
            subscription_identity,
        }
    }

    /// Builds the context for one query or mutation.
    ///
    /// The session cookie, if any, is validated against the session
    /// provider; this is the only suspension point.
    pub async fn for_request(&self, headers: &HeaderMap) -> ExecutionContext {
        let session = self.session_from_cookies(headers).await;
        self.context(session)
    }

    /// Builds the context bound to a subscription connection for its whole
    /// lifetime.
    ///
    /// In [`SubscriptionIdentity::Handshake`] mode the identity is the
    /// `session` the client asserts in `params`, without validation. In
    /// [`SubscriptionIdentity::Verified`] mode the handshake session is
    /// ignored and the upgrade request's cookies are validated instead.
    pub async fn for_connection(
        &self,
        upgrade_headers: &HeaderMap,
        params: &serde_json::Value,
    ) -> ExecutionContext {
        let keys: Vec<&str> = params
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default();
        tracing::debug!(?keys, mode = ?self.subscription_identity, "subscription handshake");

        let session = match self.subscription_identity {
            SubscriptionIdentity::Handshake => asserted_session(params),
            SubscriptionIdentity::Verified => self.session_from_cookies(upgrade_headers).await,
        };
        self.context(session)
    }

    fn context(&self, session: Option<Session>) -> ExecutionContext {
        let session = session.filter(|s| {
            let expired = s.is_expired_at(Utc::now());
            if expired {
                tracing::debug!("ignoring expired session");
            }
            !expired
        });
        ExecutionContext {
            session,
            database: self.database.clone(),
            event_bus: self.event_bus.clone(),
        }
    }

    async fn session_from_cookies(&self, headers: &HeaderMap) -> Option<Session> {
        if !has_session_cookie(headers) {
            return None;
        }
        let cookies = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        match self.sessions.resolve(&cookies).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed; continuing unauthenticated");
                None
            }
        }
    }
}

fn asserted_session(params: &serde_json::Value) -> Option<Session> {
    if params.is_null() {
        return None;
    }
    match ConnectionParams::deserialize(params) {
        Ok(parsed) => parsed.session,
        Err(e) => {
            // serde's message quotes the rejected value; log only its category.
            tracing::debug!(category = ?e.classify(), "undecodable connection params; no identity");
            None
        }
    }
}
