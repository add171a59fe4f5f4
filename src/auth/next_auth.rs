//! Session provider backed by a NextAuth `/api/auth/session` endpoint.

use async_trait::async_trait;
use reqwest::header::COOKIE;

use super::SessionProvider;
use crate::domain::Session;
use crate::error::GatewayError;

/// Resolves sessions by forwarding cookies to NextAuth.
#[derive(Debug, Clone)]
pub struct NextAuthSessions {
    client: reqwest::Client,
    session_url: String,
}

impl NextAuthSessions {
    /// Creates a provider for the NextAuth deployment at `auth_url`.
    #[must_use]
    pub fn new(auth_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            session_url: session_url(auth_url),
        }
    }

    /// Returns the endpoint the provider queries.
    #[must_use]
    pub fn session_url(&self) -> &str {
        &self.session_url
    }
}

fn session_url(auth_url: &str) -> String {
    format!("{}/api/auth/session", auth_url.trim_end_matches('/'))
}

/// NextAuth answers `{}` (older versions `null`) when there is no session.
fn decode_session(body: serde_json::Value) -> Result<Option<Session>, GatewayError> {
    match &body {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) if map.is_empty() => Ok(None),
        _ => serde_json::from_value(body)
            .map(Some)
            .map_err(|e| GatewayError::AuthProvider(format!("malformed session: {e}"))),
    }
}

#[async_trait]
impl SessionProvider for NextAuthSessions {
    async fn resolve(&self, cookies: &str) -> Result<Option<Session>, GatewayError> {
        let response = self
            .client
            .get(&self.session_url)
            .header(COOKIE, cookies)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| GatewayError::AuthProvider(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::AuthProvider(e.to_string()))?;

        decode_session(body)
    }
}
