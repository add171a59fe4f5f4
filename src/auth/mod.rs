//! Authentication provider seam.
//!
//! Sessions are owned by an external provider; the gateway only asks it to
//! resolve the cookies a request carries. [`NextAuthSessions`] talks to a
//! NextAuth deployment over HTTP.

pub mod next_auth;

use std::fmt;

use async_trait::async_trait;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use crate::domain::Session;
use crate::error::GatewayError;

pub use next_auth::NextAuthSessions;

/// Cookie names NextAuth stores its session token under.
pub const SESSION_COOKIE_NAMES: [&str; 2] = [
    "next-auth.session-token",
    "__Secure-next-auth.session-token",
];

/// Resolves a request's cookies to a session.
#[async_trait]
pub trait SessionProvider: Send + Sync + fmt::Debug {
    /// Validates the session carried by `cookies` (a raw `Cookie` header).
    ///
    /// Returns `Ok(None)` when the provider knows no such session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AuthProvider`] if the provider cannot be
    /// reached or answers with something that is not a session.
    async fn resolve(&self, cookies: &str) -> Result<Option<Session>, GatewayError>;
}

/// Returns `true` if the request's cookies carry a session token.
#[must_use]
pub fn has_session_cookie(headers: &HeaderMap) -> bool {
    CookieJar::from_headers(headers).iter().any(|cookie| {
        !cookie.value().trim().is_empty()
            && SESSION_COOKIE_NAMES
                .iter()
                .any(|known| cookie.name() == *known || is_chunk_of(cookie.name(), known))
    })
}

/// NextAuth splits large tokens into `<name>.0`, `<name>.1`, ...
fn is_chunk_of(name: &str, base: &str) -> bool {
    name.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()))
}
