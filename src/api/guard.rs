//! Request guards that run before any context is built.
//!
//! - [`enforce_origin`]: only the configured client origin may call the
//!   gateway from a browser.
//! - [`enforce_csrf`]: requests a browser could send without a CORS
//!   preflight must carry a preflight-forcing header.

use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Headers that prove the request went through a CORS preflight.
pub const PREFLIGHT_HEADERS: [&str; 2] = ["apollo-require-preflight", "x-apollo-operation-name"];

/// Content types a browser may send cross-site without a preflight.
const SIMPLE_CONTENT_TYPES: [&str; 3] = [
    "text/plain",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
];

/// Rejects requests whose `Origin` is present and not `allowed`.
///
/// Requests without an `Origin` header (non-browser clients) pass.
///
/// # Errors
///
/// Returns [`GatewayError::OriginRejected`] for a foreign origin.
pub fn check_origin(headers: &HeaderMap, allowed: &HeaderValue) -> Result<(), GatewayError> {
    match headers.get(ORIGIN) {
        None => Ok(()),
        Some(origin) if origin == allowed => Ok(()),
        Some(origin) => Err(GatewayError::OriginRejected(
            origin.to_str().unwrap_or("<non-ascii>").to_string(),
        )),
    }
}

/// Rejects requests that could have skipped the CORS preflight.
///
/// # Errors
///
/// Returns [`GatewayError::CsrfRejected`] for a GET or simple-content-type
/// request without one of [`PREFLIGHT_HEADERS`].
pub fn check_csrf(method: &Method, headers: &HeaderMap) -> Result<(), GatewayError> {
    if *method == Method::OPTIONS {
        return Ok(());
    }
    let has_preflight_header = PREFLIGHT_HEADERS
        .iter()
        .any(|name| headers.get(*name).is_some_and(|v| !v.is_empty()));
    if has_preflight_header {
        return Ok(());
    }

    let preflighted_content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .is_some_and(|essence| !SIMPLE_CONTENT_TYPES.contains(&essence.as_str()));

    if *method != Method::GET && preflighted_content_type {
        Ok(())
    } else {
        Err(GatewayError::CsrfRejected)
    }
}

/// Middleware applying [`check_origin`] with the configured client origin.
///
/// # Errors
///
/// Returns [`GatewayError::OriginRejected`] for foreign origins and
/// [`GatewayError::InvalidConfig`] if the configured origin is unusable.
pub async fn enforce_origin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let allowed = state.config.client_origin_header()?;
    if let Err(e) = check_origin(request.headers(), &allowed) {
        tracing::warn!(error = %e, path = %request.uri().path(), "request rejected by origin policy");
        return Err(e);
    }
    Ok(next.run(request).await)
}

/// Middleware applying [`check_csrf`] when CSRF prevention is enabled.
///
/// # Errors
///
/// Returns [`GatewayError::CsrfRejected`] for requests that skipped the
/// preflight.
pub async fn enforce_csrf(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    if state.config.csrf_prevention {
        check_csrf(request.method(), request.headers())?;
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn origin_absent_or_allowed_passes() {
        let allowed = HeaderValue::from_static("https://app.example");
        assert!(check_origin(&HeaderMap::new(), &allowed).is_ok());
        assert!(check_origin(&headers(&[("origin", "https://app.example")]), &allowed).is_ok());
    }

    #[test]
    fn foreign_origin_is_rejected() {
        let allowed = HeaderValue::from_static("https://app.example");
        let result = check_origin(&headers(&[("origin", "https://evil.example")]), &allowed);
        assert!(matches!(result, Err(GatewayError::OriginRejected(o)) if o == "https://evil.example"));
    }

    #[test]
    fn json_post_passes_csrf() {
        let h = headers(&[("content-type", "application/json; charset=utf-8")]);
        assert!(check_csrf(&Method::POST, &h).is_ok());
    }

    #[test]
    fn simple_post_without_header_is_blocked() {
        let h = headers(&[("content-type", "text/plain")]);
        assert!(matches!(
            check_csrf(&Method::POST, &h),
            Err(GatewayError::CsrfRejected)
        ));
        assert!(check_csrf(&Method::POST, &HeaderMap::new()).is_err());
    }

    #[test]
    fn get_needs_preflight_header() {
        assert!(check_csrf(&Method::GET, &HeaderMap::new()).is_err());
        let h = headers(&[("apollo-require-preflight", "true")]);
        assert!(check_csrf(&Method::GET, &h).is_ok());
        let h = headers(&[("x-apollo-operation-name", "Me")]);
        assert!(check_csrf(&Method::GET, &h).is_ok());
    }

    #[test]
    fn preflight_itself_is_not_blocked() {
        assert!(check_csrf(&Method::OPTIONS, &HeaderMap::new()).is_ok());
    }
}
