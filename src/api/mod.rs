//! HTTP surface: the query/mutation transport, origin and CSRF guards, and
//! the router that multiplexes both transports on one socket.

pub mod graphql;
pub mod guard;
pub mod system;

use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::error::GatewayError;
use crate::graphql::{GRAPHQL_PATH, SUBSCRIPTIONS_PATH};
use crate::ws::handler::subscription_handler;

/// Builds the CORS layer: the configured origin, with credentials.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidConfig`] if the origin is not a valid
/// header value.
pub fn cors_layer(state: &AppState) -> Result<CorsLayer, GatewayError> {
    let origin = state.config.client_origin_header()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static("apollo-require-preflight"),
            HeaderName::from_static("x-apollo-operation-name"),
        ]))
}

/// Builds the router serving both transports and the health endpoint.
///
/// `/graphql` runs CORS, the origin guard, CSRF prevention and the body
/// limit before the handler; `/graphql/subscriptions` runs the origin
/// guard before the upgrade.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidConfig`] if the client origin is unusable.
pub fn build_router(state: AppState) -> Result<Router, GatewayError> {
    let graphql = Router::new()
        .route(
            GRAPHQL_PATH,
            get(graphql::graphql_handler).post(graphql::graphql_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer(&state)?)
                .layer(from_fn_with_state(state.clone(), guard::enforce_origin))
                .layer(from_fn_with_state(state.clone(), guard::enforce_csrf))
                .layer(RequestBodyLimitLayer::new(state.config.max_body_bytes)),
        );

    let subscriptions = Router::new()
        .route(SUBSCRIPTIONS_PATH, get(subscription_handler))
        .layer(from_fn_with_state(state.clone(), guard::enforce_origin));

    Ok(Router::new()
        .merge(graphql)
        .merge(subscriptions)
        .merge(system::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
