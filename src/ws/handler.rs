//! Axum WebSocket upgrade handler for the subscription transport.

use std::sync::Arc;

use async_graphql::http::ALL_WEBSOCKET_PROTOCOLS;
use async_graphql_axum::GraphQLProtocol;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::error::GatewayError;

/// `GET /graphql/subscriptions`: upgrade to a graphql-ws connection.
///
/// # Errors
///
/// Returns [`GatewayError::ShuttingDown`] once the registry is draining.
pub async fn subscription_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    protocol: GraphQLProtocol,
    ws: WebSocketUpgrade,
) -> Result<Response, GatewayError> {
    if state.subscriptions.is_draining() {
        return Err(GatewayError::ShuttingDown);
    }

    let executor = state.schema.executor();
    let contexts = Arc::clone(&state.contexts);
    let registry = state.subscriptions.clone();

    Ok(ws
        .protocols(ALL_WEBSOCKET_PROTOCOLS)
        .on_upgrade(move |socket| {
            run_connection(socket, executor, protocol, contexts, headers, registry)
        })
        .into_response())
}
