//! Lifetime of a single subscription connection.
//!
//! The `connection_init` payload is turned into an execution context once;
//! every operation on the connection runs against that context. The
//! connection ends when the client leaves or the registry drains.

use std::sync::Arc;

use async_graphql::Data;
use async_graphql::dynamic;
use async_graphql_axum::{GraphQLProtocol, GraphQLWebSocket};
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::http::HeaderMap;
use futures_util::{SinkExt, StreamExt};

use super::registry::ConnectionRegistry;
use crate::context::ContextBuilder;

/// Runs the graphql-ws session for one upgraded socket.
///
/// - Builds the connection's context from the handshake.
/// - Abandons the session as soon as draining starts, which tears down
///   every running subscription on the connection.
/// - Sends a `1001 Going Away` close frame when closed by a drain.
pub async fn run_connection(
    socket: WebSocket,
    executor: dynamic::Schema,
    protocol: GraphQLProtocol,
    contexts: Arc<ContextBuilder>,
    upgrade_headers: HeaderMap,
    registry: ConnectionRegistry,
) {
    let Some(_guard) = registry.register() else {
        tracing::debug!("subscription connection refused: draining");
        return;
    };
    let connection_id = uuid::Uuid::new_v4();
    tracing::debug!(%connection_id, "subscription connection opened");

    let (mut sink, stream) = socket.split();
    let mut drain = registry.drain_signal();

    let session = GraphQLWebSocket::new_with_pair(&mut sink, stream, executor, protocol)
        .on_connection_init(move |params| async move {
            let context = contexts.for_connection(&upgrade_headers, &params).await;
            let mut data = Data::default();
            data.insert(context);
            Ok::<_, async_graphql::Error>(data)
        })
        .serve();

    // Dropping the session future drops every running subscription stream.
    tokio::select! {
        () = session => {}
        _ = drain.wait_for(|draining| *draining) => {}
    }

    if registry.is_draining() {
        let close = Message::Close(Some(CloseFrame {
            code: close_code::AWAY,
            reason: "server shutting down".into(),
        }));
        if let Err(e) = sink.send(close).await {
            tracing::debug!(%connection_id, error = %e, "close frame not delivered");
        }
        tracing::debug!(%connection_id, "subscription connection closed by drain");
    } else {
        tracing::debug!(%connection_id, "subscription connection closed");
    }
}
