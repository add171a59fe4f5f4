//! Query/mutation transport handler.

use std::error::Error as _;

use async_graphql::{ParseRequestError, ServerError};
use async_graphql_axum::rejection::GraphQLRejection;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::State;
use axum::http::HeaderMap;
use http_body_util::LengthLimitError;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// `GET|POST /graphql`: execute one query or mutation.
///
/// Framing errors are answered before any context is built. Execution is
/// bounded by the configured request timeout; a timeout is reported as a
/// GraphQL error in the normal envelope.
///
/// # Errors
///
/// Returns [`GatewayError::PayloadTooLarge`] when the body exceeds the
/// limit (including chunked bodies) and [`GatewayError::InvalidRequest`]
/// when it is not a GraphQL request.
pub async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<GraphQLRequest, GraphQLRejection>,
) -> Result<GraphQLResponse, GatewayError> {
    let request = request.map_err(|rejection| {
        let error = rejection_error(rejection.0);
        tracing::debug!(error = %error, "rejected GraphQL request framing");
        error
    })?;

    let context = state.contexts.for_request(&headers).await;
    let request = request.into_inner().data(context);
    let timeout = state.config.request_timeout;

    match tokio::time::timeout(timeout, state.schema.execute(request)).await {
        Ok(response) => Ok(response.into()),
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis(), "operation timed out");
            Ok(async_graphql::Response::from_errors(vec![ServerError::new(
                format!("operation timed out after {} ms", timeout.as_millis()),
                None,
            )])
            .into())
        }
    }
}

/// Maps a request parse failure onto the transport error it represents.
fn rejection_error(error: ParseRequestError) -> GatewayError {
    match error {
        ParseRequestError::PayloadTooLarge => GatewayError::PayloadTooLarge,
        ParseRequestError::Io(io) if hit_length_limit(&io) => GatewayError::PayloadTooLarge,
        other => GatewayError::InvalidRequest(other.to_string()),
    }
}

/// A streamed body that crossed the limit surfaces as an I/O error wrapping
/// [`LengthLimitError`].
fn hit_length_limit(error: &std::io::Error) -> bool {
    let mut source = error
        .get_ref()
        .map(|inner| inner as &(dyn std::error::Error + 'static));
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}
