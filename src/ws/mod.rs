//! Subscription transport: WebSocket upgrades on `/graphql/subscriptions`.
//!
//! Speaks `graphql-transport-ws` and the legacy `graphql-ws` protocol. The
//! [`ConnectionRegistry`] is the transport's dispose hook.

pub mod connection;
pub mod handler;
pub mod registry;

pub use registry::{ConnectionGuard, ConnectionRegistry};
