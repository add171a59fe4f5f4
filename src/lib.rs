//! # messenger-gateway
//!
//! GraphQL API gateway for a real-time messenger web client.
//!
//! One TCP socket serves two transports: request/response queries and
//! mutations over HTTP at `/graphql`, and long-lived subscriptions over
//! WebSocket (graphql-ws protocols) at `/graphql/subscriptions`. Both run
//! against the same compiled schema and the same database and event bus
//! instances; only the caller's identity differs between operations.
//!
//! ## Architecture
//!
//! ```text
//! Web client (browser, single allow-listed origin)
//!     │
//!     ├── HTTP  /graphql ──────────── CORS · origin · CSRF · body limit (api/)
//!     ├── WS    /graphql/subscriptions ── origin · connection registry (ws/)
//!     │
//!     ├── ContextBuilder (context)  ── SessionProvider (auth/)
//!     ├── GatewaySchema (graphql/)
//!     │
//!     ├── EventBus (domain/)
//!     └── Database (persistence/) ── PostgreSQL or in-memory
//!
//! Lifecycle (lifecycle/):
//!   Uninitialized → SchemaCompiled → TransportsAttached → Listening
//!     → Draining (subscriptions dispose, then HTTP drain) → Stopped
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod graphql;
pub mod lifecycle;
pub mod persistence;
pub mod ws;
