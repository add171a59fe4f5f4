//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::{NextAuthSessions, SessionProvider};
use crate::config::GatewayConfig;
use crate::context::ContextBuilder;
use crate::domain::EventBus;
use crate::error::GatewayError;
use crate::graphql::GatewaySchema;
use crate::lifecycle::LifecycleMonitor;
use crate::persistence::{Database, MemoryRepository, PostgresRepository};
use crate::ws::ConnectionRegistry;

/// Long-lived collaborators created once per process.
///
/// Every execution context receives clones of exactly these handles.
#[derive(Debug, Clone)]
pub struct SharedServices {
    /// Persistence handle.
    pub database: Database,
    /// Publish/subscribe bus.
    pub event_bus: EventBus,
    /// Authentication provider.
    pub sessions: Arc<dyn SessionProvider>,
}

impl SharedServices {
    /// Assembles services from already-built parts.
    #[must_use]
    pub fn new(database: Database, event_bus: EventBus, sessions: Arc<dyn SessionProvider>) -> Self {
        Self {
            database,
            event_bus,
            sessions,
        }
    }

    /// Builds the services described by `config`.
    ///
    /// Connects to PostgreSQL when persistence is enabled, otherwise uses
    /// the in-memory repository.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Persistence`] if the database is unreachable.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let database = if config.persistence_enabled {
            tracing::info!("connecting to PostgreSQL");
            Database::new(PostgresRepository::connect(config).await?)
        } else {
            tracing::warn!("persistence disabled; using in-memory repository");
            Database::new(MemoryRepository::new())
        };

        Ok(Self {
            database,
            event_bus: EventBus::new(config.event_bus_capacity),
            sessions: Arc::new(NextAuthSessions::new(&config.auth_url)),
        })
    }
}

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Compiled schema shared by both transports.
    pub schema: GatewaySchema,
    /// Per-operation context factory.
    pub contexts: Arc<ContextBuilder>,
    /// Open subscription connections.
    pub subscriptions: ConnectionRegistry,
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// Current lifecycle state.
    pub lifecycle: LifecycleMonitor,
}
