//! Startup and shutdown coordination for the two transports.
//!
//! The coordinator walks
//! `Uninitialized → SchemaCompiled → TransportsAttached → Listening →
//! Draining → Stopped`. The forward path is encoded in types, so a
//! listening socket can only exist after the schema compiled and both
//! transports were attached:
//!
//! ```text
//! Gateway ──compile──▶ CompiledGateway ──attach_transports──▶ AttachedGateway
//!                                                                  │ listen
//!                                                                  ▼
//!                                  Stopped ◀──shutdown── RunningGateway
//! ```
//!
//! Every transition is published on a watch channel observable through
//! [`LifecycleMonitor`].

pub mod shutdown;
pub mod signal;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};

use crate::api;
use crate::app_state::{AppState, SharedServices};
use crate::config::GatewayConfig;
use crate::context::ContextBuilder;
use crate::error::GatewayError;
use crate::graphql::{GRAPHQL_PATH, GatewaySchema, SchemaDefinition, SchemaLimits};
use crate::ws::ConnectionRegistry;

pub use shutdown::{HttpDrain, ShutdownHook, ShutdownSequence, SubscriptionDispose};
pub use signal::shutdown_signal;

/// Coordinator states, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing built yet.
    Uninitialized,
    /// The executable schema exists.
    SchemaCompiled,
    /// Both transports and their shutdown hooks are registered.
    TransportsAttached,
    /// The socket is bound and accepting connections.
    Listening,
    /// Shutdown hooks are running.
    Draining,
    /// Socket closed; terminal.
    Stopped,
}

/// Read-only view of the coordinator's state.
#[derive(Debug, Clone)]
pub struct LifecycleMonitor {
    rx: watch::Receiver<LifecycleState>,
}

impl LifecycleMonitor {
    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> LifecycleState {
        *self.rx.borrow()
    }

    /// Returns `true` if the socket was ever bound.
    ///
    /// States only move forward, so anything at or past `Listening` means
    /// the bind happened.
    #[must_use]
    pub fn has_listened(&self) -> bool {
        self.current() >= LifecycleState::Listening
    }

    /// Waits until the coordinator reaches `state` or moves past it.
    pub async fn reached(&mut self, state: LifecycleState) {
        let _ = self.rx.wait_for(|current| *current >= state).await;
    }
}

/// Owner of the state channel; only the coordinator advances it.
#[derive(Debug)]
struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Uninitialized);
        Self { tx: Arc::new(tx) }
    }

    fn monitor(&self) -> LifecycleMonitor {
        LifecycleMonitor {
            rx: self.tx.subscribe(),
        }
    }

    fn advance(&self, next: LifecycleState) {
        let previous = self.tx.send_replace(next);
        debug_assert!(previous < next, "lifecycle moved backwards: {previous:?} -> {next:?}");
        tracing::info!(from = ?previous, to = ?next, "lifecycle transition");
    }
}

/// `Uninitialized`: configuration and shared services, no schema yet.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    services: SharedServices,
    lifecycle: Lifecycle,
}

impl Gateway {
    /// Creates a coordinator over the process-wide services.
    #[must_use]
    pub fn new(config: GatewayConfig, services: SharedServices) -> Self {
        Self {
            config,
            services,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Returns a monitor for this coordinator's state.
    #[must_use]
    pub fn monitor(&self) -> LifecycleMonitor {
        self.lifecycle.monitor()
    }

    /// Compiles the schema; `Uninitialized → SchemaCompiled`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SchemaCompilation`]. The gateway is consumed,
    /// so a failed compile can never reach a bound socket.
    pub fn compile(self, definition: SchemaDefinition) -> Result<CompiledGateway, GatewayError> {
        let limits = SchemaLimits {
            max_depth: self.config.schema_max_depth,
        };
        let schema = GatewaySchema::compile(definition, limits).inspect_err(|e| {
            tracing::error!(error = %e, "schema compilation failed");
        })?;
        self.lifecycle.advance(LifecycleState::SchemaCompiled);

        Ok(CompiledGateway {
            config: self.config,
            services: self.services,
            lifecycle: self.lifecycle,
            schema,
        })
    }

    /// Runs every startup step and returns the listening gateway.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of [`compile`](Self::compile),
    /// [`CompiledGateway::attach_transports`] or [`AttachedGateway::listen`].
    pub async fn start(self, definition: SchemaDefinition) -> Result<RunningGateway, GatewayError> {
        self.compile(definition)?.attach_transports()?.listen().await
    }
}

/// `SchemaCompiled`: the executable schema exists.
#[derive(Debug)]
pub struct CompiledGateway {
    config: GatewayConfig,
    services: SharedServices,
    lifecycle: Lifecycle,
    schema: GatewaySchema,
}

impl CompiledGateway {
    /// Returns a monitor for this coordinator's state.
    #[must_use]
    pub fn monitor(&self) -> LifecycleMonitor {
        self.lifecycle.monitor()
    }

    /// Attaches both transports and registers their shutdown hooks;
    /// `SchemaCompiled → TransportsAttached`.
    ///
    /// Hooks run in registration order: subscription dispose first, then
    /// the HTTP drain.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] if the CORS policy cannot be
    /// built from the configured origin.
    pub fn attach_transports(self) -> Result<AttachedGateway, GatewayError> {
        let subscriptions = ConnectionRegistry::new();
        let contexts = Arc::new(ContextBuilder::new(
            self.services.database,
            self.services.event_bus,
            self.services.sessions,
            self.config.subscription_identity,
        ));
        let config = Arc::new(self.config);

        let state = AppState {
            schema: self.schema,
            contexts,
            subscriptions: subscriptions.clone(),
            config: Arc::clone(&config),
            lifecycle: self.lifecycle.monitor(),
        };
        let router = api::build_router(state)?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let (serving_tx, serving_rx) = watch::channel(false);

        let mut hooks = ShutdownSequence::new();
        hooks.push(SubscriptionDispose::new(subscriptions.clone()));
        hooks.push(HttpDrain::new(stop_tx, serving_rx.clone()));

        self.lifecycle.advance(LifecycleState::TransportsAttached);

        Ok(AttachedGateway {
            config,
            lifecycle: self.lifecycle,
            router,
            subscriptions,
            hooks,
            stop_rx,
            serving_tx,
            serving_rx,
        })
    }
}

/// `TransportsAttached`: router and shutdown hooks ready, socket not bound.
#[derive(Debug)]
pub struct AttachedGateway {
    config: Arc<GatewayConfig>,
    lifecycle: Lifecycle,
    router: Router,
    subscriptions: ConnectionRegistry,
    hooks: ShutdownSequence,
    stop_rx: oneshot::Receiver<()>,
    serving_tx: watch::Sender<bool>,
    serving_rx: watch::Receiver<bool>,
}

impl AttachedGateway {
    /// Returns a monitor for this coordinator's state.
    #[must_use]
    pub fn monitor(&self) -> LifecycleMonitor {
        self.lifecycle.monitor()
    }

    /// Binds the shared socket and starts serving;
    /// `TransportsAttached → Listening`.
    ///
    /// Readiness is reported only after the bind succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Bind`] if the address is unavailable.
    pub async fn listen(self) -> Result<RunningGateway, GatewayError> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| GatewayError::Bind { addr, source })?;

        let Self {
            lifecycle,
            router,
            subscriptions,
            hooks,
            stop_rx,
            serving_tx,
            serving_rx,
            ..
        } = self;

        serving_tx.send_replace(true);
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
            }
            serving_tx.send_replace(false);
        });

        lifecycle.advance(LifecycleState::Listening);
        tracing::info!(addr = %local_addr, "server ready at http://{local_addr}{GRAPHQL_PATH}");

        Ok(RunningGateway {
            local_addr,
            lifecycle,
            subscriptions,
            hooks,
            serving: serving_rx,
        })
    }
}

/// `Listening`: serving both transports.
#[derive(Debug)]
pub struct RunningGateway {
    local_addr: SocketAddr,
    lifecycle: Lifecycle,
    subscriptions: ConnectionRegistry,
    hooks: ShutdownSequence,
    serving: watch::Receiver<bool>,
}

impl RunningGateway {
    /// Returns the bound socket address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a monitor for this coordinator's state.
    #[must_use]
    pub fn monitor(&self) -> LifecycleMonitor {
        self.lifecycle.monitor()
    }

    /// Returns the registry of open subscription connections.
    #[must_use]
    pub fn subscriptions(&self) -> &ConnectionRegistry {
        &self.subscriptions
    }

    /// Drains both transports in order and closes the socket;
    /// `Listening → Draining → Stopped`.
    pub async fn shutdown(self) {
        self.lifecycle.advance(LifecycleState::Draining);
        self.hooks.run().await;
        self.lifecycle.advance(LifecycleState::Stopped);
    }

    /// Serves until `signal` resolves (or the HTTP server stops on its
    /// own), then shuts down.
    pub async fn run_until(self, signal: impl Future<Output = ()>) {
        let mut serving = self.serving.clone();
        tokio::select! {
            () = signal => tracing::info!("shutdown signal received"),
            _ = serving.wait_for(|running| !*running) => {
                tracing::warn!("HTTP server stopped without a shutdown signal");
            }
        }
        self.shutdown().await;
    }
}
