//! Ordered shutdown hooks.
//!
//! Hooks are registered while the transports are attached and run one after
//! another, in registration order, once the gateway starts draining.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use crate::ws::ConnectionRegistry;

/// One step of the shutdown sequence.
#[async_trait]
pub trait ShutdownHook: Send + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Performs the step. Completes only when the step is finished.
    async fn run(self: Box<Self>);
}

/// Hooks executed sequentially, in the order they were pushed.
#[derive(Debug, Default)]
pub struct ShutdownSequence {
    hooks: Vec<Box<dyn ShutdownHook>>,
}

impl ShutdownSequence {
    /// Creates an empty sequence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook; it runs after every hook pushed before it.
    pub fn push(&mut self, hook: impl ShutdownHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Names of the registered hooks, in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    /// Runs every hook to completion, one at a time.
    pub async fn run(self) {
        for hook in self.hooks {
            let name = hook.name();
            tracing::info!(hook = name, "running shutdown hook");
            hook.run().await;
            tracing::info!(hook = name, "shutdown hook complete");
        }
    }
}

/// Stops accepting subscription connections and waits until every open one
/// has closed.
#[derive(Debug)]
pub struct SubscriptionDispose {
    registry: ConnectionRegistry,
}

impl SubscriptionDispose {
    /// Creates the hook over the transport's registry.
    #[must_use]
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ShutdownHook for SubscriptionDispose {
    fn name(&self) -> &'static str {
        "subscription-dispose"
    }

    async fn run(self: Box<Self>) {
        self.registry.dispose().await;
    }
}

/// Stops the HTTP server from accepting connections and waits for in-flight
/// requests to finish.
#[derive(Debug)]
pub struct HttpDrain {
    stop: oneshot::Sender<()>,
    serving: watch::Receiver<bool>,
}

impl HttpDrain {
    /// `stop` triggers the server's graceful shutdown; `serving` reports
    /// `false` once the server task has returned.
    #[must_use]
    pub fn new(stop: oneshot::Sender<()>, serving: watch::Receiver<bool>) -> Self {
        Self { stop, serving }
    }
}

#[async_trait]
impl ShutdownHook for HttpDrain {
    fn name(&self) -> &'static str {
        "http-drain"
    }

    async fn run(self: Box<Self>) {
        let Self { stop, mut serving } = *self;
        // Already stopped if the receiver is gone.
        let _ = stop.send(());
        let _ = serving.wait_for(|running| !*running).await;
    }
}
