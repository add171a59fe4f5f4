//! Domain layer: identities, messages, and the event bus.
//!
//! These are the values that flow through an execution context. The bus is
//! a process-wide singleton; sessions are resolved per operation.

pub mod event_bus;
pub mod message;
pub mod session;

pub use event_bus::EventBus;
pub use message::{BusEvent, Message, NewMessage, Topic};
pub use session::{Session, User};
