//! Event channel: wire protocol, dispatch and per-connection plumbing

pub mod connections;
pub mod dispatch;
pub mod handler;
pub mod protocol;

pub use connections::{ConnectionRegistry, Outbox};
pub use dispatch::DispatchError;
pub use handler::ws_handler;
