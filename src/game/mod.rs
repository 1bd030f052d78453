//! Session core: authoritative state, elimination rules and the match scheduler

pub mod elimination;
pub mod participant;
pub mod scheduler;
pub mod scoring;
pub mod session;
pub mod shrink;
pub mod timer;

pub use participant::Participant;
pub use scheduler::{Command, MatchScheduler, SessionHandle};
pub use session::SessionStore;
