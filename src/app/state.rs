//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{MatchScheduler, SessionHandle};
use crate::ws::ConnectionRegistry;

/// Scheduler type the server runs: messages go out through the live connection registry
pub type ServerScheduler = MatchScheduler<Arc<ConnectionRegistry>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: SessionHandle,
    pub connections: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Build the state plus the scheduler that owns the session. The caller spawns
    /// `scheduler.run()`; nothing reaches the store until it does.
    pub fn new(config: Config) -> (Self, ServerScheduler) {
        let config = Arc::new(config);

        // Initialize connection registry
        let connections = Arc::new(ConnectionRegistry::new());

        // Initialize the session actor
        let seed = rand::random::<u64>();
        let (scheduler, session) =
            MatchScheduler::new(config.game.clone(), seed, connections.clone());

        let state = Self {
            config,
            session,
            connections,
        };
        (state, scheduler)
    }
}
