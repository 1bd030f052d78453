//! Arena session server - authoritative multiplayer session core
//!
//! - `game`: session store, elimination and scoring rules, the match scheduler actor
//! - `ws`: wire protocol, inbound dispatch, WebSocket connections
//! - `http`: router with health check and static client bundle
//! - `client`: synchronization layer and remote entity interpolation for clients

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use crate::app::AppState;
use crate::config::Config;
use crate::game::Command;
use crate::http::build_router;

/// Serve the session on `listener` until `shutdown` resolves, then stop the scheduler
pub async fn serve<F>(listener: TcpListener, config: Config, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (state, scheduler) = AppState::new(config);
    let session = state.session.clone();
    let scheduler_handle = tokio::spawn(scheduler.run());

    let router = build_router(state);
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await;

    session.send(Command::Shutdown).await;
    let _ = scheduler_handle.await;
    info!("Session stopped");

    result
}
