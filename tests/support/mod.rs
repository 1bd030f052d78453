// Server bootstrapping shared by the integration tests.
use std::time::Duration;

use arena_server::client::{SyncClient, ViewState};
use arena_server::config::{Config, GameConfig};

pub const WAIT: Duration = Duration::from_secs(5);

// Config bound to an ephemeral loopback port with the given gameplay tuning.
pub fn test_config(game: GameConfig) -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().expect("loopback addr"),
        log_level: "info".to_string(),
        static_dir: None,
        client_origin: None,
        game,
    }
}

// Start a server on its own ephemeral port inside the current test runtime and return
// its address as `host:port`.
pub async fn spawn_server(game: GameConfig) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");

    tokio::spawn(async move {
        arena_server::serve(listener, test_config(game), std::future::pending())
            .await
            .expect("server failed");
    });

    addr.to_string()
}

// Connect a client and wait for the greeting every connection receives.
pub async fn connect(addr: &str) -> SyncClient {
    let mut client = SyncClient::connect(&format!("ws://{}/ws", addr))
        .await
        .expect("connect to test server");
    client
        .wait_for(WAIT, |v: &ViewState| v.max_players > 0)
        .await
        .expect("playerCount on connect");
    client
}

// Connect, join under `name` and wait for the server to accept.
pub async fn join(addr: &str, name: &str) -> SyncClient {
    let mut client = connect(addr).await;
    client.join(name).await.expect("send join");
    client
        .wait_for(WAIT, |v| v.local_id.is_some())
        .await
        .expect("joined");
    client
}
