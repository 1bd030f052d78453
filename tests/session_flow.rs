mod support;

use arena_server::config::GameConfig;
use arena_server::ws::protocol::{ClientMsg, Phase, ServerMsg};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use support::{connect, join, spawn_server, WAIT};

#[tokio::test]
async fn joins_are_acknowledged_and_broadcast() {
    let addr = spawn_server(GameConfig::default()).await;

    let mut alice = join(&addr, "Alice").await;
    let alice_id = alice.view().local_id.expect("alice id");
    assert_eq!(alice.view().host_id.as_deref(), Some(alice_id.as_str()));

    let bob = join(&addr, "  Bob  ").await;
    let bob_view = bob.view();
    assert_eq!(bob_view.players.len(), 2);
    assert_eq!(bob_view.host_id.as_deref(), Some(alice_id.as_str()));
    assert_eq!(bob_view.local_player().map(|p| p.name.as_str()), Some("Bob"));

    alice
        .wait_for(WAIT, |v| v.players.len() == 2 && v.player_count == 2)
        .await
        .expect("alice sees bob");
}

#[tokio::test]
async fn join_past_capacity_is_rejected() {
    let addr = spawn_server(GameConfig {
        max_players: 1,
        ..GameConfig::default()
    })
    .await;

    let _alice = join(&addr, "Alice").await;

    let mut bob = connect(&addr).await;
    bob.join("Bob").await.expect("send join");
    bob.wait_for(WAIT, |v| v.join_error.is_some())
        .await
        .expect("join error");

    let view = bob.view();
    assert_eq!(view.join_error.as_deref(), Some("Server is full"));
    assert!(view.local_id.is_none());
    assert_eq!(view.player_count, 1);
}

#[tokio::test]
async fn host_departure_hands_over() {
    let addr = spawn_server(GameConfig::default()).await;

    let alice = join(&addr, "Alice").await;
    let mut bob = join(&addr, "Bob").await;
    let bob_id = bob.view().local_id.expect("bob id");

    drop(alice);
    bob.wait_for(WAIT, |v| v.players.len() == 1)
        .await
        .expect("alice leaves");
    assert_eq!(bob.view().host_id, Some(bob_id));
    assert!(bob.view().is_host());
}

#[tokio::test]
async fn konami_match_runs_to_the_end() {
    let addr = spawn_server(GameConfig {
        countdown_secs: 1,
        ..GameConfig::default()
    })
    .await;

    let mut alice = join(&addr, "Alice").await;
    let mut bob = join(&addr, "Bob").await;
    let alice_id = alice.view().local_id.expect("alice id");

    // only the host may start
    bob.send(ClientMsg::StartGame).await.expect("send start");
    alice.send(ClientMsg::StartGame).await.expect("send start");
    alice
        .wait_for(WAIT, |v| v.phase == Phase::Playing)
        .await
        .expect("match starts");

    alice.send(ClientMsg::KonamiCode).await.expect("send konami");
    bob.wait_for(WAIT, |v| v.phase == Phase::Ended)
        .await
        .expect("match ends");

    let view = bob.view();
    assert_eq!(
        view.winner.as_ref().map(|w| w.id.as_str()),
        Some(alice_id.as_str())
    );
    assert_eq!(view.konami_by.as_deref(), Some(alice_id.as_str()));
    assert!(view.local_player().is_some_and(|p| p.is_eliminated));
    assert_eq!(view.scores.len(), 2);

    alice.send(ClientMsg::PlayAgain).await.expect("send play again");
    bob.wait_for(WAIT, |v| v.phase == Phase::Lobby)
        .await
        .expect("round resets");
    assert!(bob.view().players.values().all(|p| !p.is_eliminated));
}

#[tokio::test]
async fn health_reports_status_and_players() {
    let addr = spawn_server(GameConfig::default()).await;
    let _alice = join(&addr, "Alice").await;
    let _watcher = connect(&addr).await;

    let res = reqwest::Client::new()
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .expect("health request");
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let json: serde_json::Value = res.json().await.expect("json body");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["players"], 1);
    assert_eq!(json["connections"], 2);
    assert!(json["timestamp"].is_string());
    assert!(json["uptimeSecs"].is_u64());
}

#[tokio::test]
async fn malformed_frame_does_not_break_the_connection() {
    let addr = spawn_server(GameConfig::default()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("connect");

    ws.send(Message::Text("{not json".into()))
        .await
        .expect("send garbage");
    let join = serde_json::to_string(&ClientMsg::Join {
        name: "Alice".into(),
    })
    .expect("encode join");
    ws.send(Message::Text(join)).await.expect("send join");

    let joined = tokio::time::timeout(WAIT, async {
        while let Some(frame) = ws.next().await {
            let Message::Text(text) = frame.expect("frame") else {
                continue;
            };
            if let Ok(msg @ ServerMsg::Joined { .. }) = serde_json::from_str::<ServerMsg>(&text) {
                return Some(msg);
            }
        }
        None
    })
    .await
    .expect("joined before timeout");
    assert!(joined.is_some());
}
