//! End-to-end tests: a real server on an ephemeral port, driven by
//! WebSocket clients speaking the JSON event protocol.

use std::time::Duration;

use deathgame::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =========================================================================
// Helpers
// =========================================================================

async fn start_server() -> String {
    let server = DeathGameServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("build server");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    format!("ws://{addr}")
}

async fn connect(url: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("connect");
    ws
}

async fn send(ws: &mut ClientWs, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.expect("send");
}

/// Next server event, failing the test after two seconds of silence.
async fn next_event(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("decode"),
            Message::Binary(bytes) => return serde_json::from_slice(&bytes).expect("decode"),
            _ => continue,
        }
    }
}

fn expect_error(event: ServerEvent, code: ErrorCode) -> String {
    match event {
        ServerEvent::Error(reply) => {
            assert_eq!(reply.code, code, "unexpected error: {}", reply.message);
            reply.message
        }
        other => panic!("expected {code} error, got {other:?}"),
    }
}

/// Creates a room and returns its code and the creator's id.
async fn create_room(ws: &mut ClientWs, name: &str) -> (String, PlayerId) {
    send(ws, json!({ "event": "createRoom", "data": { "playerName": name } })).await;
    let ack = next_event(ws).await;
    let ServerEvent::RoomCreated { room_code, player_id } = ack else {
        panic!("expected roomCreated, got {ack:?}");
    };
    let roster = next_event(ws).await;
    assert!(matches!(roster, ServerEvent::PlayerJoined { .. }));
    (room_code.as_str().to_string(), player_id)
}

async fn join_room(ws: &mut ClientWs, code: &str, name: &str) -> PlayerId {
    send(
        ws,
        json!({ "event": "joinRoom", "data": { "roomCode": code, "playerName": name } }),
    )
    .await;
    match next_event(ws).await {
        ServerEvent::JoinedRoom { player_id } => player_id,
        other => panic!("expected joinedRoom, got {other:?}"),
    }
}

fn roster_names(event: &ServerEvent) -> Vec<String> {
    match event {
        ServerEvent::PlayerJoined { players } => players.iter().map(|p| p.name.clone()).collect(),
        other => panic!("expected playerJoined, got {other:?}"),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_create_room_acks_then_sends_roster() {
    let url = start_server().await;
    let mut ws = connect(&url).await;

    send(&mut ws, json!({ "event": "createRoom", "data": { "playerName": "Alice" } })).await;

    let ack = next_event(&mut ws).await;
    let ServerEvent::RoomCreated { room_code, player_id } = ack else {
        panic!("expected roomCreated, got {ack:?}");
    };
    assert_eq!(room_code.as_str().len(), 6);

    match next_event(&mut ws).await {
        ServerEvent::PlayerJoined { players } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].id, player_id);
            assert_eq!(players[0].name, "Alice");
            assert_eq!(players[0].points, 0);
            assert!(players[0].is_alive);
        }
        other => panic!("expected playerJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_broadcasts_roster_to_everyone() {
    let url = start_server().await;
    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;

    let (code, alice_id) = create_room(&mut alice, "Alice").await;
    let bob_id = join_room(&mut bob, &code.to_lowercase(), "Bob").await;
    assert_ne!(alice_id, bob_id);

    let seen_by_bob = next_event(&mut bob).await;
    let seen_by_alice = next_event(&mut alice).await;
    assert_eq!(roster_names(&seen_by_bob), ["Alice", "Bob"]);
    assert_eq!(seen_by_alice, seen_by_bob);
}

#[tokio::test]
async fn test_invalid_name_rejected() {
    let url = start_server().await;
    let mut ws = connect(&url).await;

    send(&mut ws, json!({ "event": "createRoom", "data": { "playerName": "   " } })).await;
    expect_error(next_event(&mut ws).await, ErrorCode::InvalidName);

    // The connection stays usable.
    let (code, _) = create_room(&mut ws, "Alice").await;
    assert_eq!(code.len(), 6);
}

#[tokio::test]
async fn test_malformed_frame_is_bad_request() {
    let url = start_server().await;
    let mut ws = connect(&url).await;

    ws.send(Message::text("not json")).await.expect("send");
    expect_error(next_event(&mut ws).await, ErrorCode::BadRequest);

    send(&mut ws, json!({ "event": "fly", "data": {} })).await;
    expect_error(next_event(&mut ws).await, ErrorCode::BadRequest);
}

#[tokio::test]
async fn test_unknown_room() {
    let url = start_server().await;
    let mut ws = connect(&url).await;

    send(
        &mut ws,
        json!({ "event": "joinRoom", "data": { "roomCode": "ZZZZZZ", "playerName": "Bob" } }),
    )
    .await;
    expect_error(next_event(&mut ws).await, ErrorCode::RoomNotFound);

    send(
        &mut ws,
        json!({ "event": "submitNumber", "data": { "roomCode": "ZZZZZZ", "number": 50 } }),
    )
    .await;
    expect_error(next_event(&mut ws).await, ErrorCode::RoomNotFound);
}

#[tokio::test]
async fn test_submit_in_room_not_joined() {
    let url = start_server().await;
    let mut alice = connect(&url).await;
    let mut mallory = connect(&url).await;

    let (code, _) = create_room(&mut alice, "Alice").await;
    send(
        &mut mallory,
        json!({ "event": "submitNumber", "data": { "roomCode": code, "number": 50 } }),
    )
    .await;
    expect_error(next_event(&mut mallory).await, ErrorCode::PlayerNotFound);
}

#[tokio::test]
async fn test_submit_before_start() {
    let url = start_server().await;
    let mut ws = connect(&url).await;

    let (code, _) = create_room(&mut ws, "Alice").await;
    send(
        &mut ws,
        json!({ "event": "submitNumber", "data": { "roomCode": code, "number": 50 } }),
    )
    .await;
    expect_error(next_event(&mut ws).await, ErrorCode::RoundNotActive);
}

#[tokio::test]
async fn test_start_game_rules() {
    let url = start_server().await;
    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;

    let (code, _) = create_room(&mut alice, "Alice").await;
    send(&mut alice, json!({ "event": "startGame", "data": { "roomCode": code } })).await;
    expect_error(next_event(&mut alice).await, ErrorCode::NotEnoughPlayers);

    join_room(&mut bob, &code, "Bob").await;
    next_event(&mut bob).await; // roster
    next_event(&mut alice).await; // roster

    send(&mut bob, json!({ "event": "startGame", "data": { "roomCode": code } })).await;
    expect_error(next_event(&mut bob).await, ErrorCode::NotRoomCreator);
}

#[tokio::test]
async fn test_second_room_per_connection_rejected() {
    let url = start_server().await;
    let mut ws = connect(&url).await;

    let (code, _) = create_room(&mut ws, "Alice").await;
    send(&mut ws, json!({ "event": "createRoom", "data": { "playerName": "Again" } })).await;
    let message = expect_error(next_event(&mut ws).await, ErrorCode::AlreadyInRoom);
    assert!(message.contains(&code));
}

#[tokio::test]
async fn test_round_plays_out_over_the_socket() {
    let url = start_server().await;
    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;

    let (code, alice_id) = create_room(&mut alice, "Alice").await;
    let bob_id = join_room(&mut bob, &code, "Bob").await;
    next_event(&mut bob).await;
    next_event(&mut alice).await;

    send(&mut alice, json!({ "event": "startGame", "data": { "roomCode": code } })).await;
    for ws in [&mut alice, &mut bob] {
        match next_event(ws).await {
            ServerEvent::GameStart(info) => {
                assert_eq!(info.round, 1);
                assert_eq!(info.time_limit, 30);
            }
            other => panic!("expected gameStart, got {other:?}"),
        }
    }

    send(
        &mut alice,
        json!({ "event": "submitNumber", "data": { "roomCode": code, "number": 40 } }),
    )
    .await;
    send(
        &mut alice,
        json!({ "event": "submitNumber", "data": { "roomCode": code, "number": 41 } }),
    )
    .await;
    expect_error(next_event(&mut alice).await, ErrorCode::AlreadySubmitted);

    send(
        &mut bob,
        json!({ "event": "submitNumber", "data": { "roomCode": code, "number": 60 } }),
    )
    .await;

    // average 50, target 40: Alice wins, Bob loses a point.
    for ws in [&mut alice, &mut bob] {
        match next_event(ws).await {
            ServerEvent::RoundResults(results) => {
                assert_eq!(results.round, 1);
                assert_eq!(results.average, 50.0);
                assert_eq!(results.target, 40.0);
                assert_eq!(results.winner.map(|w| w.id), Some(alice_id));
                assert_eq!(results.numbers.get(&bob_id), Some(&60));
                assert!(results.eliminations.is_empty());
            }
            other => panic!("expected roundResults, got {other:?}"),
        }
        match next_event(ws).await {
            ServerEvent::PlayerJoined { players } => {
                let bob = players.iter().find(|p| p.id == bob_id).expect("bob listed");
                assert_eq!(bob.points, -1);
            }
            other => panic!("expected playerJoined, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_submit_with_non_numeric_number_is_invalid() {
    let url = start_server().await;
    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;

    let (code, _) = create_room(&mut alice, "Alice").await;
    join_room(&mut bob, &code, "Bob").await;
    next_event(&mut bob).await;
    next_event(&mut alice).await;
    send(&mut alice, json!({ "event": "startGame", "data": { "roomCode": code } })).await;
    assert!(matches!(next_event(&mut alice).await, ServerEvent::GameStart(_)));

    for number in [json!(null), json!("42")] {
        send(
            &mut alice,
            json!({ "event": "submitNumber", "data": { "roomCode": code, "number": number } }),
        )
        .await;
        expect_error(next_event(&mut alice).await, ErrorCode::InvalidNumber);
    }

    // Neither counted as a submission.
    send(
        &mut alice,
        json!({ "event": "submitNumber", "data": { "roomCode": code, "number": 42 } }),
    )
    .await;
    send(
        &mut alice,
        json!({ "event": "submitNumber", "data": { "roomCode": code, "number": 43 } }),
    )
    .await;
    expect_error(next_event(&mut alice).await, ErrorCode::AlreadySubmitted);
}

#[tokio::test]
async fn test_stalled_upgrade_does_not_block_other_clients() {
    let url = start_server().await;
    let addr = url.trim_start_matches("ws://");

    // Opens TCP but never sends the WebSocket upgrade.
    let _stalled = TcpStream::connect(addr).await.expect("tcp connect");

    let mut ws = tokio::time::timeout(Duration::from_secs(2), connect(&url))
        .await
        .expect("upgrade should not wait behind the stalled client");
    let (code, _) = create_room(&mut ws, "Alice").await;
    assert_eq!(code.len(), 6);
}

#[tokio::test]
async fn test_lobby_disconnect_frees_seat() {
    let url = start_server().await;
    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;

    let (code, _) = create_room(&mut alice, "Alice").await;
    join_room(&mut bob, &code, "Bob").await;
    next_event(&mut bob).await;
    next_event(&mut alice).await;

    bob.close(None).await.expect("close");

    assert_eq!(roster_names(&next_event(&mut alice).await), ["Alice"]);
}
