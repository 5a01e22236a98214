//! End-to-end tests: real listener, real WebSocket clients, no generation
//! capability (blocklist-only moderation and templated fallbacks).

#![allow(clippy::panic, missing_docs)]

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use prism_echo::api::build_app;
use prism_echo::app_state::AppState;
use prism_echo::config::ChatConfig;
use prism_echo::llm::{Capability, CapabilityError, GenerationRequest, Generator};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Classifier that approves everything after a fixed delay.
#[derive(Debug)]
struct SlowApprover(Duration);

#[async_trait]
impl Generator for SlowApprover {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, CapabilityError> {
        tokio::time::sleep(self.0).await;
        Ok("SAFE".to_string())
    }
}

async fn start_server() -> (SocketAddr, AppState) {
    start_server_with(Capability::none()).await
}

async fn start_server_with(capability: Capability) -> (SocketAddr, AppState) {
    let state = AppState::new(capability, &ChatConfig::default());
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let app = build_app(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, name: &str) -> Client {
    let Ok((ws, _)) = connect_async(format!("ws://{addr}/ws/{name}")).await else {
        panic!("websocket connect failed for {name}");
    };
    ws
}

async fn wait_for_members(state: &AppState, expected: usize) {
    for _ in 0..200 {
        if state.registry.len().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("registry never reached {expected} members");
}

async fn next_text(ws: &mut Client) -> String {
    loop {
        let Ok(frame) = tokio::time::timeout(Duration::from_secs(5), ws.next()).await else {
            panic!("timed out waiting for a message");
        };
        match frame {
            Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn send(ws: &mut Client, text: &str) {
    let Ok(()) = ws.send(Message::text(text)).await else {
        panic!("send failed");
    };
}

#[tokio::test]
async fn accepted_messages_reach_every_client() {
    let (addr, state) = start_server().await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_members(&state, 2).await;

    send(&mut alice, "hello").await;
    assert_eq!(next_text(&mut alice).await, "Client #alice says: hello");
    assert_eq!(next_text(&mut bob).await, "Client #alice says: hello");
}

#[tokio::test]
async fn rejected_message_is_private_to_sender() {
    let (addr, state) = start_server().await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_members(&state, 2).await;

    send(&mut alice, "Mass Shooting plans").await;
    assert_eq!(
        next_text(&mut alice).await,
        "Message not delivered: Content contains prohibited terms."
    );

    // Bob's next message is the follow-up, so the rejected one never reached him.
    send(&mut alice, "sorry").await;
    assert_eq!(next_text(&mut bob).await, "Client #alice says: sorry");
}

#[tokio::test]
async fn sequential_messages_keep_their_order() {
    let (addr, state) = start_server().await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_members(&state, 2).await;

    for i in 0..10 {
        send(&mut alice, &format!("m{i}")).await;
    }
    for i in 0..10 {
        assert_eq!(next_text(&mut bob).await, format!("Client #alice says: m{i}"));
    }
}

#[tokio::test]
async fn departure_is_announced_and_deregistered() {
    let (addr, state) = start_server().await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_members(&state, 2).await;

    let Ok(()) = bob.close(None).await else {
        panic!("close failed");
    };
    assert_eq!(next_text(&mut alice).await, "Client #bob left the chat");
    wait_for_members(&state, 1).await;
}

#[tokio::test]
async fn topic_command_uses_template_without_capability() {
    let (addr, state) = start_server().await;
    let mut alice = connect(addr, "alice").await;
    wait_for_members(&state, 1).await;

    send(&mut alice, "/topic four-day work week").await;
    assert_eq!(
        next_text(&mut alice).await,
        "Client #alice opened the topic \"four-day work week\": \
         What are your thoughts on: four-day work week?"
    );
}

#[tokio::test]
async fn audio_frame_broadcasts_placeholder_summary() {
    let (addr, state) = start_server().await;
    let mut alice = connect(addr, "alice").await;
    wait_for_members(&state, 1).await;

    let Ok(()) = alice.send(Message::binary(vec![0u8, 1, 2, 3])).await else {
        panic!("send failed");
    };
    assert_eq!(
        next_text(&mut alice).await,
        "Client #alice (voice) summary:\nAudio processing unavailable."
    );
}

#[tokio::test]
async fn disconnect_during_moderation_deregisters_immediately() {
    let slow = SlowApprover(Duration::from_secs(2));
    let (addr, state) = start_server_with(Capability::new(std::sync::Arc::new(slow))).await;
    let mut alice = connect(addr, "alice").await;
    let mut bob = connect(addr, "bob").await;
    wait_for_members(&state, 2).await;

    send(&mut alice, "hello").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let Ok(()) = alice.close(None).await else {
        panic!("close failed");
    };

    // Removal does not wait for the in-flight classifier call.
    let started = std::time::Instant::now();
    wait_for_members(&state, 1).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(next_text(&mut bob).await, "Client #alice left the chat");

    // The classifier finishes later; its verdict is dropped.
    let late = tokio::time::timeout(Duration::from_millis(2500), bob.next()).await;
    assert!(late.is_err(), "unexpected frame after departure: {late:?}");
}

#[tokio::test]
async fn rest_topic_is_broadcast_to_connected_clients() {
    let (addr, state) = start_server().await;
    let mut alice = connect(addr, "alice").await;
    wait_for_members(&state, 1).await;

    let http = reqwest::Client::new();
    let Ok(response) = http
        .post(format!("http://{addr}/api/v1/topic"))
        .json(&json!({ "topic": "space exploration" }))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(response.status(), 200);
    let Ok(body) = response.json::<Value>().await else {
        panic!("invalid json");
    };
    assert_eq!(body["recipients"], 1);
    assert!(body["broadcast_at"].is_string());
    assert_eq!(
        body["question"],
        "What are your thoughts on: space exploration?"
    );
    assert_eq!(
        next_text(&mut alice).await,
        "Moderator opened the topic \"space exploration\": \
         What are your thoughts on: space exploration?"
    );
}

#[tokio::test]
async fn rest_moderation_and_validation() {
    let (addr, _state) = start_server().await;
    let http = reqwest::Client::new();

    let Ok(response) = http
        .post(format!("http://{addr}/api/v1/moderate"))
        .json(&json!({ "text": "a NAZI slogan" }))
        .send()
        .await
    else {
        panic!("request failed");
    };
    let Ok(body) = response.json::<Value>().await else {
        panic!("invalid json");
    };
    assert_eq!(
        body,
        json!({ "safe": false, "reason": "Content contains prohibited terms." })
    );

    let Ok(response) = http
        .post(format!("http://{addr}/api/v1/summarize"))
        .json(&json!({ "text": "   " }))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(response.status(), 400);
    let Ok(body) = response.json::<Value>().await else {
        panic!("invalid json");
    };
    assert_eq!(body["error"]["code"], 1001);
}

#[tokio::test]
async fn health_and_banner() {
    let (addr, _state) = start_server().await;
    let Ok(response) = reqwest::get(format!("http://{addr}/")).await else {
        panic!("request failed");
    };
    let Ok(body) = response.json::<Value>().await else {
        panic!("invalid json");
    };
    assert_eq!(body["message"], "PrismEcho Backend is running");

    let Ok(response) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("request failed");
    };
    tokio_test::assert_ok!(response.error_for_status_ref());
    let Ok(body) = response.json::<Value>().await else {
        panic!("invalid json");
    };
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"], 0);
    assert_eq!(body["classifier_configured"], false);
}

#[tokio::test]
async fn closed_registry_refuses_new_sessions() {
    let (addr, state) = start_server().await;
    let mut alice = connect(addr, "alice").await;
    wait_for_members(&state, 1).await;

    assert_eq!(state.registry.close().await, 1);
    match tokio::time::timeout(Duration::from_secs(5), alice.next()).await {
        Ok(Some(Ok(Message::Close(_))) | None | Some(Err(_))) => {}
        other => panic!("expected the session to end, got {other:?}"),
    }
    assert!(connect_async(format!("ws://{addr}/ws/late")).await.is_err());
}
