mod common;

use std::time::Duration;

use clubhouse::users::Role;
use common::{Member, TestApp};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serves the app on an ephemeral port; the state (and hub) stays shared with `app`.
async fn serve(app: &TestApp) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("ws://{addr}/api/socket")
}

async fn connect(url: &str, who: &Member) -> Client {
    let (client, _) = connect_async(format!("{url}?token={}", who.token)).await.unwrap();
    client
}

async fn send(client: &mut Client, event: Value) {
    client.send(Message::text(event.to_string())).await.unwrap();
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("socket event in time")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn joined_sockets_receive_channel_posts() {
    let app = TestApp::new().await;
    let url = serve(&app).await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;

    let mut listener = connect(&url, &b).await;
    send(&mut listener, json!({ "event": "join-room", "room": "general" })).await;
    assert_eq!(next_event(&mut listener).await, json!({ "event": "joined", "room": "general" }));

    let posted = app
        .post("/api/messages/channel/general", &a, json!({ "message": "over REST" }))
        .await;
    assert_eq!(posted.status, axum::http::StatusCode::CREATED);

    let event = next_event(&mut listener).await;
    assert_eq!(event["event"], "receive-message");
    assert_eq!(event["message"]["body"], "over REST");
    assert_eq!(event["message"]["room"], "general");
    assert_eq!(event["message"]["sender_username"], "alice");

    let mut speaker = connect(&url, &a).await;
    send(&mut speaker, json!({ "event": "send-message", "room": "general", "message": "over the socket" })).await;
    let event = next_event(&mut listener).await;
    assert_eq!(event["message"]["body"], "over the socket");

    let history = app.get("/api/messages/channel/general", &b).await;
    assert_eq!(history.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn direct_messages_reach_the_personal_stream() {
    let app = TestApp::new().await;
    let url = serve(&app).await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;
    app.befriend(&a, &b).await;

    let mut inbox = connect(&url, &b).await;
    // a round trip proves the personal stream is subscribed
    send(&mut inbox, json!({ "event": "join-room", "room": "general" })).await;
    assert_eq!(next_event(&mut inbox).await["event"], "joined");

    let mut outbox = connect(&url, &a).await;
    send(&mut outbox, json!({ "event": "send-message", "to": b.id(), "message": "psst" })).await;

    let event = next_event(&mut inbox).await;
    assert_eq!(event["event"], "receive-message");
    assert_eq!(event["message"]["body"], "psst");
    assert_eq!(event["message"]["receiver_id"], json!(b.id()));

    let echo = next_event(&mut outbox).await;
    assert_eq!(echo["message"]["body"], "psst");
}

#[tokio::test]
async fn bad_frames_get_error_events() {
    let app = TestApp::new().await;
    let url = serve(&app).await;
    let a = app.member("alice", Role::Student).await;
    let stranger = app.member("stranger", Role::Student).await;
    let mut client = connect(&url, &a).await;

    send(&mut client, json!({ "event": "shout" })).await;
    assert_eq!(next_event(&mut client).await["event"], "error");

    send(&mut client, json!({ "event": "join-room", "room": "nowhere" })).await;
    let event = next_event(&mut client).await;
    assert_eq!(event["event"], "error");
    assert_eq!(event["message"], "channel \"nowhere\" not found");

    send(&mut client, json!({ "event": "send-message", "message": "to whom?" })).await;
    assert_eq!(next_event(&mut client).await["event"], "error");

    send(&mut client, json!({ "event": "send-message", "to": stranger.id(), "message": "hi" })).await;
    let event = next_event(&mut client).await;
    assert_eq!(event["message"], "direct messages are only allowed between friends");

    send(&mut client, json!({ "event": "leave-room", "room": "general" })).await;
    assert_eq!(next_event(&mut client).await, json!({ "event": "left", "room": "general" }));
}

#[tokio::test]
async fn sockets_need_a_token() {
    let app = TestApp::new().await;
    let url = serve(&app).await;
    assert!(connect_async(url).await.is_err());
}
