mod common;

use axum::http::StatusCode;
use clubhouse::users::Role;
use common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn request_accept_then_direct_message() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;

    let sent = app
        .post("/api/friends/request", &a, json!({ "receiver_id": b.id() }))
        .await;
    assert_eq!(sent.status, StatusCode::CREATED, "{}", sent.body);
    assert_eq!(sent.body["status"], "pending");
    let id = sent.body["id"].as_str().unwrap().to_owned();

    let pending = app.get("/api/friends/requests", &b).await;
    assert_eq!(pending.body["incoming"][0]["sender_username"], "alice");

    let accepted = app
        .put(&format!("/api/friends/request/{id}/accept"), &b, Value::Null)
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.body["status"], "accepted");

    let dm = app
        .post("/api/messages/direct", &a, json!({ "receiver_id": b.id(), "message": "hi" }))
        .await;
    assert_eq!(dm.status, StatusCode::CREATED, "{}", dm.body);

    let unread = app.get("/api/messages/unread", &b).await;
    assert_eq!(unread.body["total"], 1);
    assert_eq!(unread.body["by_sender"][0]["sender_username"], "alice");

    let conversation = app.get(&format!("/api/messages/direct/{}", a.id()), &b).await;
    assert_eq!(conversation.status, StatusCode::OK);
    let messages = conversation.body.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["body"], "hi");
    assert_eq!(messages[0]["sender_username"], "alice");

    let unread = app.get("/api/messages/unread", &b).await;
    assert_eq!(unread.body["total"], 0);
}

#[tokio::test]
async fn a_second_accept_conflicts_and_keeps_the_request_accepted() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;

    let sent = app
        .post("/api/friends/request", &a, json!({ "receiver_id": b.id() }))
        .await;
    let id = sent.body["id"].as_str().unwrap().to_owned();

    let first = app.put(&format!("/api/friends/request/{id}/accept"), &b, Value::Null).await;
    assert_eq!(first.status, StatusCode::OK);
    let second = app.put(&format!("/api/friends/request/{id}/accept"), &b, Value::Null).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    let reject = app.put(&format!("/api/friends/request/{id}/reject"), &b, Value::Null).await;
    assert_eq!(reject.status, StatusCode::CONFLICT);

    let status = app.get(&format!("/api/friends/status/{}", b.id()), &a).await;
    assert_eq!(status.body["status"], "friends");
}

#[tokio::test]
async fn only_one_active_request_per_pair() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;

    let sent = app
        .post("/api/friends/request", &a, json!({ "receiver_id": b.id() }))
        .await;
    assert_eq!(sent.status, StatusCode::CREATED);

    let again = app
        .post("/api/friends/request", &a, json!({ "receiver_id": b.id() }))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let reverse = app
        .post("/api/friends/request", &b, json!({ "receiver_id": a.id() }))
        .await;
    assert_eq!(reverse.status, StatusCode::CONFLICT);

    let status = app.get(&format!("/api/friends/status/{}", a.id()), &b).await;
    assert_eq!(status.body["status"], "pending_incoming");
}

#[tokio::test]
async fn rejection_frees_the_pair() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;

    let sent = app
        .post("/api/friends/request", &a, json!({ "receiver_id": b.id() }))
        .await;
    let id = sent.body["id"].as_str().unwrap().to_owned();

    let rejected = app.put(&format!("/api/friends/request/{id}/reject"), &b, Value::Null).await;
    assert_eq!(rejected.body["status"], "rejected");

    let dm = app
        .post("/api/messages/direct", &a, json!({ "receiver_id": b.id(), "message": "please?" }))
        .await;
    assert_eq!(dm.status, StatusCode::FORBIDDEN);

    let retry = app
        .post("/api/friends/request", &b, json!({ "receiver_id": a.id() }))
        .await;
    assert_eq!(retry.status, StatusCode::CREATED);
}

#[tokio::test]
async fn only_the_receiver_answers() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;
    let c = app.member("carla", Role::Admin).await;

    let sent = app
        .post("/api/friends/request", &a, json!({ "receiver_id": b.id() }))
        .await;
    let id = sent.body["id"].as_str().unwrap().to_owned();

    for who in [&a, &c] {
        let reply = app.put(&format!("/api/friends/request/{id}/accept"), who, Value::Null).await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
    }

    let missing = app
        .put(&format!("/api/friends/request/{}/accept", Uuid::now_v7()), &b, Value::Null)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn self_and_unknown_receivers_are_rejected() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;

    let own = app
        .post("/api/friends/request", &a, json!({ "receiver_id": a.id() }))
        .await;
    assert_eq!(own.status, StatusCode::BAD_REQUEST);

    let ghost = app
        .post("/api/friends/request", &a, json!({ "receiver_id": Uuid::now_v7() }))
        .await;
    assert_eq!(ghost.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn strangers_cannot_read_or_write_direct_messages() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;

    let send = app
        .post("/api/messages/direct", &a, json!({ "receiver_id": b.id(), "message": "hi" }))
        .await;
    assert_eq!(send.status, StatusCode::FORBIDDEN);

    let read = app.get(&format!("/api/messages/direct/{}", a.id()), &b).await;
    assert_eq!(read.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unfriending_locks_messages_again() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;
    app.befriend(&a, &b).await;

    let friends = app.get("/api/friends", &a).await;
    assert_eq!(friends.body[0]["username"], "bruno");

    let removed = app.delete(&format!("/api/friends/{}", a.id()), &b).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);

    let dm = app
        .post("/api/messages/direct", &a, json!({ "receiver_id": b.id(), "message": "still there?" }))
        .await;
    assert_eq!(dm.status, StatusCode::FORBIDDEN);

    let status = app.get(&format!("/api/friends/status/{}", b.id()), &a).await;
    assert_eq!(status.body["status"], "none");
}

#[tokio::test]
async fn senders_may_cancel_pending_requests() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;

    let sent = app
        .post("/api/friends/request", &a, json!({ "receiver_id": b.id() }))
        .await;
    let id = sent.body["id"].as_str().unwrap().to_owned();

    let by_receiver = app.delete(&format!("/api/friends/request/{id}"), &b).await;
    assert_eq!(by_receiver.status, StatusCode::FORBIDDEN);

    let cancelled = app.delete(&format!("/api/friends/request/{id}"), &a).await;
    assert_eq!(cancelled.status, StatusCode::NO_CONTENT);

    let pending = app.get("/api/friends/requests", &b).await;
    assert!(pending.body["incoming"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn channel_messages_and_deletion() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;
    let admin = app.member("root", Role::Admin).await;

    let posted = app
        .post("/api/messages/channel/general", &a, json!({ "message": "hello all" }))
        .await;
    assert_eq!(posted.status, StatusCode::CREATED, "{}", posted.body);
    let id = posted.body["id"].as_str().unwrap().to_owned();

    let missing = app
        .post("/api/messages/channel/nowhere", &a, json!({ "message": "hello?" }))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let history = app.get("/api/messages/channel/general", &b).await;
    assert_eq!(history.body[0]["body"], "hello all");

    let by_other = app.delete(&format!("/api/messages/{id}"), &b).await;
    assert_eq!(by_other.status, StatusCode::FORBIDDEN);

    let by_admin = app.delete(&format!("/api/messages/{id}"), &admin).await;
    assert_eq!(by_admin.status, StatusCode::NO_CONTENT);

    let history = app.get("/api/messages/channel/general", &b).await;
    assert!(history.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn conversation_pages_backwards() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;
    app.befriend(&a, &b).await;

    for n in 1..=5 {
        let sent = app
            .post("/api/messages/direct", &a, json!({ "receiver_id": b.id(), "message": format!("m{n}") }))
            .await;
        assert_eq!(sent.status, StatusCode::CREATED);
    }

    let latest = app.get(&format!("/api/messages/direct/{}?limit=2", b.id()), &a).await;
    let bodies: Vec<_> = latest.body.as_array().unwrap().iter().map(|m| m["body"].clone()).collect();
    assert_eq!(bodies, [json!("m4"), json!("m5")]);

    let oldest_id = latest.body[0]["id"].as_str().unwrap();
    let earlier = app
        .get(&format!("/api/messages/direct/{}?limit=2&before={oldest_id}", b.id()), &a)
        .await;
    let bodies: Vec<_> = earlier.body.as_array().unwrap().iter().map(|m| m["body"].clone()).collect();
    assert_eq!(bodies, [json!("m2"), json!("m3")]);
}

#[tokio::test]
async fn unread_counts_drop_messages_from_former_friends() {
    let app = TestApp::new().await;
    let a = app.member("alice", Role::Student).await;
    let b = app.member("bruno", Role::Student).await;
    app.befriend(&a, &b).await;

    let dm = app
        .post("/api/messages/direct", &a, json!({ "receiver_id": b.id(), "message": "hi" }))
        .await;
    assert_eq!(dm.status, StatusCode::CREATED);
    assert_eq!(app.get("/api/messages/unread", &b).await.body["total"], 1);

    let removed = app.delete(&format!("/api/friends/{}", b.id()), &a).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);

    let read = app.get(&format!("/api/messages/direct/{}", a.id()), &b).await;
    assert_eq!(read.status, StatusCode::FORBIDDEN);

    let unread = app.get("/api/messages/unread", &b).await;
    assert_eq!(unread.body["total"], 0);
    assert!(unread.body["by_sender"].as_array().unwrap().is_empty());

    app.befriend(&b, &a).await;
    let unread = app.get("/api/messages/unread", &b).await;
    assert_eq!(unread.body["total"], 1);
}
