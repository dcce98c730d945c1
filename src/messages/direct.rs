use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    db::{self, Page},
    friends,
    rooms::{Hub, ServerEvent},
    users::{self, User},
    AppError, AppResult, AppState,
};

use super::{clean_body, Message, SELECT_MESSAGES};

/// Stores a direct message and pushes it to both parties' sockets.
/// Only accepted friends may message each other.
pub async fn send_direct(
    db_pool: &SqlitePool,
    hub: &Hub,
    sender: &User,
    receiver_id: Uuid,
    body: &str,
) -> AppResult<Message> {
    let body = clean_body(body)?;
    users::require(db_pool, receiver_id).await?;
    if !friends::are_friends(db_pool, sender.id, receiver_id).await? {
        return Err(AppError::forbidden("direct messages are only allowed between friends"));
    }

    let message = Message {
        id: Uuid::now_v7(),
        sender_id: sender.id,
        sender_username: sender.username.clone(),
        room: None,
        receiver_id: Some(receiver_id),
        body,
        read: false,
        created_at: db::now(),
    };

    sqlx::query("INSERT INTO messages (id,sender_id,receiver_id,body,read,created_at) VALUES (?,?,?,?,FALSE,?)")
        .bind(message.id)
        .bind(message.sender_id)
        .bind(receiver_id)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(db_pool)
        .await?;

    let event = ServerEvent::ReceiveMessage { message: message.clone() };
    hub.to_user(receiver_id, &event);
    hub.to_user(sender.id, &event);

    Ok(message)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DirectMessage {
    receiver_id: Uuid,
    message: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(db_pool): State<SqlitePool>,
    State(hub): State<Hub>,
    AuthUser(sender): AuthUser,
    Json(DirectMessage { receiver_id, message }): Json<DirectMessage>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = send_direct(&db_pool, &hub, &sender, receiver_id, &message).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Conversation with one friend, oldest first. Marks what the caller
/// received as read.
#[debug_handler(state = AppState)]
pub(crate) async fn conversation(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(other): Path<Uuid>,
    Query(page): Query<Page>,
) -> AppResult<Json<Vec<Message>>> {
    if !friends::are_friends(&db_pool, user.id, other).await? {
        return Err(AppError::forbidden("direct messages are only allowed between friends"));
    }

    let mut messages: Vec<Message> = sqlx::query_as(&format!(
        "{SELECT_MESSAGES}
         WHERE ((m.sender_id = ? AND m.receiver_id = ?) OR (m.sender_id = ? AND m.receiver_id = ?))
           AND m.id < ?
         ORDER BY m.id DESC LIMIT ?"
    ))
    .bind(user.id)
    .bind(other)
    .bind(other)
    .bind(user.id)
    .bind(page.cursor())
    .bind(page.limit())
    .fetch_all(&db_pool)
    .await?;
    messages.reverse();

    sqlx::query("UPDATE messages SET read = TRUE WHERE sender_id = ? AND receiver_id = ? AND read = FALSE")
        .bind(other)
        .bind(user.id)
        .execute(&db_pool)
        .await?;

    Ok(Json(messages))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub(crate) struct UnreadFrom {
    sender_id: Uuid,
    sender_username: String,
    count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct Unread {
    total: i64,
    by_sender: Vec<UnreadFrom>,
}

/// Unread direct messages from current friends.
#[debug_handler(state = AppState)]
pub(crate) async fn unread(State(db_pool): State<SqlitePool>, user: AuthUser) -> AppResult<Json<Unread>> {
    let by_sender: Vec<UnreadFrom> = sqlx::query_as(
        "SELECT m.sender_id, u.username AS sender_username, COUNT(*) AS count
         FROM messages m JOIN users u ON u.id = m.sender_id
         WHERE m.receiver_id = ? AND m.read = FALSE
           AND EXISTS (
               SELECT 1 FROM friend_requests f
               WHERE f.status = 'accepted'
                 AND ((f.user_low = m.sender_id AND f.user_high = m.receiver_id)
                   OR (f.user_low = m.receiver_id AND f.user_high = m.sender_id))
           )
         GROUP BY m.sender_id, u.username
         ORDER BY count DESC",
    )
    .bind(user.id)
    .fetch_all(&db_pool)
    .await?;

    let total = by_sender.iter().map(|from| from.count).sum();
    Ok(Json(Unread { total, by_sender }))
}
