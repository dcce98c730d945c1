use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{roles::COMMITTEE, AuthUser},
    db::{self, Page},
    messages::{clean_body, Message, SELECT_MESSAGES},
    users::User,
    AppError, AppResult, AppState,
};

use super::{Hub, ServerEvent};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Channel {
    pub name: String,
    pub description: String,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn validate_name(name: &str) -> AppResult<()> {
    let valid = (1..=32).contains(&name.len())
        && name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(AppError::bad_request("channel names are 1-32 characters of a-z, 0-9 and '-'"))
    }
}

pub(super) async fn require_channel(db_pool: &SqlitePool, room: &str) -> AppResult<()> {
    sqlx::query("SELECT 1 FROM channels WHERE name = ?")
        .bind(room)
        .fetch_optional(db_pool)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found(format!("channel {room:?}")))
}

/// Stores a channel message and broadcasts it to everyone in the room.
pub async fn post_to_channel(
    db_pool: &SqlitePool,
    hub: &Hub,
    sender: &User,
    room: &str,
    body: &str,
) -> AppResult<Message> {
    let body = clean_body(body)?;
    require_channel(db_pool, room).await?;

    let message = Message {
        id: Uuid::now_v7(),
        sender_id: sender.id,
        sender_username: sender.username.clone(),
        room: Some(room.to_owned()),
        receiver_id: None,
        body,
        read: false,
        created_at: db::now(),
    };

    sqlx::query("INSERT INTO messages (id,sender_id,room,body,read,created_at) VALUES (?,?,?,?,FALSE,?)")
        .bind(message.id)
        .bind(message.sender_id)
        .bind(room)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(db_pool)
        .await?;

    hub.to_room(room, &ServerEvent::ReceiveMessage { message: message.clone() });
    Ok(message)
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(State(db_pool): State<SqlitePool>, _user: AuthUser) -> AppResult<Json<Vec<Channel>>> {
    let channels = sqlx::query_as("SELECT * FROM channels ORDER BY name")
        .fetch_all(&db_pool)
        .await?;
    Ok(Json(channels))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewChannel {
    name: String,
    #[serde(default)]
    description: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(NewChannel { name, description }): Json<NewChannel>,
) -> AppResult<(StatusCode, Json<Channel>)> {
    user.require(COMMITTEE)?;
    let name = name.trim().to_owned();
    validate_name(&name)?;

    let channel: Channel = sqlx::query_as(
        "INSERT INTO channels (name,description,created_by,created_at) VALUES (?,?,?,?) RETURNING *",
    )
    .bind(&name)
    .bind(description.trim())
    .bind(user.id)
    .bind(db::now())
    .fetch_one(&db_pool)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::conflict(format!("channel {name:?} already exists")),
        other => other,
    })?;

    info!(channel = %channel.name, by = %user.username, "channel created");
    Ok((StatusCode::CREATED, Json(channel)))
}

/// Channel history, oldest first, paged backwards with `before`.
#[debug_handler(state = AppState)]
pub(crate) async fn history(
    State(db_pool): State<SqlitePool>,
    _user: AuthUser,
    Path(room): Path<String>,
    Query(page): Query<Page>,
) -> AppResult<Json<Vec<Message>>> {
    require_channel(&db_pool, &room).await?;

    let mut messages: Vec<Message> = sqlx::query_as(&format!(
        "{SELECT_MESSAGES} WHERE m.room = ? AND m.id < ? ORDER BY m.id DESC LIMIT ?"
    ))
    .bind(&room)
    .bind(page.cursor())
    .bind(page.limit())
    .fetch_all(&db_pool)
    .await?;
    messages.reverse();

    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelPost {
    message: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn post(
    State(db_pool): State<SqlitePool>,
    State(hub): State<Hub>,
    AuthUser(sender): AuthUser,
    Path(room): Path<String>,
    Json(ChannelPost { message }): Json<ChannelPost>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = post_to_channel(&db_pool, &hub, &sender, &room, &message).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
