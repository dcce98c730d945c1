mod direct;

use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::AuthUser, AppError, AppResult, AppState};

pub use direct::send_direct;

pub const MAX_MESSAGE_LEN: usize = 4000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/direct", post(direct::send))
        .route("/direct/{user_id}", get(direct::conversation))
        .route("/unread", get(direct::unread))
        .route("/{id}", delete(remove))
}

/// A channel message (`room` set) or a direct message (`receiver_id` set).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub room: Option<String>,
    pub receiver_id: Option<Uuid>,
    pub body: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub const SELECT_MESSAGES: &str = "SELECT m.*, u.username AS sender_username
    FROM messages m JOIN users u ON u.id = m.sender_id";

pub fn clean_body(body: &str) -> AppResult<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::bad_request("message is empty"));
    }
    if body.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::bad_request(format!(
            "message is longer than {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(body.to_owned())
}

#[debug_handler(state = AppState)]
async fn remove(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let (sender_id,): (Uuid,) = sqlx::query_as("SELECT sender_id FROM messages WHERE id = ?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("message"))?;

    if !user.owns(sender_id) {
        return Err(AppError::forbidden("only the author or an admin may delete a message"));
    }

    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
