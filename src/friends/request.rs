use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{auth::AuthUser, AppResult, AppState};

use super::{FriendRequest, FriendStatus};

#[derive(Debug, Deserialize)]
pub(crate) struct SendRequest {
    receiver_id: Uuid,
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(db_pool): State<SqlitePool>,
    sender: AuthUser,
    Json(SendRequest { receiver_id }): Json<SendRequest>,
) -> AppResult<(StatusCode, Json<FriendRequest>)> {
    let request = super::send_request(&db_pool, sender.id, receiver_id).await?;
    info!(from = %sender.username, to = %receiver_id, "friend request sent");
    Ok((StatusCode::CREATED, Json(request)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn accept(
    State(db_pool): State<SqlitePool>,
    receiver: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FriendRequest>> {
    Ok(Json(super::respond(&db_pool, receiver.id, id, FriendStatus::Accepted).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn reject(
    State(db_pool): State<SqlitePool>,
    receiver: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<FriendRequest>> {
    Ok(Json(super::respond(&db_pool, receiver.id, id, FriendStatus::Rejected).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn cancel(
    State(db_pool): State<SqlitePool>,
    sender: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    super::cancel_request(&db_pool, sender.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub(crate) struct PendingRequest {
    #[serde(flatten)]
    #[sqlx(flatten)]
    request: FriendRequest,
    sender_username: String,
    receiver_username: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PendingRequests {
    incoming: Vec<PendingRequest>,
    outgoing: Vec<PendingRequest>,
}

const PENDING: &str = "SELECT fr.*, s.username AS sender_username, r.username AS receiver_username
    FROM friend_requests fr
    JOIN users s ON s.id = fr.sender_id
    JOIN users r ON r.id = fr.receiver_id
    WHERE fr.status = 'pending'";

#[debug_handler(state = AppState)]
pub(crate) async fn pending(State(db_pool): State<SqlitePool>, user: AuthUser) -> AppResult<Json<PendingRequests>> {
    let incoming = sqlx::query_as(&format!("{PENDING} AND fr.receiver_id = ? ORDER BY fr.id DESC"))
        .bind(user.id)
        .fetch_all(&db_pool)
        .await?;
    let outgoing = sqlx::query_as(&format!("{PENDING} AND fr.sender_id = ? ORDER BY fr.id DESC"))
        .bind(user.id)
        .fetch_all(&db_pool)
        .await?;

    Ok(Json(PendingRequests { incoming, outgoing }))
}
