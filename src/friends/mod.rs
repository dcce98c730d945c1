//! Friend requests.
//!
//! Per unordered pair of users the lifecycle is `none → pending →
//! {accepted, rejected}`. A rejected request frees the pair for a new one;
//! an accepted request is what unlocks direct messages. At most one pending
//! or accepted request exists per pair, which the `friend_requests_active_pair`
//! partial unique index also guarantees.

mod list;
mod request;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use sqlx::{SqliteExecutor, SqlitePool};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{db, labelled, users, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::friends))
        .route("/requests", get(request::pending))
        .route("/request", post(request::send))
        .route("/request/{id}", delete(request::cancel))
        .route("/request/{id}/accept", put(request::accept))
        .route("/request/{id}/reject", put(request::reject))
        .route("/status/{user_id}", get(list::status))
        .route("/{user_id}", delete(list::unfriend))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FriendStatus {
    Pending,
    Accepted,
    Rejected,
}

labelled!(FriendStatus {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FriendRequest {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(skip_serializing)]
    pub user_low: Uuid,
    #[serde(skip_serializing)]
    pub user_high: Uuid,
    pub status: FriendStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub responded_at: Option<OffsetDateTime>,
}

/// Canonical ordering of an unordered pair.
pub fn ordered(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

pub async fn active_between<'e>(
    executor: impl SqliteExecutor<'e>,
    a: Uuid,
    b: Uuid,
) -> AppResult<Option<FriendRequest>> {
    let (low, high) = ordered(a, b);
    Ok(sqlx::query_as(
        "SELECT * FROM friend_requests WHERE user_low = ? AND user_high = ? AND status <> 'rejected'",
    )
    .bind(low)
    .bind(high)
    .fetch_optional(executor)
    .await?)
}

pub async fn are_friends<'e>(executor: impl SqliteExecutor<'e>, a: Uuid, b: Uuid) -> AppResult<bool> {
    let (low, high) = ordered(a, b);
    let row = sqlx::query(
        "SELECT 1 FROM friend_requests WHERE user_low = ? AND user_high = ? AND status = 'accepted'",
    )
    .bind(low)
    .bind(high)
    .fetch_optional(executor)
    .await?;
    Ok(row.is_some())
}

pub async fn send_request(db_pool: &SqlitePool, sender_id: Uuid, receiver_id: Uuid) -> AppResult<FriendRequest> {
    if sender_id == receiver_id {
        return Err(AppError::bad_request("cannot send a friend request to yourself"));
    }
    users::require(db_pool, receiver_id).await?;

    let mut tx = db_pool.begin().await?;

    if let Some(existing) = active_between(&mut *tx, sender_id, receiver_id).await? {
        return Err(match existing.status {
            FriendStatus::Accepted => AppError::conflict("already friends"),
            _ => AppError::conflict("a friend request between these users is already pending"),
        });
    }

    let (low, high) = ordered(sender_id, receiver_id);
    let request = sqlx::query_as(
        "INSERT INTO friend_requests (id,sender_id,receiver_id,user_low,user_high,status,created_at)
         VALUES (?,?,?,?,?,'pending',?) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(sender_id)
    .bind(receiver_id)
    .bind(low)
    .bind(high)
    .bind(db::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::conflict("a friend request between these users is already pending"),
        other => other,
    })?;

    tx.commit().await?;
    Ok(request)
}

/// Accepts or rejects a pending request. Only the receiver may answer, and
/// only once.
pub async fn respond(
    db_pool: &SqlitePool,
    responder_id: Uuid,
    request_id: Uuid,
    answer: FriendStatus,
) -> AppResult<FriendRequest> {
    if answer == FriendStatus::Pending {
        return Err(AppError::bad_request("a friend request can only be accepted or rejected"));
    }

    let request: FriendRequest = sqlx::query_as("SELECT * FROM friend_requests WHERE id = ?")
        .bind(request_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("friend request"))?;

    if request.receiver_id != responder_id {
        return Err(AppError::forbidden("only the receiver can answer a friend request"));
    }
    if request.status != FriendStatus::Pending {
        return Err(AppError::conflict(format!("friend request already {}", request.status)));
    }

    let request: FriendRequest = sqlx::query_as(
        "UPDATE friend_requests SET status = ?, responded_at = ?
         WHERE id = ? AND status = 'pending' RETURNING *",
    )
    .bind(answer)
    .bind(db::now())
    .bind(request_id)
    .fetch_optional(db_pool)
    .await?
    .ok_or_else(|| AppError::conflict("friend request already answered"))?;

    info!(request = %request.id, status = %request.status, "friend request answered");
    Ok(request)
}

pub async fn cancel_request(db_pool: &SqlitePool, sender_id: Uuid, request_id: Uuid) -> AppResult<()> {
    let request: FriendRequest = sqlx::query_as("SELECT * FROM friend_requests WHERE id = ?")
        .bind(request_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("friend request"))?;

    if request.sender_id != sender_id {
        return Err(AppError::forbidden("only the sender can withdraw a friend request"));
    }

    let deleted = sqlx::query("DELETE FROM friend_requests WHERE id = ? AND status = 'pending'")
        .bind(request_id)
        .execute(db_pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::conflict(format!("friend request already {}", request.status)));
    }
    Ok(())
}

pub async fn unfriend(db_pool: &SqlitePool, a: Uuid, b: Uuid) -> AppResult<()> {
    let (low, high) = ordered(a, b);
    let deleted = sqlx::query(
        "DELETE FROM friend_requests WHERE user_low = ? AND user_high = ? AND status = 'accepted'",
    )
    .bind(low)
    .bind(high)
    .execute(db_pool)
    .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::not_found("friendship"));
    }
    Ok(())
}
