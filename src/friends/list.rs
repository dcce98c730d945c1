use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{auth::AuthUser, users::User, AppResult, AppState};

use super::FriendStatus;

#[debug_handler(state = AppState)]
pub(crate) async fn friends(State(db_pool): State<SqlitePool>, user: AuthUser) -> AppResult<Json<Vec<User>>> {
    let friends = sqlx::query_as(
        "SELECT u.* FROM users u
         JOIN friend_requests fr
           ON (fr.sender_id = u.id AND fr.receiver_id = ?)
           OR (fr.receiver_id = u.id AND fr.sender_id = ?)
         WHERE fr.status = 'accepted'
         ORDER BY u.username",
    )
    .bind(user.id)
    .bind(user.id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(friends))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Relationship {
    None,
    PendingOutgoing,
    PendingIncoming,
    Friends,
}

#[derive(Debug, Serialize)]
pub(crate) struct RelationshipStatus {
    status: Relationship,
    request_id: Option<Uuid>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn status(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(other): Path<Uuid>,
) -> AppResult<Json<RelationshipStatus>> {
    let Some(request) = super::active_between(&db_pool, user.id, other).await? else {
        return Ok(Json(RelationshipStatus { status: Relationship::None, request_id: None }));
    };

    let status = match request.status {
        FriendStatus::Accepted => Relationship::Friends,
        _ if request.sender_id == user.id => Relationship::PendingOutgoing,
        _ => Relationship::PendingIncoming,
    };
    Ok(Json(RelationshipStatus { status, request_id: Some(request.id) }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn unfriend(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(other): Path<Uuid>,
) -> AppResult<StatusCode> {
    super::unfriend(&db_pool, user.id, other).await?;
    info!(user = %user.username, %other, "unfriended");
    Ok(StatusCode::NO_CONTENT)
}
