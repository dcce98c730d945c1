use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::AuthUser, db, AppError, AppResult, AppState};

use super::EventStatus;

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let event = super::require_visible(&db_pool, id, &user).await?;
    if event.status != EventStatus::Open {
        return Err(AppError::conflict(format!("registration is closed while the event is {}", event.status)));
    }

    sqlx::query("INSERT INTO event_registrations (event_id,user_id,registered_at) VALUES (?,?,?)")
        .bind(id)
        .bind(user.id)
        .bind(db::now())
        .execute(&db_pool)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::conflict("already registered"),
            other => other,
        })?;

    Ok(StatusCode::CREATED)
}

#[debug_handler(state = AppState)]
pub(crate) async fn unregister(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let removed = sqlx::query("DELETE FROM event_registrations WHERE event_id = ? AND user_id = ?")
        .bind(id)
        .bind(user.id)
        .execute(&db_pool)
        .await?
        .rows_affected();

    if removed == 0 {
        return Err(AppError::not_found("registration"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub(crate) struct Registration {
    user_id: Uuid,
    username: String,
    #[serde(with = "time::serde::rfc3339")]
    registered_at: OffsetDateTime,
}

/// Attendee list for the event's creator and admins.
#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Registration>>> {
    let event = super::require(&db_pool, id).await?;
    user.require_owner(event.created_by, "event")?;

    let registrations = sqlx::query_as(
        "SELECT r.user_id, u.username, r.registered_at
         FROM event_registrations r JOIN users u ON u.id = r.user_id
         WHERE r.event_id = ?
         ORDER BY r.registered_at",
    )
    .bind(id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(registrations))
}
