use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{
        roles::{EVENT_APPROVERS, ORGANIZERS},
        AuthUser,
    },
    db,
    error::required,
    workflow::{self, StatusChange},
    AppResult, AppState,
};

use super::{validate_schedule, Event, EventStatus};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EventFilter {
    status: Option<EventStatus>,
    #[serde(default)]
    upcoming: bool,
}

/// Events by start time. Drafts are filtered out for callers who may not see them.
#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Query(EventFilter { status, upcoming }): Query<EventFilter>,
) -> AppResult<Json<Vec<Event>>> {
    let events: Vec<Event> = sqlx::query_as(
        "SELECT * FROM events
         WHERE (? IS NULL OR status = ?)
           AND (? = FALSE OR ends_at >= ?)
         ORDER BY starts_at",
    )
    .bind(status)
    .bind(status)
    .bind(upcoming)
    .bind(db::now())
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(events.into_iter().filter(|event| event.visible_to(&user)).collect()))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Event>> {
    Ok(Json(super::require_visible(&db_pool, id, &user).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewEvent {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    venue: String,
    #[serde(with = "time::serde::rfc3339")]
    starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    ends_at: OffsetDateTime,
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(new): Json<NewEvent>,
) -> AppResult<(StatusCode, Json<Event>)> {
    user.require(ORGANIZERS)?;
    let title = required("title", &new.title)?;
    let (starts_at, ends_at) = (db::utc(new.starts_at), db::utc(new.ends_at));
    validate_schedule(starts_at, ends_at)?;
    let now = db::now();

    let event: Event = sqlx::query_as(
        "INSERT INTO events (id,title,description,venue,starts_at,ends_at,created_by,status,created_at,updated_at)
         VALUES (?,?,?,?,?,?,?,'draft',?,?) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&title)
    .bind(new.description.trim())
    .bind(new.venue.trim())
    .bind(starts_at)
    .bind(ends_at)
    .bind(user.id)
    .bind(now)
    .bind(now)
    .fetch_one(&db_pool)
    .await?;

    info!(event = %event.id, by = %user.username, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateEvent {
    title: Option<String>,
    description: Option<String>,
    venue: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    starts_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    ends_at: Option<OffsetDateTime>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn update(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateEvent>,
) -> AppResult<Json<Event>> {
    let event = super::require(&db_pool, id).await?;
    user.require_owner(event.created_by, "event")?;

    let title = update.title.as_deref().map(|title| required("title", title)).transpose()?;
    let starts_at = update.starts_at.map_or(event.starts_at, db::utc);
    let ends_at = update.ends_at.map_or(event.ends_at, db::utc);
    validate_schedule(starts_at, ends_at)?;

    let event = sqlx::query_as(
        "UPDATE events SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            venue = COALESCE(?, venue),
            starts_at = ?,
            ends_at = ?,
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(title)
    .bind(update.description.as_deref().map(str::trim))
    .bind(update.venue.as_deref().map(str::trim))
    .bind(starts_at)
    .bind(ends_at)
    .bind(db::now())
    .bind(id)
    .fetch_one(&db_pool)
    .await?;

    Ok(Json(event))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let event = super::require(&db_pool, id).await?;
    user.require_owner(event.created_by, "event")?;

    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(id)
        .execute(&db_pool)
        .await?;

    info!(event = %id, by = %user.username, "event deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_status(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(StatusChange { status }): Json<StatusChange<EventStatus>>,
) -> AppResult<Json<Event>> {
    let event = super::require(&db_pool, id).await?;
    workflow::check(event.status, status, user.owns(event.created_by), user.holds(EVENT_APPROVERS))?;

    let updated: Event = workflow::apply(&db_pool, "events", id, event.status, status).await?;

    info!(event = %id, from = %event.status, to = %status, by = %user.username, "event status changed");
    Ok(Json(updated))
}
