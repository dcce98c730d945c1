mod crud;
mod registration;

use axum::{
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{roles::EVENT_APPROVERS, AuthUser},
    labelled,
    workflow::{Actor, Workflow},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(crud::list).post(crud::create))
        .route("/{id}", get(crud::get).put(crud::update).delete(crud::remove))
        .route("/{id}/status", put(crud::set_status))
        .route("/{id}/register", post(registration::register).delete(registration::unregister))
        .route("/{id}/registrations", get(registration::list))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Approved,
    Open,
    Completed,
    Cancelled,
}

labelled!(EventStatus {
    Draft => "draft",
    Approved => "approved",
    Open => "open",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl Workflow for EventStatus {
    const EDGES: &'static [(Self, Self, Actor)] = &[
        (Self::Draft, Self::Approved, Actor::Approver),
        (Self::Approved, Self::Open, Actor::Either),
        (Self::Open, Self::Completed, Actor::Either),
        (Self::Draft, Self::Cancelled, Actor::Either),
        (Self::Approved, Self::Cancelled, Actor::Either),
        (Self::Open, Self::Cancelled, Actor::Either),
    ];
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub venue: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    pub created_by: Uuid,
    pub status: EventStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Event {
    /// Drafts are visible to their creator and to event approvers only.
    pub fn visible_to(&self, user: &AuthUser) -> bool {
        self.status != EventStatus::Draft || user.id == self.created_by || user.holds(EVENT_APPROVERS)
    }
}

pub fn validate_schedule(starts_at: OffsetDateTime, ends_at: OffsetDateTime) -> AppResult<()> {
    if ends_at <= starts_at {
        return Err(AppError::bad_request("an event must end after it starts"));
    }
    Ok(())
}

pub async fn require<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Event> {
    sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("event"))
}

/// Like [`require`], but hides drafts the caller may not see.
pub async fn require_visible(db_pool: &sqlx::SqlitePool, id: Uuid, user: &AuthUser) -> AppResult<Event> {
    let event = require(db_pool, id).await?;
    if !event.visible_to(user) {
        return Err(AppError::not_found("event"));
    }
    Ok(event)
}
