mod crud;
mod members;
mod status;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    labelled,
    workflow::{Actor, Workflow},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(crud::list).post(crud::create))
        .route("/{id}", get(crud::get).put(crud::update).delete(crud::remove))
        .route("/{id}/status", put(status::set_status))
        .route("/{id}/members", post(members::add))
        .route("/{id}/members/{user_id}", delete(members::remove))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Completed,
}

labelled!(ProjectStatus {
    Draft => "draft",
    Submitted => "submitted",
    Approved => "approved",
    Rejected => "rejected",
    Completed => "completed",
});

impl Workflow for ProjectStatus {
    const EDGES: &'static [(Self, Self, Actor)] = &[
        (Self::Draft, Self::Submitted, Actor::Owner),
        (Self::Submitted, Self::Approved, Actor::Approver),
        (Self::Submitted, Self::Rejected, Actor::Approver),
        (Self::Rejected, Self::Draft, Actor::Owner),
        (Self::Approved, Self::Completed, Actor::Either),
    ];
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner_id: Uuid,
    pub status: ProjectStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn require<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Project> {
    sqlx::query_as("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("project"))
}
