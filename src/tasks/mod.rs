mod handlers;

use axum::{
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    labelled,
    workflow::{Actor, Workflow},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list).post(handlers::create))
        .route("/{id}", get(handlers::get).put(handlers::update).delete(handlers::remove))
        .route("/{id}/status", put(handlers::set_status))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

labelled!(TaskStatus {
    Pending => "pending",
    Completed => "completed",
});

/// The assignee is the "approver" side of a task: they and the creator
/// may both flip it.
impl Workflow for TaskStatus {
    const EDGES: &'static [(Self, Self, Actor)] = &[
        (Self::Pending, Self::Completed, Actor::Either),
        (Self::Completed, Self::Pending, Actor::Either),
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Assigned,
    Created,
    All,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub assignee_id: Uuid,
    pub created_by: Uuid,
    pub project_id: Option<Uuid>,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Task {
    pub fn involves(&self, user: &AuthUser) -> bool {
        user.id == self.assignee_id || user.owns(self.created_by)
    }
}

pub async fn require<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Task> {
    sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("task"))
}
