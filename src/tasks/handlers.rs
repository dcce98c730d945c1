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
        roles::{ADMINS, ORGANIZERS},
        AuthUser,
    },
    db,
    error::required,
    projects, users,
    workflow::{self, StatusChange},
    AppError, AppResult, AppState,
};

use super::{Priority, Scope, Task, TaskStatus};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TaskFilter {
    #[serde(default)]
    scope: Scope,
    status: Option<TaskStatus>,
    project_id: Option<Uuid>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Query(TaskFilter { scope, status, project_id }): Query<TaskFilter>,
) -> AppResult<Json<Vec<Task>>> {
    let (assignee, creator) = match scope {
        Scope::Assigned => (Some(user.id), None),
        Scope::Created => (None, Some(user.id)),
        Scope::All => {
            user.require(ADMINS)?;
            (None, None)
        }
    };

    let tasks = sqlx::query_as(
        "SELECT * FROM tasks
         WHERE (? IS NULL OR assignee_id = ?)
           AND (? IS NULL OR created_by = ?)
           AND (? IS NULL OR status = ?)
           AND (? IS NULL OR project_id = ?)
         ORDER BY due_at IS NULL, due_at, id",
    )
    .bind(assignee)
    .bind(assignee)
    .bind(creator)
    .bind(creator)
    .bind(status)
    .bind(status)
    .bind(project_id)
    .bind(project_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(tasks))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    let task = super::require(&db_pool, id).await?;
    if !task.involves(&user) {
        return Err(AppError::forbidden("only the assignee or creator may view this task"));
    }
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewTask {
    title: String,
    #[serde(default)]
    description: String,
    assignee_id: Uuid,
    project_id: Option<Uuid>,
    #[serde(default)]
    priority: Priority,
    #[serde(default, with = "time::serde::rfc3339::option")]
    due_at: Option<OffsetDateTime>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(new): Json<NewTask>,
) -> AppResult<(StatusCode, Json<Task>)> {
    user.require(ORGANIZERS)?;
    let title = required("title", &new.title)?;
    users::require(&db_pool, new.assignee_id).await?;
    if let Some(project_id) = new.project_id {
        projects::require(&db_pool, project_id).await?;
    }
    let now = db::now();

    let task: Task = sqlx::query_as(
        "INSERT INTO tasks (id,title,description,assignee_id,created_by,project_id,status,priority,due_at,created_at,updated_at)
         VALUES (?,?,?,?,?,?,'pending',?,?,?,?) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&title)
    .bind(new.description.trim())
    .bind(new.assignee_id)
    .bind(user.id)
    .bind(new.project_id)
    .bind(new.priority)
    .bind(new.due_at.map(db::utc))
    .bind(now)
    .bind(now)
    .fetch_one(&db_pool)
    .await?;

    info!(task = %task.id, assignee = %task.assignee_id, by = %user.username, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateTask {
    title: Option<String>,
    description: Option<String>,
    assignee_id: Option<Uuid>,
    priority: Option<Priority>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    due_at: Option<OffsetDateTime>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn update(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateTask>,
) -> AppResult<Json<Task>> {
    let task = super::require(&db_pool, id).await?;
    user.require_owner(task.created_by, "task")?;

    let title = update.title.as_deref().map(|title| required("title", title)).transpose()?;
    if let Some(assignee_id) = update.assignee_id {
        users::require(&db_pool, assignee_id).await?;
    }

    let task = sqlx::query_as(
        "UPDATE tasks SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            assignee_id = COALESCE(?, assignee_id),
            priority = COALESCE(?, priority),
            due_at = COALESCE(?, due_at),
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(title)
    .bind(update.description.as_deref().map(str::trim))
    .bind(update.assignee_id)
    .bind(update.priority)
    .bind(update.due_at.map(db::utc))
    .bind(db::now())
    .bind(id)
    .fetch_one(&db_pool)
    .await?;

    Ok(Json(task))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let task = super::require(&db_pool, id).await?;
    user.require_owner(task.created_by, "task")?;

    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_status(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(StatusChange { status }): Json<StatusChange<TaskStatus>>,
) -> AppResult<Json<Task>> {
    let task = super::require(&db_pool, id).await?;
    workflow::check(task.status, status, user.owns(task.created_by), user.id == task.assignee_id)?;

    let updated: Task = workflow::apply(&db_pool, "tasks", id, task.status, status).await?;

    info!(task = %id, to = %status, by = %user.username, "task status changed");
    Ok(Json(updated))
}
