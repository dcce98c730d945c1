use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{auth::AuthUser, db, error::required, AppResult, AppState};

use super::{Project, ProjectStatus};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProjectFilter {
    status: Option<ProjectStatus>,
    owner_id: Option<Uuid>,
    member_id: Option<Uuid>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    _user: AuthUser,
    Query(ProjectFilter { status, owner_id, member_id }): Query<ProjectFilter>,
) -> AppResult<Json<Vec<Project>>> {
    let projects = sqlx::query_as(
        "SELECT * FROM projects p
         WHERE (? IS NULL OR p.status = ?)
           AND (? IS NULL OR p.owner_id = ?)
           AND (? IS NULL OR EXISTS (
                SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ?))
         ORDER BY p.id DESC",
    )
    .bind(status)
    .bind(status)
    .bind(owner_id)
    .bind(owner_id)
    .bind(member_id)
    .bind(member_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(projects))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub(crate) struct Member {
    user_id: Uuid,
    username: String,
    role: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectDetail {
    #[serde(flatten)]
    project: Project,
    members: Vec<Member>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn get(
    State(db_pool): State<SqlitePool>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProjectDetail>> {
    let project = super::require(&db_pool, id).await?;
    let members = sqlx::query_as(
        "SELECT pm.user_id, u.username, pm.role
         FROM project_members pm JOIN users u ON u.id = pm.user_id
         WHERE pm.project_id = ?
         ORDER BY u.username",
    )
    .bind(id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(ProjectDetail { project, members }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewProject {
    title: String,
    #[serde(default)]
    description: String,
}

/// Anyone may propose a project; it starts as a draft owned by the caller.
#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(NewProject { title, description }): Json<NewProject>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let title = required("title", &title)?;
    let now = db::now();

    let project: Project = sqlx::query_as(
        "INSERT INTO projects (id,title,description,owner_id,status,created_at,updated_at)
         VALUES (?,?,?,?,'draft',?,?) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&title)
    .bind(description.trim())
    .bind(user.id)
    .bind(now)
    .bind(now)
    .fetch_one(&db_pool)
    .await?;

    sqlx::query("INSERT INTO project_members (project_id,user_id,role) VALUES (?,?,'lead')")
        .bind(project.id)
        .bind(user.id)
        .execute(&db_pool)
        .await?;

    info!(project = %project.id, owner = %user.username, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateProject {
    title: Option<String>,
    description: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn update(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(UpdateProject { title, description }): Json<UpdateProject>,
) -> AppResult<Json<Project>> {
    let project = super::require(&db_pool, id).await?;
    user.require_owner(project.owner_id, "project")?;
    let title = title.as_deref().map(|title| required("title", title)).transpose()?;

    let project = sqlx::query_as(
        "UPDATE projects SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(title)
    .bind(description.as_deref().map(str::trim))
    .bind(db::now())
    .bind(id)
    .fetch_one(&db_pool)
    .await?;

    Ok(Json(project))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let project = super::require(&db_pool, id).await?;
    user.require_owner(project.owner_id, "project")?;

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(&db_pool)
        .await?;

    info!(project = %id, by = %user.username, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}
