use axum::{
    debug_handler,
    extract::{Path, State},
    Json,
};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{roles::PROJECT_APPROVERS, AuthUser},
    workflow::{self, StatusChange},
    AppResult, AppState,
};

use super::{Project, ProjectStatus};

#[debug_handler(state = AppState)]
pub(crate) async fn set_status(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(StatusChange { status }): Json<StatusChange<ProjectStatus>>,
) -> AppResult<Json<Project>> {
    let project = super::require(&db_pool, id).await?;
    workflow::check(project.status, status, user.owns(project.owner_id), user.holds(PROJECT_APPROVERS))?;

    let updated: Project = workflow::apply(&db_pool, "projects", id, project.status, status).await?;

    info!(project = %id, from = %project.status, to = %status, by = %user.username, "project status changed");
    Ok(Json(updated))
}
