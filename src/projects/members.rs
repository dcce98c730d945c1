use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{auth::AuthUser, users, AppError, AppResult, AppState};

fn default_role() -> String {
    "member".to_owned()
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewMember {
    user_id: Uuid,
    #[serde(default = "default_role")]
    role: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn add(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(NewMember { user_id, role }): Json<NewMember>,
) -> AppResult<StatusCode> {
    let project = super::require(&db_pool, id).await?;
    user.require_owner(project.owner_id, "project")?;
    users::require(&db_pool, user_id).await?;

    sqlx::query("INSERT INTO project_members (project_id,user_id,role) VALUES (?,?,?)")
        .bind(id)
        .bind(user_id)
        .bind(role.trim())
        .execute(&db_pool)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::conflict("already a member"),
            other => other,
        })?;

    Ok(StatusCode::CREATED)
}

/// Owners and admins remove anyone; members may remove themselves.
#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let project = super::require(&db_pool, id).await?;
    if user.id != user_id {
        user.require_owner(project.owner_id, "project")?;
    }

    let removed = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(&db_pool)
        .await?
        .rows_affected();

    if removed == 0 {
        return Err(AppError::not_found("member"));
    }
    Ok(StatusCode::NO_CONTENT)
}
