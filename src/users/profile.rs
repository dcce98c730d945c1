use axum::{
    debug_handler,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::{types::Json as SqlJson, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{self, roles::ADMINS, AuthUser},
    AppError, AppResult, AppState,
};

use super::{validate_email, Role, User};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UserFilter {
    role: Option<Role>,
    department: Option<String>,
    q: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    _user: AuthUser,
    Query(UserFilter { role, department, q }): Query<UserFilter>,
) -> AppResult<Json<Vec<User>>> {
    let users = sqlx::query_as(
        "SELECT * FROM users
         WHERE (? IS NULL OR role = ?)
           AND (? IS NULL OR department = ? COLLATE NOCASE)
           AND (? IS NULL OR username LIKE '%' || ? || '%')
         ORDER BY username",
    )
    .bind(role)
    .bind(role)
    .bind(&department)
    .bind(&department)
    .bind(&q)
    .bind(&q)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(users))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get(
    State(db_pool): State<SqlitePool>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(super::require(&db_pool, id).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateProfile {
    email: Option<String>,
    department: Option<String>,
    year: Option<i64>,
    interests: Option<Vec<String>>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_me(
    State(db_pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Json(update): Json<UpdateProfile>,
) -> AppResult<Json<User>> {
    if let Some(email) = &update.email {
        validate_email(email)?;
    }
    if update.year.is_some_and(|year| !(1..=10).contains(&year)) {
        return Err(AppError::bad_request("year must be between 1 and 10"));
    }

    let interests = update.interests.map(|interests| {
        SqlJson(
            interests
                .into_iter()
                .map(|interest| interest.trim().to_owned())
                .filter(|interest| !interest.is_empty())
                .collect::<Vec<_>>(),
        )
    });

    let user = sqlx::query_as(
        "UPDATE users SET
            email = COALESCE(?, email),
            department = COALESCE(?, department),
            year = COALESCE(?, year),
            interests = COALESCE(?, interests)
         WHERE id = ? RETURNING *",
    )
    .bind(update.email.as_deref().map(str::trim))
    .bind(&update.department)
    .bind(update.year)
    .bind(interests)
    .bind(user.id)
    .fetch_one(&db_pool)
    .await?;

    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChangePassword {
    current_password: String,
    new_password: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn change_password(
    State(db_pool): State<SqlitePool>,
    AuthUser(user): AuthUser,
    Json(ChangePassword { current_password, new_password }): Json<ChangePassword>,
) -> AppResult<StatusCode> {
    if !auth::verify_password(&current_password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }
    auth::validate_password(&new_password)?;

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(auth::hash_password(&new_password)?)
        .bind(user.id)
        .execute(&db_pool)
        .await?;

    info!(username = %user.username, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetRole {
    role: Role,
    is_committee: Option<bool>,
    is_executive: Option<bool>,
    is_representative: Option<bool>,
    is_developer: Option<bool>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_role(
    State(db_pool): State<SqlitePool>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<SetRole>,
) -> AppResult<Json<User>> {
    admin.require(ADMINS)?;

    if id == admin.id && update.role != Role::Admin {
        return Err(AppError::bad_request("admins cannot demote themselves"));
    }

    let user: User = sqlx::query_as(
        "UPDATE users SET
            role = ?,
            is_committee = COALESCE(?, is_committee),
            is_executive = COALESCE(?, is_executive),
            is_representative = COALESCE(?, is_representative),
            is_developer = COALESCE(?, is_developer)
         WHERE id = ? RETURNING *",
    )
    .bind(update.role)
    .bind(update.is_committee)
    .bind(update.is_executive)
    .bind(update.is_representative)
    .bind(update.is_developer)
    .bind(id)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("user"))?;

    info!(username = %user.username, role = %user.role, by = %admin.username, "role changed");
    Ok(Json(user))
}
