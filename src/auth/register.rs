use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{
    session::USER_ID,
    users::{self, NewUser, Role},
    AppError, AppResult, AppState, Config,
};

use super::{hash_password, validate_password, AuthResponse, Keys};

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    username: String,
    password: String,
    email: String,
    department: Option<String>,
    year: Option<i64>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    State(keys): State<Keys>,
    session: Session,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    if !config.allow_registration {
        return Err(AppError::forbidden("registration is closed"));
    }

    users::validate_username(&request.username)?;
    users::validate_email(&request.email)?;
    validate_password(&request.password)?;

    if users::find_by_username(&db_pool, &request.username).await?.is_some() {
        return Err(AppError::conflict("username already taken"));
    }

    let user = users::insert(
        &db_pool,
        &NewUser {
            username: request.username,
            password_hash: hash_password(&request.password)?,
            email: request.email,
            role: Role::Student,
            department: request.department,
            year: request.year,
        },
    )
    .await?;

    info!(username = %user.username, "registered");

    session.insert(USER_ID, user.id).await?;
    let token = keys.issue(&user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}
