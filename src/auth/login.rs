use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{session::USER_ID, users, AppError, AppResult, AppState};

use super::{verify_password, AuthResponse, Keys};

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    username: String,
    password: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    State(keys): State<Keys>,
    session: Session,
    Json(LoginRequest { username, password }): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let Some(user) = users::find_by_username(&db_pool, &username).await? else {
        warn!(%username, "login for unknown user");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&password, &user.password_hash) {
        warn!(%username, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    session.cycle_id().await?;
    session.insert(USER_ID, user.id).await?;

    info!(username = %user.username, role = %user.role, "welcome");
    let token = keys.issue(&user)?;
    Ok(Json(AuthResponse { token, user }))
}
