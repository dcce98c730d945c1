mod extract;
mod login;
mod logout;
mod password;
mod register;
pub mod roles;
mod token;

use axum::{
    debug_handler,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{users::User, AppState};

pub use extract::{AuthUser, SocketUser};
pub use password::{hash_password, validate_password, verify_password};
pub use token::{Claims, Keys};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
        .route("/logout", post(logout::logout))
        .route("/me", get(me))
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[debug_handler(state = AppState)]
async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
