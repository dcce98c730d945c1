use std::ops::Deref;

use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{session::USER_ID, users, users::User, AppError, AppState};

/// The signed-in user, reloaded from the database on every request.
///
/// Credentials are looked up in order: `Authorization: Bearer`, then the
/// cookie session written at login.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// [`AuthUser`] for the socket upgrade, which also accepts a `token` query
/// parameter since browser sockets cannot set headers.
#[derive(Debug, Clone)]
pub struct SocketUser(pub User);

impl Deref for AuthUser {
    type Target = User;

    fn deref(&self) -> &User {
        &self.0
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
}

fn query_token(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.token)
}

async fn authenticate(parts: &mut Parts, state: &AppState, token: Option<String>) -> Result<User, AppError> {
    let user_id = match token {
        Some(token) => state.keys.verify(&token)?.sub,
        None => {
            let Ok(session) = Session::from_request_parts(parts, state).await else {
                return Err(AppError::Unauthorized);
            };
            session.get::<Uuid>(USER_ID).await?.ok_or(AppError::Unauthorized)?
        }
    };

    users::find(&state.db_pool, user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts);
        authenticate(parts, state, token).await.map(AuthUser)
    }
}

impl FromRequestParts<AppState> for SocketUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).or_else(|| query_token(parts));
        authenticate(parts, state, token).await.map(SocketUser)
    }
}
