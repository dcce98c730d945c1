mod photo;
mod profile;
mod roster;

use std::str::FromStr;

use axum::{
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, Sqlite, SqliteExecutor};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{auth, db, labelled, AppError, AppResult, AppState};

pub use roster::{parse_roster, RosterRow};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::list))
        .route("/me", put(profile::update_me))
        .route("/me/password", put(profile::change_password))
        .route("/me/photo", post(photo::upload))
        .route("/upload", post(roster::upload))
        .route("/{id}", get(profile::get))
        .route("/{id}/photo", get(photo::download))
        .route("/{id}/role", put(profile::set_role))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Chair,
    Secretary,
    Executive,
    Representative,
    Developer,
    DepartmentHead,
}

labelled!(Role {
    Student => "student",
    Faculty => "faculty",
    Admin => "admin",
    Chair => "chair",
    Secretary => "secretary",
    Executive => "executive",
    Representative => "representative",
    Developer => "developer",
    DepartmentHead => "department_head",
});

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Student,
        Role::Faculty,
        Role::Admin,
        Role::Chair,
        Role::Secretary,
        Role::Executive,
        Role::Representative,
        Role::Developer,
        Role::DepartmentHead,
    ];
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| AppError::bad_request(format!("unknown role {s:?}")))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub role: Role,
    pub is_committee: bool,
    pub is_executive: bool,
    pub is_representative: bool,
    pub is_developer: bool,
    pub department: Option<String>,
    pub year: Option<i64>,
    pub interests: Json<Vec<String>>,
    pub photo: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub year: Option<i64>,
}

pub async fn find<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Option<User>> {
    Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?)
}

pub async fn find_by_username<'e>(
    executor: impl SqliteExecutor<'e>,
    username: &str,
) -> AppResult<Option<User>> {
    Ok(sqlx::query_as("SELECT * FROM users WHERE username = ? COLLATE NOCASE")
        .bind(username.trim())
        .fetch_optional(executor)
        .await?)
}

pub async fn require<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<User> {
    find(executor, id).await?.ok_or_else(|| AppError::not_found("user"))
}

pub async fn insert<'e, E>(executor: E, new: &NewUser) -> AppResult<User>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let user = sqlx::query_as(
        "INSERT INTO users (id,username,password_hash,email,role,department,year,interests,created_at)
         VALUES (?,?,?,?,?,?,?,'[]',?) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(new.username.trim())
    .bind(&new.password_hash)
    .bind(new.email.trim())
    .bind(new.role)
    .bind(&new.department)
    .bind(new.year)
    .bind(db::now())
    .fetch_one(executor)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::conflict("username already taken"),
        other => other,
    })?;

    Ok(user)
}

pub fn validate_username(username: &str) -> AppResult<()> {
    let username = username.trim();
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));

    if !(3..=32).contains(&username.len()) || !valid_chars {
        return Err(AppError::bad_request(
            "username must be 3-32 letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> AppResult<()> {
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::bad_request(format!("invalid email {email:?}"))),
    }
}

/// Creates the configured admin account when the database has no admin yet.
pub async fn ensure_admin(db_pool: &sqlx::SqlitePool, username: &str, password: &str) -> AppResult<()> {
    let admins: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(db_pool)
        .await?;
    if admins.0 > 0 {
        return Ok(());
    }

    let admin = insert(
        db_pool,
        &NewUser {
            username: username.to_owned(),
            password_hash: auth::hash_password(password)?,
            email: format!("{username}@localhost"),
            role: Role::Admin,
            department: None,
            year: None,
        },
    )
    .await?;

    info!(username = %admin.username, "created bootstrap admin");
    Ok(())
}
