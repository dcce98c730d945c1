use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{auth::AuthUser, uploads, AppError, AppResult, AppState, Config};

use super::User;

const PHOTO_TYPES: [&str; 4] = ["png", "jpg", "gif", "webp"];

fn photo_dir(config: &Config) -> std::path::PathBuf {
    config.upload_dir.join("photos")
}

#[debug_handler(state = AppState)]
pub(crate) async fn upload(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> AppResult<Json<User>> {
    let photo = uploads::Form::read(multipart).await?.take_file("photo")?;

    let extension = match photo.content_type.as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        other => return Err(AppError::bad_request(format!("unsupported photo type {other}"))),
    };

    let name = format!("{}.{extension}", user.id);
    for stale in PHOTO_TYPES.iter().filter(|ext| **ext != extension) {
        uploads::remove(&photo_dir(&config).join(format!("{}.{stale}", user.id))).await?;
    }
    uploads::store(&photo_dir(&config), &name, &photo.bytes).await?;

    let user = sqlx::query_as("UPDATE users SET photo = ? WHERE id = ? RETURNING *")
        .bind(&name)
        .bind(user.id)
        .fetch_one(&db_pool)
        .await?;

    Ok(Json(user))
}

#[debug_handler(state = AppState)]
pub(crate) async fn download(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    _viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let user = super::require(&db_pool, id).await?;
    let Some(photo) = user.photo else {
        return Err(AppError::not_found("photo"));
    };

    let content_type = uploads::extension(&photo)
        .map(|ext| uploads::content_type_for(&ext))
        .unwrap_or("application/octet-stream");
    let bytes = uploads::load(&photo_dir(&config).join(&photo)).await?;

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
