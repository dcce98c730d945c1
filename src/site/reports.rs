//! Report templates that committee members download and fill in.

use std::{path::PathBuf, sync::Arc};

use axum::{
    debug_handler,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{roles::REPORT_MANAGERS, AuthUser},
    db, uploads, AppError, AppResult, AppState, Config,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(upload))
        .route("/{id}", delete(remove))
        .route("/{id}/download", get(download))
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReportFormat {
    pub id: Uuid,
    pub title: String,
    pub filename: String,
    pub content_type: String,
    #[serde(skip_serializing)]
    pub stored_as: String,
    pub size: i64,
    pub uploaded_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn report_dir(config: &Config) -> PathBuf {
    config.upload_dir.join("reports")
}

async fn require(db_pool: &SqlitePool, id: Uuid) -> AppResult<ReportFormat> {
    sqlx::query_as("SELECT * FROM report_formats WHERE id = ?")
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("report format"))
}

/// Client file names end up in a header; keep them to a safe character set.
fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') { c } else { '_' })
        .collect();
    match cleaned.trim() {
        "" => "report".to_owned(),
        trimmed => trimmed.to_owned(),
    }
}

#[debug_handler(state = AppState)]
async fn list(State(db_pool): State<SqlitePool>, _user: AuthUser) -> AppResult<Json<Vec<ReportFormat>>> {
    let formats = sqlx::query_as("SELECT * FROM report_formats ORDER BY title COLLATE NOCASE")
        .fetch_all(&db_pool)
        .await?;
    Ok(Json(formats))
}

/// Multipart with a `file` part and an optional `title` field.
#[debug_handler(state = AppState)]
async fn upload(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ReportFormat>)> {
    user.require(REPORT_MANAGERS)?;

    let mut form = uploads::Form::read(multipart).await?;
    let file = form.take_file("file")?;
    if file.bytes.is_empty() {
        return Err(AppError::bad_request("the uploaded file is empty"));
    }

    let filename = sanitize_filename(&file.filename);
    let title = form.field("title").map(str::to_owned).unwrap_or_else(|| filename.clone());
    let id = Uuid::now_v7();
    let stored_as = match uploads::extension(&filename) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    };

    uploads::store(&report_dir(&config), &stored_as, &file.bytes).await?;

    let format: ReportFormat = sqlx::query_as(
        "INSERT INTO report_formats (id,title,filename,content_type,stored_as,size,uploaded_by,created_at)
         VALUES (?,?,?,?,?,?,?,?) RETURNING *",
    )
    .bind(id)
    .bind(&title)
    .bind(&filename)
    .bind(&file.content_type)
    .bind(&stored_as)
    .bind(file.bytes.len() as i64)
    .bind(user.id)
    .bind(db::now())
    .fetch_one(&db_pool)
    .await?;

    info!(report = %format.id, filename = %format.filename, by = %user.username, "report format uploaded");
    Ok((StatusCode::CREATED, Json(format)))
}

#[debug_handler(state = AppState)]
async fn download(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let format = require(&db_pool, id).await?;
    let bytes = uploads::load(&report_dir(&config).join(&format.stored_as)).await?;

    let disposition = format!("attachment; filename=\"{}\"", format.filename);
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[debug_handler(state = AppState)]
async fn remove(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let format = require(&db_pool, id).await?;
    user.require_owner(format.uploaded_by, "report format")?;

    sqlx::query("DELETE FROM report_formats WHERE id = ?")
        .bind(id)
        .execute(&db_pool)
        .await?;
    uploads::remove(&report_dir(&config).join(&format.stored_as)).await?;

    info!(report = %id, by = %user.username, "report format deleted");
    Ok(StatusCode::NO_CONTENT)
}
