use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json as SqlJson, SqlitePool};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{auth::AuthUser, db, AppError, AppResult, AppState};

use super::QuizStatus;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub(crate) struct Attempt {
    quiz_id: Uuid,
    user_id: Uuid,
    username: String,
    answers: SqlJson<Vec<usize>>,
    score: i64,
    total: i64,
    #[serde(with = "time::serde::rfc3339")]
    submitted_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Submission {
    answers: Vec<usize>,
}

/// One scored attempt per user, accepted only while the quiz is approved.
#[debug_handler(state = AppState)]
pub(crate) async fn submit(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(Submission { answers }): Json<Submission>,
) -> AppResult<(StatusCode, Json<Attempt>)> {
    let quiz = super::require_visible(&db_pool, id, &user).await?;
    if quiz.status != QuizStatus::Approved {
        return Err(AppError::conflict(format!("the quiz is {} and not taking attempts", quiz.status)));
    }

    let attempt = Attempt {
        quiz_id: id,
        user_id: user.id,
        username: user.username.clone(),
        score: quiz.score(&answers)?,
        total: quiz.questions.len() as i64,
        answers: SqlJson(answers),
        submitted_at: db::now(),
    };

    sqlx::query("INSERT INTO quiz_attempts (quiz_id,user_id,answers,score,total,submitted_at) VALUES (?,?,?,?,?,?)")
        .bind(attempt.quiz_id)
        .bind(attempt.user_id)
        .bind(&attempt.answers)
        .bind(attempt.score)
        .bind(attempt.total)
        .bind(attempt.submitted_at)
        .execute(&db_pool)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::conflict("quiz already attempted"),
            other => other,
        })?;

    info!(quiz = %id, user = %user.username, score = attempt.score, total = attempt.total, "quiz attempted");
    Ok((StatusCode::CREATED, Json(attempt)))
}

/// The creator and admins see every attempt; anyone else sees their own.
#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Attempt>>> {
    let quiz = super::require_visible(&db_pool, id, &user).await?;
    let only = (!user.owns(quiz.created_by)).then_some(user.id);

    let attempts = sqlx::query_as(
        "SELECT a.*, u.username FROM quiz_attempts a JOIN users u ON u.id = a.user_id
         WHERE a.quiz_id = ? AND (? IS NULL OR a.user_id = ?)
         ORDER BY a.score DESC, a.submitted_at",
    )
    .bind(id)
    .bind(only)
    .bind(only)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(attempts))
}
