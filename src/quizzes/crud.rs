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
    auth::{
        roles::{ORGANIZERS, QUIZ_APPROVERS},
        AuthUser,
    },
    db,
    error::required,
    workflow::{self, StatusChange},
    AppError, AppResult, AppState,
};

use super::{validate_questions, Question, Quiz, QuizStatus};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QuizFilter {
    status: Option<QuizStatus>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Query(QuizFilter { status }): Query<QuizFilter>,
) -> AppResult<Json<Vec<Quiz>>> {
    let quizzes: Vec<Quiz> = sqlx::query_as("SELECT * FROM quizzes WHERE (? IS NULL OR status = ?) ORDER BY id DESC")
        .bind(status)
        .bind(status)
        .fetch_all(&db_pool)
        .await?;

    Ok(Json(
        quizzes
            .into_iter()
            .filter(|quiz| quiz.visible_to(&user))
            .map(|quiz| quiz.for_viewer(&user))
            .collect(),
    ))
}

#[debug_handler(state = AppState)]
pub(crate) async fn get(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Quiz>> {
    let quiz = super::require_visible(&db_pool, id, &user).await?;
    Ok(Json(quiz.for_viewer(&user)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewQuiz {
    title: String,
    #[serde(default)]
    description: String,
    questions: Vec<Question>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Json(new): Json<NewQuiz>,
) -> AppResult<(StatusCode, Json<Quiz>)> {
    user.require(ORGANIZERS)?;
    let title = required("title", &new.title)?;
    let questions = validate_questions(new.questions)?;
    let now = db::now();

    let quiz: Quiz = sqlx::query_as(
        "INSERT INTO quizzes (id,title,description,created_by,status,questions,created_at,updated_at)
         VALUES (?,?,?,?,'draft',?,?,?) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&title)
    .bind(new.description.trim())
    .bind(user.id)
    .bind(SqlJson(questions))
    .bind(now)
    .bind(now)
    .fetch_one(&db_pool)
    .await?;

    info!(quiz = %quiz.id, by = %user.username, "quiz created");
    Ok((StatusCode::CREATED, Json(quiz)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateQuiz {
    title: Option<String>,
    description: Option<String>,
    questions: Option<Vec<Question>>,
}

/// Questions are frozen once a quiz leaves draft, so existing scores stay meaningful.
#[debug_handler(state = AppState)]
pub(crate) async fn update(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateQuiz>,
) -> AppResult<Json<Quiz>> {
    let quiz = super::require(&db_pool, id).await?;
    user.require_owner(quiz.created_by, "quiz")?;

    let title = update.title.as_deref().map(|title| required("title", title)).transpose()?;
    let questions = match update.questions {
        Some(_) if quiz.status != QuizStatus::Draft => {
            return Err(AppError::conflict(format!("questions cannot change once a quiz is {}", quiz.status)));
        }
        Some(questions) => Some(SqlJson(validate_questions(questions)?)),
        None => None,
    };

    let quiz = sqlx::query_as(
        "UPDATE quizzes SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            questions = COALESCE(?, questions),
            updated_at = ?
         WHERE id = ? RETURNING *",
    )
    .bind(title)
    .bind(update.description.as_deref().map(str::trim))
    .bind(questions)
    .bind(db::now())
    .bind(id)
    .fetch_one(&db_pool)
    .await?;

    Ok(Json(quiz))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let quiz = super::require(&db_pool, id).await?;
    user.require_owner(quiz.created_by, "quiz")?;

    sqlx::query("DELETE FROM quizzes WHERE id = ?")
        .bind(id)
        .execute(&db_pool)
        .await?;

    info!(quiz = %id, by = %user.username, "quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_status(
    State(db_pool): State<SqlitePool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(StatusChange { status }): Json<StatusChange<QuizStatus>>,
) -> AppResult<Json<Quiz>> {
    let quiz = super::require(&db_pool, id).await?;
    workflow::check(quiz.status, status, user.owns(quiz.created_by), user.holds(QUIZ_APPROVERS))?;

    let updated: Quiz = workflow::apply(&db_pool, "quizzes", id, quiz.status, status).await?;

    info!(quiz = %id, from = %quiz.status, to = %status, by = %user.username, "quiz status changed");
    Ok(Json(updated.for_viewer(&user)))
}
