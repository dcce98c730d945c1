mod attempts;
mod crud;

use axum::{
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, SqliteExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{roles::QUIZ_APPROVERS, AuthUser},
    error::required,
    labelled,
    workflow::{Actor, Workflow},
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(crud::list).post(crud::create))
        .route("/{id}", get(crud::get).put(crud::update).delete(crud::remove))
        .route("/{id}/status", put(crud::set_status))
        .route("/{id}/attempts", get(attempts::list).post(attempts::submit))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QuizStatus {
    Draft,
    Approved,
    Closed,
}

labelled!(QuizStatus {
    Draft => "draft",
    Approved => "approved",
    Closed => "closed",
});

impl Workflow for QuizStatus {
    const EDGES: &'static [(Self, Self, Actor)] = &[
        (Self::Draft, Self::Approved, Actor::Approver),
        (Self::Approved, Self::Closed, Actor::Either),
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`. Stripped before a quiz is shown to takers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<usize>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    pub status: QuizStatus,
    pub questions: Json<Vec<Question>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Quiz {
    pub fn visible_to(&self, user: &AuthUser) -> bool {
        self.status != QuizStatus::Draft || user.id == self.created_by || user.holds(QUIZ_APPROVERS)
    }

    /// The quiz as `user` may see it: answers only for the creator and admins.
    pub fn for_viewer(mut self, user: &AuthUser) -> Self {
        if !user.owns(self.created_by) {
            for question in self.questions.iter_mut() {
                question.answer = None;
            }
        }
        self
    }

    /// Counts correct answers. `answers` must line up with the questions.
    pub fn score(&self, answers: &[usize]) -> AppResult<i64> {
        if answers.len() != self.questions.len() {
            return Err(AppError::bad_request(format!(
                "expected {} answers, got {}",
                self.questions.len(),
                answers.len()
            )));
        }

        let correct = self
            .questions
            .iter()
            .zip(answers)
            .filter(|(question, given)| question.answer == Some(**given))
            .count();
        Ok(correct as i64)
    }
}

/// Checks a question list and normalizes its text.
pub fn validate_questions(questions: Vec<Question>) -> AppResult<Vec<Question>> {
    if questions.is_empty() {
        return Err(AppError::bad_request("a quiz needs at least one question"));
    }

    questions
        .into_iter()
        .enumerate()
        .map(|(i, question)| {
            let n = i + 1;
            let prompt = required(&format!("question {n} prompt"), &question.prompt)?;
            let options = question
                .options
                .iter()
                .map(|option| required(&format!("question {n} option"), option))
                .collect::<AppResult<Vec<_>>>()?;
            if options.len() < 2 {
                return Err(AppError::bad_request(format!("question {n} needs at least two options")));
            }
            match question.answer {
                Some(answer) if answer < options.len() => Ok(Question { prompt, options, answer: Some(answer) }),
                _ => Err(AppError::bad_request(format!("question {n} answer is out of range"))),
            }
        })
        .collect()
}

pub async fn require<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> AppResult<Quiz> {
    sqlx::query_as("SELECT * FROM quizzes WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found("quiz"))
}

pub async fn require_visible(db_pool: &sqlx::SqlitePool, id: Uuid, user: &AuthUser) -> AppResult<Quiz> {
    let quiz = require(db_pool, id).await?;
    if !quiz.visible_to(user) {
        return Err(AppError::not_found("quiz"));
    }
    Ok(quiz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn question(options: &[&str], answer: Option<usize>) -> Question {
        Question {
            prompt: "Which?".into(),
            options: options.iter().map(|&o| o.to_owned()).collect(),
            answer,
        }
    }

    fn quiz(questions: Vec<Question>) -> Quiz {
        Quiz {
            id: Uuid::now_v7(),
            title: "Basics".into(),
            description: String::new(),
            created_by: Uuid::now_v7(),
            status: QuizStatus::Approved,
            questions: Json(questions),
            created_at: db::now(),
            updated_at: db::now(),
        }
    }

    #[test]
    fn questions_need_options_and_a_valid_answer() {
        assert!(validate_questions(vec![]).is_err());
        assert!(validate_questions(vec![question(&["only"], Some(0))]).is_err());
        assert!(validate_questions(vec![question(&["a", "b"], Some(2))]).is_err());
        assert!(validate_questions(vec![question(&["a", "b"], None)]).is_err());
        assert!(validate_questions(vec![question(&["a", " "], Some(0))]).is_err());

        let questions = validate_questions(vec![question(&[" a ", "b"], Some(1))]).unwrap();
        assert_eq!(questions[0].options, ["a", "b"]);
    }

    #[test]
    fn scoring_counts_matches() {
        let quiz = quiz(vec![
            question(&["a", "b"], Some(0)),
            question(&["a", "b", "c"], Some(2)),
            question(&["a", "b"], Some(1)),
        ]);
        assert_eq!(quiz.score(&[0, 2, 1]).unwrap(), 3);
        assert_eq!(quiz.score(&[1, 2, 0]).unwrap(), 1);
        assert!(quiz.score(&[0, 2]).is_err());
    }

    #[test]
    fn hidden_answers_are_not_serialized() {
        let json = serde_json::to_value(question(&["a", "b"], None)).unwrap();
        assert!(json.get("answer").is_none());
    }
}
