// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::error::AppError;
use crate::models::quiz::{AnswerOptionView, QuestionView, QuizView};
use crate::models::user::UserView;

/// Represents the 'quiz_attempts' table in the database.
/// One graded pass of one user at one quiz; never mutated after grading.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    /// Sum of points over correct answers, set by the grading step.
    pub score: f64,
    pub submission_time: DateTime<Utc>,
}

/// Represents the 'participant_answers' table in the database.
/// Selected options live in the participant_answer_options join table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ParticipantAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_answer_bool: Option<bool>,
    /// Unset until the grading engine assigns it.
    pub is_correct: Option<bool>,
}

/// Loads an attempt row, or NotFound.
pub async fn load_attempt(pool: &SqlitePool, attempt_id: i64) -> Result<QuizAttempt, AppError> {
    sqlx::query_as::<_, QuizAttempt>(
        "SELECT id, user_id, quiz_id, score, submission_time
         FROM quiz_attempts WHERE id = ?",
    )
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Attempt with ID {} does not exist", attempt_id)))
}

/// Loads an attempt's answers, ordered by id.
pub async fn load_answers(
    pool: &SqlitePool,
    attempt_id: i64,
) -> Result<Vec<ParticipantAnswer>, AppError> {
    Ok(sqlx::query_as::<_, ParticipantAnswer>(
        "SELECT id, attempt_id, question_id, selected_answer_bool, is_correct
         FROM participant_answers WHERE attempt_id = ? ORDER BY id",
    )
    .bind(attempt_id)
    .fetch_all(pool)
    .await?)
}

/// Loads the (answer_id, option_id) selection pairs of an attempt.
pub async fn load_selected_options(
    pool: &SqlitePool,
    attempt_id: i64,
) -> Result<Vec<(i64, i64)>, AppError> {
    Ok(sqlx::query_as::<_, (i64, i64)>(
        "SELECT pao.answer_id, pao.option_id
         FROM participant_answer_options pao
         JOIN participant_answers pa ON pa.id = pao.answer_id
         WHERE pa.attempt_id = ? ORDER BY pao.option_id",
    )
    .bind(attempt_id)
    .fetch_all(pool)
    .await?)
}

// --- Submission payloads ---

/// One answer within a submission payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerSubmission {
    pub question_id: i64,
    /// Selected AnswerOption ids, for the choice types.
    #[serde(default)]
    pub selected_option_ids: Vec<i64>,
    /// Boolean answer, for TRUE_FALSE questions.
    pub selected_answer_bool: Option<bool>,
}

/// The overall quiz submission payload.
#[derive(Debug, Deserialize)]
pub struct QuizSubmission {
    pub quiz_id: i64,
    pub answers: Vec<AnswerSubmission>,
}

// --- Result views ---

/// Result view of a single participant answer. `correct_answer_bool` and
/// `correct_options` are only populated once the disclosure policy allows it.
#[derive(Debug, Serialize)]
pub struct ParticipantAnswerResultView {
    pub id: i64,
    pub question: QuestionView,
    pub selected_options: Vec<AnswerOptionView>,
    pub selected_answer_bool: Option<bool>,
    pub is_correct: Option<bool>,
    pub correct_answer_bool: Option<bool>,
    pub correct_options: Vec<AnswerOptionView>,
}

/// Full result view of a quiz attempt, including derived read-only fields.
#[derive(Debug, Serialize)]
pub struct AttemptResultView {
    pub id: i64,
    pub user: UserView,
    pub quiz: QuizView,
    pub score: f64,
    pub submission_time: DateTime<Utc>,
    pub rank: i64,
    pub best_score_for_user_on_quiz: f64,
    pub participant_answers: Vec<ParticipantAnswerResultView>,
}
