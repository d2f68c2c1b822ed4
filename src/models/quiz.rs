// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, SqlitePool};
use validator::Validate;

use crate::error::AppError;
use crate::models::user::UserView;

/// Closed set of question type tags. Grading and validation switch exhaustively
/// over this enum; each variant has materially different shape invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    TrueFalse,
}

/// Static string -> type tag table.
pub const QUESTION_TYPES: [(&str, QuestionType); 3] = [
    ("SINGLE_CHOICE", QuestionType::SingleChoice),
    ("MULTI_CHOICE", QuestionType::MultiChoice),
    ("TRUE_FALSE", QuestionType::TrueFalse),
];

impl QuestionType {
    pub fn from_tag(tag: &str) -> Option<QuestionType> {
        QUESTION_TYPES
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, ty)| *ty)
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "SINGLE_CHOICE",
            QuestionType::MultiChoice => "MULTI_CHOICE",
            QuestionType::TrueFalse => "TRUE_FALSE",
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultiChoice)
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub teacher_id: i64,
    /// Duration per attempt, in minutes. Always >= 1 (schema CHECK).
    pub timing_minutes: i64,
    pub available_from: Option<DateTime<Utc>>,
    pub available_to: Option<DateTime<Utc>>,
}

impl Quiz {
    /// True when both bounds of the availability window are set.
    pub fn has_availability_window(&self) -> bool {
        self.available_from.is_some() && self.available_to.is_some()
    }

    /// Whether the quiz accepts submissions at `now`.
    ///
    /// No bounds: always open. Both bounds: `from <= now <= to`. Only a lower
    /// bound: open from `from` onward. Only an upper bound: open until `to`.
    pub fn is_available_for_submission(&self, now: DateTime<Utc>) -> bool {
        match (self.available_from, self.available_to) {
            (None, None) => true,
            (Some(from), Some(to)) => from <= now && now <= to,
            (Some(from), None) => from <= now,
            (None, Some(to)) => now <= to,
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_type: QuestionType,
    pub text: String,
    pub points: f64,
    /// Only meaningful for TRUE_FALSE questions.
    pub correct_answer_bool: Option<bool>,
}

/// Represents the 'answer_options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
}

/// A question together with its (possibly empty) option list.
#[derive(Debug, Clone)]
pub struct QuestionWithOptions {
    pub question: Question,
    pub options: Vec<AnswerOption>,
}

impl QuestionWithOptions {
    /// Ids of options marked correct on this question.
    pub fn correct_option_ids(&self) -> Vec<i64> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect()
    }
}

/// Loads a quiz row, or NotFound.
pub async fn load_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        "SELECT id, title, teacher_id, timing_minutes, available_from, available_to
         FROM quizzes WHERE id = ?",
    )
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Quiz with ID {} does not exist", quiz_id)))
}

/// Loads all questions of a quiz with their options, ordered by id.
pub async fn load_question_tree(
    pool: &SqlitePool,
    quiz_id: i64,
) -> Result<Vec<QuestionWithOptions>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, question_type, text, points, correct_answer_bool
         FROM questions WHERE quiz_id = ? ORDER BY id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, AnswerOption>(
        "SELECT o.id, o.question_id, o.text, o.is_correct
         FROM answer_options o
         JOIN questions q ON q.id = o.question_id
         WHERE q.quiz_id = ? ORDER BY o.id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = options
                .iter()
                .filter(|o| o.question_id == question.id)
                .cloned()
                .collect();
            QuestionWithOptions { question, options }
        })
        .collect())
}

/// Validates the write-time shape invariants of a question's final state.
///
/// `option_correct_flags` holds `is_correct` per persisted option, in order.
pub fn validate_question_shape(
    question_type: QuestionType,
    correct_answer_bool: Option<bool>,
    option_correct_flags: &[bool],
) -> Result<(), AppError> {
    match question_type {
        QuestionType::SingleChoice | QuestionType::MultiChoice => {
            if correct_answer_bool.is_some() {
                return Err(AppError::BadRequest(format!(
                    "correct_answer_bool: {} questions should not have correct_answer_bool",
                    question_type.as_tag()
                )));
            }
            if option_correct_flags.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "answer_options: {} questions must have answer options",
                    question_type.as_tag()
                )));
            }
            let correct_count = option_correct_flags.iter().filter(|c| **c).count();
            if question_type == QuestionType::SingleChoice && correct_count != 1 {
                return Err(AppError::BadRequest(
                    "answer_options: SINGLE_CHOICE must have exactly one correct answer"
                        .to_string(),
                ));
            }
            if question_type == QuestionType::MultiChoice && correct_count < 1 {
                return Err(AppError::BadRequest(
                    "answer_options: MULTI_CHOICE must have at least one correct answer"
                        .to_string(),
                ));
            }
        }
        QuestionType::TrueFalse => {
            if !option_correct_flags.is_empty() {
                return Err(AppError::BadRequest(
                    "answer_options: TRUE_FALSE questions should not have answer options"
                        .to_string(),
                ));
            }
            if correct_answer_bool.is_none() {
                return Err(AppError::BadRequest(
                    "correct_answer_bool: TRUE_FALSE questions must specify correct_answer_bool"
                        .to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Deserializes a field so that "absent" (None) can be told apart from an
/// explicit `null` (Some(None)).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// --- Authoring payloads ---

/// Incoming answer option within a quiz edit payload. An `id` matching a
/// persisted option means update-in-place; otherwise a fresh option is created.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerOptionPayload {
    pub id: Option<i64>,
    pub text: Option<String>,
    pub is_correct: Option<bool>,
}

/// Incoming question within a quiz edit payload.
///
/// `answer_options` absent means "leave untouched" on update; present-but-empty
/// means "delete all". Same for `correct_answer_bool` via the double option.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionPayload {
    pub id: Option<i64>,
    pub question_type: Option<QuestionType>,
    pub text: Option<String>,
    pub points: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub correct_answer_bool: Option<Option<bool>>,
    pub answer_options: Option<Vec<AnswerOptionPayload>>,
}

/// DTO for creating a quiz with its full question tree.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 255, message = "Title must not be empty."))]
    pub title: String,
    pub timing_minutes: i64,
    pub available_from: Option<DateTime<Utc>>,
    pub available_to: Option<DateTime<Utc>>,
    pub questions: Vec<QuestionPayload>,
}

/// DTO for editing a quiz. Absent fields are left untouched; `questions`
/// present (even empty) triggers tree reconciliation.
#[derive(Debug, Deserialize)]
pub struct UpdateQuizRequest {
    pub title: Option<String>,
    pub timing_minutes: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub available_from: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub available_to: Option<Option<DateTime<Utc>>>,
    pub questions: Option<Vec<QuestionPayload>>,
}

// --- Read views ---

/// Option view for the authoring-neutral quiz read view. Never carries
/// `is_correct`.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOptionView {
    pub id: i64,
    pub text: String,
}

impl From<&AnswerOption> for AnswerOptionView {
    fn from(option: &AnswerOption) -> Self {
        AnswerOptionView {
            id: option.id,
            text: option.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub question_type: QuestionType,
    pub text: String,
    pub points: f64,
    pub answer_options: Vec<AnswerOptionView>,
}

impl From<&QuestionWithOptions> for QuestionView {
    fn from(q: &QuestionWithOptions) -> Self {
        QuestionView {
            id: q.question.id,
            question_type: q.question.question_type,
            text: q.question.text.clone(),
            points: q.question.points,
            answer_options: q.options.iter().map(AnswerOptionView::from).collect(),
        }
    }
}

/// Full quiz read view. Correct-answer data is never present here; it only
/// appears inside graded result views once disclosure allows it.
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub id: i64,
    pub title: String,
    pub teacher: UserView,
    pub timing_minutes: i64,
    pub available_from: Option<DateTime<Utc>>,
    pub available_to: Option<DateTime<Utc>>,
    pub is_available_for_submission: bool,
    pub has_availability_window: bool,
    pub questions: Vec<QuestionView>,
}

impl QuizView {
    pub fn build(quiz: &Quiz, teacher: UserView, questions: &[QuestionWithOptions]) -> QuizView {
        let now = Utc::now();
        QuizView {
            id: quiz.id,
            title: quiz.title.clone(),
            teacher,
            timing_minutes: quiz.timing_minutes,
            available_from: quiz.available_from,
            available_to: quiz.available_to,
            is_available_for_submission: quiz.is_available_for_submission(now),
            has_availability_window: quiz.has_availability_window(),
            questions: questions.iter().map(QuestionView::from).collect(),
        }
    }
}
