// src/submission.rs
//
// Submission Validator: structural and semantic checks of a submission payload
// against the quiz's question set and availability window. Fail-closed: the
// first violation rejects the whole submission and nothing is written.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::attempt::QuizSubmission;
use crate::models::quiz::{QuestionType, QuestionWithOptions, Quiz};

/// Validates a submission payload. The caller has already resolved the quiz
/// row (a missing quiz is a NotFound before we get here); the remaining checks
/// run in order: availability, duplicate questions, question membership,
/// per-type answer shape, option membership.
pub fn validate_submission(
    quiz: &Quiz,
    questions: &[QuestionWithOptions],
    payload: &QuizSubmission,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if !quiz.is_available_for_submission(now) {
        return Err(AppError::Unavailable(
            "This quiz is not currently available for submission".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for answer in &payload.answers {
        if !seen.insert(answer.question_id) {
            return Err(AppError::BadRequest(
                "Duplicate question IDs found in the submission".to_string(),
            ));
        }
    }

    let by_id: HashMap<i64, &QuestionWithOptions> =
        questions.iter().map(|q| (q.question.id, q)).collect();

    for answer in &payload.answers {
        let question = by_id.get(&answer.question_id).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Question ID {} does not belong to this quiz",
                answer.question_id
            ))
        })?;

        match question.question.question_type {
            QuestionType::SingleChoice => {
                if answer.selected_answer_bool.is_some() {
                    return Err(AppError::BadRequest(
                        "selected_answer_bool is not allowed for SINGLE_CHOICE".to_string(),
                    ));
                }
                if answer.selected_option_ids.len() > 1 {
                    return Err(AppError::BadRequest(
                        "Only one selected_option_id is allowed for SINGLE_CHOICE".to_string(),
                    ));
                }
            }
            QuestionType::MultiChoice => {
                if answer.selected_answer_bool.is_some() {
                    return Err(AppError::BadRequest(
                        "selected_answer_bool is not allowed for MULTI_CHOICE".to_string(),
                    ));
                }
            }
            QuestionType::TrueFalse => {
                if !answer.selected_option_ids.is_empty() {
                    return Err(AppError::BadRequest(
                        "selected_option_ids are not allowed for TRUE_FALSE".to_string(),
                    ));
                }
                if answer.selected_answer_bool.is_none() {
                    return Err(AppError::BadRequest(
                        "selected_answer_bool is required for TRUE_FALSE".to_string(),
                    ));
                }
            }
        }

        if question.question.question_type.is_choice() {
            let valid_ids: HashSet<i64> = question.options.iter().map(|o| o.id).collect();
            if !answer
                .selected_option_ids
                .iter()
                .all(|id| valid_ids.contains(id))
            {
                return Err(AppError::BadRequest(
                    "One or more selected_option_ids do not belong to this question".to_string(),
                ));
            }
        }
    }

    Ok(())
}
