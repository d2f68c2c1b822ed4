// src/results.rs
//
// Derived read-only result fields: attempt rank, the user's personal best on
// the quiz, and the disclosure policy gating correct-answer visibility. Rank
// and best score are read-time aggregations over committed rows; the values
// are snapshots, not live-updated fields.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::attempt::{
    load_answers, load_selected_options, AttemptResultView, ParticipantAnswerResultView,
    QuizAttempt,
};
use crate::models::quiz::{
    load_question_tree, load_quiz, AnswerOptionView, QuestionView, Quiz, QuizView,
};
use crate::models::user::{load_user, UserView};

/// Whether correct-answer data may appear in result views for this quiz.
/// Disclosed when there is no closing bound, or once the window has closed.
/// This is a display-time transform, not an authorization check.
pub fn correct_answers_visible(quiz: &Quiz, now: DateTime<Utc>) -> bool {
    match quiz.available_to {
        None => true,
        Some(to) => now > to,
    }
}

/// Rank of an attempt among all attempts on the same quiz: 1 + the number of
/// attempts with a higher score, or the same score and an earlier submission.
/// Full ties share a rank number.
pub async fn rank_of_attempt(pool: &SqlitePool, attempt: &QuizAttempt) -> Result<i64, AppError> {
    let ranked_above: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quiz_attempts
         WHERE quiz_id = ?
           AND (score > ? OR (score = ? AND submission_time < ?))",
    )
    .bind(attempt.quiz_id)
    .bind(attempt.score)
    .bind(attempt.score)
    .bind(attempt.submission_time)
    .fetch_one(pool)
    .await?;

    Ok(ranked_above + 1)
}

/// The user's best score on a quiz. Timed quizzes (timing_minutes > 0, which
/// the schema guarantees today) take the maximum over all attempts; the
/// untimed policy keeps the chronologically first attempt's score.
pub async fn best_score_for_user(
    pool: &SqlitePool,
    user_id: i64,
    quiz: &Quiz,
) -> Result<f64, AppError> {
    if quiz.timing_minutes > 0 {
        let best: Option<f64> = sqlx::query_scalar(
            "SELECT MAX(score) FROM quiz_attempts WHERE user_id = ? AND quiz_id = ?",
        )
        .bind(user_id)
        .bind(quiz.id)
        .fetch_one(pool)
        .await?;
        Ok(best.unwrap_or(0.0))
    } else {
        let first: Option<f64> = sqlx::query_scalar(
            "SELECT score FROM quiz_attempts WHERE user_id = ? AND quiz_id = ?
             ORDER BY submission_time ASC, id ASC LIMIT 1",
        )
        .bind(user_id)
        .bind(quiz.id)
        .fetch_optional(pool)
        .await?;
        Ok(first.unwrap_or(0.0))
    }
}

/// Assembles the full result view of an attempt: quiz tree, per-answer
/// verdicts, rank, personal best, with correct-answer fields filtered by the
/// disclosure policy.
pub async fn attempt_result_view(
    pool: &SqlitePool,
    attempt: &QuizAttempt,
) -> Result<AttemptResultView, AppError> {
    let now = Utc::now();

    let quiz = load_quiz(pool, attempt.quiz_id).await?;
    let questions = load_question_tree(pool, quiz.id).await?;
    let teacher = load_user(pool, quiz.teacher_id).await?;
    let user = load_user(pool, attempt.user_id).await?;

    let answers = load_answers(pool, attempt.id).await?;
    let selections = load_selected_options(pool, attempt.id).await?;

    let disclose = correct_answers_visible(&quiz, now);

    let mut answer_views = Vec::with_capacity(answers.len());
    for answer in &answers {
        let question = questions
            .iter()
            .find(|q| q.question.id == answer.question_id)
            .ok_or_else(|| {
                AppError::InternalServerError(format!(
                    "answer {} references a question missing from quiz {}",
                    answer.id, quiz.id
                ))
            })?;

        let selected_options: Vec<AnswerOptionView> = selections
            .iter()
            .filter(|(answer_id, _)| *answer_id == answer.id)
            .filter_map(|(_, option_id)| {
                question.options.iter().find(|o| o.id == *option_id)
            })
            .map(AnswerOptionView::from)
            .collect();

        let correct_answer_bool = if disclose {
            question.question.correct_answer_bool
        } else {
            None
        };
        let correct_options: Vec<AnswerOptionView> = if disclose {
            question
                .options
                .iter()
                .filter(|o| o.is_correct)
                .map(AnswerOptionView::from)
                .collect()
        } else {
            vec![]
        };

        answer_views.push(ParticipantAnswerResultView {
            id: answer.id,
            question: QuestionView::from(question),
            selected_options,
            selected_answer_bool: answer.selected_answer_bool,
            is_correct: answer.is_correct,
            correct_answer_bool,
            correct_options,
        });
    }

    let rank = rank_of_attempt(pool, attempt).await?;
    let best_score = best_score_for_user(pool, attempt.user_id, &quiz).await?;

    Ok(AttemptResultView {
        id: attempt.id,
        user: UserView::from(&user),
        quiz: QuizView::build(&quiz, UserView::from(&teacher), &questions),
        score: attempt.score,
        submission_time: attempt.submission_time,
        rank,
        best_score_for_user_on_quiz: best_score,
        participant_answers: answer_views,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn quiz(to: Option<DateTime<Utc>>) -> Quiz {
        Quiz {
            id: 1,
            title: "History".to_string(),
            teacher_id: 1,
            timing_minutes: 15,
            available_from: None,
            available_to: to,
        }
    }

    #[test]
    fn no_closing_bound_always_discloses() {
        assert!(correct_answers_visible(&quiz(None), Utc::now()));
    }

    #[test]
    fn open_window_withholds() {
        let now = Utc::now();
        assert!(!correct_answers_visible(
            &quiz(Some(now + Duration::hours(1))),
            now
        ));
    }

    #[test]
    fn closed_window_discloses() {
        let now = Utc::now();
        assert!(correct_answers_visible(
            &quiz(Some(now - Duration::hours(1))),
            now
        ));
    }
}
