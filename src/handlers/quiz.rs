// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    grading::{calculate_score, determine_correctness, Selection},
    models::{
        attempt::{QuizAttempt, QuizSubmission},
        quiz::{
            CreateQuizRequest, Quiz, QuizView, UpdateQuizRequest, load_question_tree, load_quiz,
        },
        user::{UserView, load_user},
    },
    reconcile,
    results::attempt_result_view,
    submission::validate_submission,
    utils::jwt::Claims,
};

async fn quiz_view(pool: &SqlitePool, quiz: &Quiz) -> Result<QuizView, AppError> {
    let teacher = load_user(pool, quiz.teacher_id).await?;
    let questions = load_question_tree(pool, quiz.id).await?;
    Ok(QuizView::build(quiz, UserView::from(&teacher), &questions))
}

/// Lists all quizzes with their question trees (read view, no correct answers).
/// Public.
pub async fn list_quizzes(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        "SELECT id, title, teacher_id, timing_minutes, available_from, available_to
         FROM quizzes ORDER BY id",
    )
    .fetch_all(&pool)
    .await?;

    let mut views = Vec::with_capacity(quizzes.len());
    for quiz in &quizzes {
        views.push(quiz_view(&pool, quiz).await?);
    }

    Ok(Json(views))
}

/// Retrieves a single quiz (read view, no correct answers).
/// Public.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(&pool, id).await?;
    Ok(Json(quiz_view(&pool, &quiz).await?))
}

/// Creates a quiz with its full question tree.
/// Teacher/Admin only; the caller becomes the owning teacher.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let teacher_id = claims.user_id()?;

    let mut tx = pool.begin().await?;
    let quiz_id = reconcile::create_quiz_tree(&mut tx, teacher_id, &payload).await?;
    tx.commit().await?;

    let quiz = load_quiz(&pool, quiz_id).await?;
    Ok((StatusCode::CREATED, Json(quiz_view(&pool, &quiz).await?)))
}

/// Applies an edit payload to a quiz, reconciling the question tree.
/// Owner or Admin only. All creates/updates/deletes commit atomically.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(&pool, id).await?;
    ensure_owner_or_admin(&claims, &quiz)?;

    let mut tx = pool.begin().await?;
    reconcile::update_quiz_tree(&mut tx, quiz.id, &payload).await?;
    tx.commit().await?;

    let quiz = load_quiz(&pool, id).await?;
    Ok(Json(quiz_view(&pool, &quiz).await?))
}

/// Deletes a quiz and, by cascade, its questions, options and attempts.
/// Owner or Admin only.
pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_quiz(&pool, id).await?;
    ensure_owner_or_admin(&claims, &quiz)?;

    sqlx::query("DELETE FROM quizzes WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

fn ensure_owner_or_admin(claims: &Claims, quiz: &Quiz) -> Result<(), AppError> {
    if claims.role == crate::models::user::roles::ADMIN {
        return Ok(());
    }
    if quiz.teacher_id != claims.user_id()? {
        return Err(AppError::Forbidden(
            "Only the owning teacher or an admin may modify this quiz".to_string(),
        ));
    }
    Ok(())
}

/// Handles a student's quiz submission: validates the payload, then creates
/// the attempt, grades every answer and stores the total score in one
/// transaction. Returns the full graded result view.
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<QuizSubmission>,
) -> Result<impl IntoResponse, AppError> {
    if payload.quiz_id != id {
        return Err(AppError::BadRequest(
            "Quiz ID in payload does not match URL".to_string(),
        ));
    }

    let user = load_user(&pool, claims.user_id()?).await?;
    if !user.is_student() {
        return Err(AppError::Forbidden(
            "Only students may submit quiz attempts".to_string(),
        ));
    }
    if user.is_marked {
        return Err(AppError::Forbidden(
            "Marked students may not submit quiz attempts".to_string(),
        ));
    }

    let quiz = load_quiz(&pool, id).await?;
    let questions = load_question_tree(&pool, quiz.id).await?;

    let now = Utc::now();
    validate_submission(&quiz, &questions, &payload, now)?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO quiz_attempts (user_id, quiz_id, score, submission_time)
         VALUES (?, ?, 0, ?)",
    )
    .bind(user.id)
    .bind(quiz.id)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    let attempt_id = result.last_insert_rowid();

    let mut graded = Vec::with_capacity(payload.answers.len());
    for answer in &payload.answers {
        // The validator already proved membership.
        let question = questions
            .iter()
            .find(|q| q.question.id == answer.question_id)
            .ok_or_else(|| {
                AppError::InternalServerError("validated question disappeared".to_string())
            })?;

        let selection = Selection {
            option_ids: answer.selected_option_ids.clone(),
            answer_bool: answer.selected_answer_bool,
        };
        let is_correct = determine_correctness(question, &selection);

        let inserted = sqlx::query(
            "INSERT INTO participant_answers (attempt_id, question_id, selected_answer_bool, is_correct)
             VALUES (?, ?, ?, ?)",
        )
        .bind(attempt_id)
        .bind(answer.question_id)
        .bind(answer.selected_answer_bool)
        .bind(is_correct)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                AppError::Conflict(format!(
                    "Question {} was already answered in this attempt",
                    answer.question_id
                ))
            } else {
                AppError::from(e)
            }
        })?;
        let answer_id = inserted.last_insert_rowid();

        for option_id in &answer.selected_option_ids {
            sqlx::query("INSERT INTO participant_answer_options (answer_id, option_id) VALUES (?, ?)")
                .bind(answer_id)
                .bind(option_id)
                .execute(&mut *tx)
                .await?;
        }

        graded.push((question.question.points, is_correct));
    }

    let score = calculate_score(graded);
    sqlx::query("UPDATE quiz_attempts SET score = ? WHERE id = ?")
        .bind(score)
        .bind(attempt_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        "SELECT id, user_id, quiz_id, score, submission_time FROM quiz_attempts WHERE id = ?",
    )
    .bind(attempt_id)
    .fetch_one(&pool)
    .await?;

    let view = attempt_result_view(&pool, &attempt).await?;
    Ok((StatusCode::CREATED, Json(view)))
}
