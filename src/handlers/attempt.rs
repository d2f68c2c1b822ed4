// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        attempt::{QuizAttempt, load_attempt},
        quiz::load_quiz,
        user::roles,
    },
    results::attempt_result_view,
    utils::jwt::Claims,
};

/// Lists quiz attempts as full result views, newest first.
/// Students only see their own attempts; teachers and admins see all.
pub async fn list_attempts(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = if claims.role == roles::STUDENT {
        sqlx::query_as::<_, QuizAttempt>(
            "SELECT id, user_id, quiz_id, score, submission_time
             FROM quiz_attempts WHERE user_id = ? ORDER BY submission_time DESC, id DESC",
        )
        .bind(claims.user_id()?)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, QuizAttempt>(
            "SELECT id, user_id, quiz_id, score, submission_time
             FROM quiz_attempts ORDER BY submission_time DESC, id DESC",
        )
        .fetch_all(&pool)
        .await?
    };

    let mut views = Vec::with_capacity(attempts.len());
    for attempt in &attempts {
        views.push(attempt_result_view(&pool, attempt).await?);
    }

    Ok(Json(views))
}

/// Retrieves one attempt's result view.
/// Accessible to the attempt owner, the teacher owning the quiz, and admins.
pub async fn get_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = load_attempt(&pool, id).await?;
    let caller_id = claims.user_id()?;

    let mut allowed = attempt.user_id == caller_id || claims.role == roles::ADMIN;
    if !allowed && claims.role == roles::TEACHER {
        let quiz = load_quiz(&pool, attempt.quiz_id).await?;
        allowed = quiz.teacher_id == caller_id;
    }
    if !allowed {
        return Err(AppError::Forbidden(
            "You may only view your own attempts or attempts on your own quizzes".to_string(),
        ));
    }

    Ok(Json(attempt_result_view(&pool, &attempt).await?))
}
