// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::user::{User, load_user},
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password, role, is_marked, created_at
         FROM users ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Marks a student, blocking them from submitting attempts.
/// Teacher/Admin only.
pub async fn mark_student(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_marked(&pool, id, true).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({"status": "student marked"}))))
}

/// Clears a student's marked flag.
/// Teacher/Admin only.
pub async fn unmark_student(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_marked(&pool, id, false).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({"status": "student unmarked"}))))
}

async fn set_marked(pool: &SqlitePool, user_id: i64, marked: bool) -> Result<(), AppError> {
    let user = load_user(pool, user_id).await?;
    if !user.is_student() {
        return Err(AppError::BadRequest(
            "Only student users can be marked".to_string(),
        ));
    }

    sqlx::query("UPDATE users SET is_marked = ? WHERE id = ?")
        .bind(marked)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}
