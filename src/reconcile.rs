// src/reconcile.rs
//
// Tree Reconciler: diffs an incoming quiz edit payload against the persisted
// Quiz -> Question -> AnswerOption tree and applies creates, updates and
// deletes. Every function here runs inside the caller's transaction; an error
// return drops the transaction uncommitted, so no partial state survives.
//
// Per parent the order is: delete children absent from the payload id set,
// then upsert the incoming children. A child with an id matching a persisted
// row is updated field-by-field (provided fields only); a child without an id,
// or with an unknown id, is created fresh. After a question's options are
// reconciled its final persisted state is validated against the shape
// invariants.

use std::collections::HashSet;

use sqlx::{QueryBuilder, Sqlite, Transaction};

use crate::error::AppError;
use crate::models::quiz::{
    validate_question_shape, AnswerOptionPayload, CreateQuizRequest, QuestionPayload,
    QuestionType, UpdateQuizRequest,
};

/// Creates a quiz with its full question/option tree. Returns the new quiz id.
pub async fn create_quiz_tree(
    tx: &mut Transaction<'_, Sqlite>,
    teacher_id: i64,
    req: &CreateQuizRequest,
) -> Result<i64, AppError> {
    if req.timing_minutes < 1 {
        return Err(AppError::BadRequest(
            "timing_minutes: must be at least 1".to_string(),
        ));
    }

    let result = sqlx::query(
        "INSERT INTO quizzes (title, teacher_id, timing_minutes, available_from, available_to)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&req.title)
    .bind(teacher_id)
    .bind(req.timing_minutes)
    .bind(req.available_from)
    .bind(req.available_to)
    .execute(&mut **tx)
    .await?;
    let quiz_id = result.last_insert_rowid();

    for question in &req.questions {
        let question_id = insert_question(tx, quiz_id, question).await?;
        validate_question_state(tx, question_id).await?;
    }

    Ok(quiz_id)
}

/// Applies an edit payload to a persisted quiz: scalar fields first, then the
/// question tree when the `questions` key is present. Absence of the key
/// leaves the tree untouched; an empty list deletes every question.
pub async fn update_quiz_tree(
    tx: &mut Transaction<'_, Sqlite>,
    quiz_id: i64,
    req: &UpdateQuizRequest,
) -> Result<(), AppError> {
    update_quiz_fields(tx, quiz_id, req).await?;

    if let Some(questions) = &req.questions {
        reconcile_questions(tx, quiz_id, questions).await?;
    }

    Ok(())
}

/// Partial overwrite of the quiz scalar fields. Availability bounds use the
/// absent/null distinction: absent leaves the bound, explicit null clears it.
async fn update_quiz_fields(
    tx: &mut Transaction<'_, Sqlite>,
    quiz_id: i64,
    req: &UpdateQuizRequest,
) -> Result<(), AppError> {
    if req.title.is_none()
        && req.timing_minutes.is_none()
        && req.available_from.is_none()
        && req.available_to.is_none()
    {
        return Ok(());
    }

    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(AppError::BadRequest(
                "title: must not be empty".to_string(),
            ));
        }
    }
    if let Some(minutes) = req.timing_minutes {
        if minutes < 1 {
            return Err(AppError::BadRequest(
                "timing_minutes: must be at least 1".to_string(),
            ));
        }
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = &req.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.clone());
    }

    if let Some(minutes) = req.timing_minutes {
        separated.push("timing_minutes = ");
        separated.push_bind_unseparated(minutes);
    }

    if let Some(from) = req.available_from {
        separated.push("available_from = ");
        separated.push_bind_unseparated(from);
    }

    if let Some(to) = req.available_to {
        separated.push("available_to = ");
        separated.push_bind_unseparated(to);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(quiz_id);

    builder.build().execute(&mut **tx).await?;
    Ok(())
}

/// Diff-and-apply over a quiz's questions: compute the persisted and incoming
/// id sets, delete the absent, then upsert the present.
async fn reconcile_questions(
    tx: &mut Transaction<'_, Sqlite>,
    quiz_id: i64,
    incoming: &[QuestionPayload],
) -> Result<(), AppError> {
    let existing: Vec<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE quiz_id = ?")
        .bind(quiz_id)
        .fetch_all(&mut **tx)
        .await?;
    let existing: HashSet<i64> = existing.into_iter().collect();

    let incoming_ids: HashSet<i64> = incoming.iter().filter_map(|q| q.id).collect();
    let to_delete: Vec<i64> = existing
        .iter()
        .filter(|id| !incoming_ids.contains(id))
        .copied()
        .collect();

    // Deletes first, so re-linked siblings cannot collide with stale rows.
    if !to_delete.is_empty() {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM questions WHERE quiz_id = ");
        builder.push_bind(quiz_id);
        builder.push(" AND id IN (");
        let mut separated = builder.separated(",");
        for id in &to_delete {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        builder.build().execute(&mut **tx).await?;
    }

    for question in incoming {
        let question_id = match question.id {
            Some(id) if existing.contains(&id) => {
                update_question(tx, id, question).await?;
                if let Some(options) = &question.answer_options {
                    reconcile_options(tx, id, options).await?;
                }
                id
            }
            // No id, or an id the persisted tree does not know: create fresh.
            _ => insert_question(tx, quiz_id, question).await?,
        };
        validate_question_state(tx, question_id).await?;
    }

    Ok(())
}

/// Inserts a new question and its options. Creation requires the full shape.
async fn insert_question(
    tx: &mut Transaction<'_, Sqlite>,
    quiz_id: i64,
    payload: &QuestionPayload,
) -> Result<i64, AppError> {
    let question_type = payload
        .question_type
        .ok_or_else(|| AppError::BadRequest("question_type: This field is required".to_string()))?;
    let text = payload
        .text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("text: Question text cannot be empty".to_string()))?;
    let points = payload
        .points
        .ok_or_else(|| AppError::BadRequest("points: Points must be provided".to_string()))?;
    if points < 0.0 {
        return Err(AppError::BadRequest(
            "points: Points must be a non-negative number".to_string(),
        ));
    }

    let correct_answer_bool = payload.correct_answer_bool.flatten();

    let result = sqlx::query(
        "INSERT INTO questions (quiz_id, question_type, text, points, correct_answer_bool)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(quiz_id)
    .bind(question_type)
    .bind(text)
    .bind(points)
    .bind(correct_answer_bool)
    .execute(&mut **tx)
    .await?;
    let question_id = result.last_insert_rowid();

    if let Some(options) = &payload.answer_options {
        for option in options {
            insert_option(tx, question_id, option).await?;
        }
    }

    Ok(question_id)
}

/// Field-by-field overwrite of the provided question fields.
/// `correct_answer_bool` distinguishes absent (untouched) from null (cleared).
async fn update_question(
    tx: &mut Transaction<'_, Sqlite>,
    question_id: i64,
    payload: &QuestionPayload,
) -> Result<(), AppError> {
    if payload.question_type.is_none()
        && payload.text.is_none()
        && payload.points.is_none()
        && payload.correct_answer_bool.is_none()
    {
        return Ok(());
    }

    if let Some(text) = &payload.text {
        if text.trim().is_empty() {
            return Err(AppError::BadRequest(
                "text: Question text cannot be empty".to_string(),
            ));
        }
    }
    if let Some(points) = payload.points {
        if points < 0.0 {
            return Err(AppError::BadRequest(
                "points: Points must be a non-negative number".to_string(),
            ));
        }
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(question_type) = payload.question_type {
        separated.push("question_type = ");
        separated.push_bind_unseparated(question_type);
    }

    if let Some(text) = &payload.text {
        separated.push("text = ");
        separated.push_bind_unseparated(text.clone());
    }

    if let Some(points) = payload.points {
        separated.push("points = ");
        separated.push_bind_unseparated(points);
    }

    if let Some(correct_answer_bool) = payload.correct_answer_bool {
        separated.push("correct_answer_bool = ");
        separated.push_bind_unseparated(correct_answer_bool);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(question_id);

    builder.build().execute(&mut **tx).await?;
    Ok(())
}

/// Diff-and-apply over one question's answer options, same three steps as the
/// question level.
async fn reconcile_options(
    tx: &mut Transaction<'_, Sqlite>,
    question_id: i64,
    incoming: &[AnswerOptionPayload],
) -> Result<(), AppError> {
    let existing: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM answer_options WHERE question_id = ?")
            .bind(question_id)
            .fetch_all(&mut **tx)
            .await?;
    let existing: HashSet<i64> = existing.into_iter().collect();

    let incoming_ids: HashSet<i64> = incoming.iter().filter_map(|o| o.id).collect();
    let to_delete: Vec<i64> = existing
        .iter()
        .filter(|id| !incoming_ids.contains(id))
        .copied()
        .collect();

    if !to_delete.is_empty() {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM answer_options WHERE question_id = ");
        builder.push_bind(question_id);
        builder.push(" AND id IN (");
        let mut separated = builder.separated(",");
        for id in &to_delete {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        builder.build().execute(&mut **tx).await?;
    }

    for option in incoming {
        match option.id {
            Some(id) if existing.contains(&id) => update_option(tx, id, option).await?,
            _ => {
                insert_option(tx, question_id, option).await?;
            }
        }
    }

    Ok(())
}

async fn insert_option(
    tx: &mut Transaction<'_, Sqlite>,
    question_id: i64,
    payload: &AnswerOptionPayload,
) -> Result<i64, AppError> {
    let text = payload
        .text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            AppError::BadRequest("answer_options: Answer option text cannot be empty".to_string())
        })?;
    let is_correct = payload.is_correct.ok_or_else(|| {
        AppError::BadRequest("answer_options: is_correct is required".to_string())
    })?;

    let result = sqlx::query("INSERT INTO answer_options (question_id, text, is_correct) VALUES (?, ?, ?)")
        .bind(question_id)
        .bind(text)
        .bind(is_correct)
        .execute(&mut **tx)
        .await?;

    Ok(result.last_insert_rowid())
}

async fn update_option(
    tx: &mut Transaction<'_, Sqlite>,
    option_id: i64,
    payload: &AnswerOptionPayload,
) -> Result<(), AppError> {
    if payload.text.is_none() && payload.is_correct.is_none() {
        return Ok(());
    }

    if let Some(text) = &payload.text {
        if text.trim().is_empty() {
            return Err(AppError::BadRequest(
                "answer_options: Answer option text cannot be empty".to_string(),
            ));
        }
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE answer_options SET ");
    let mut separated = builder.separated(", ");

    if let Some(text) = &payload.text {
        separated.push("text = ");
        separated.push_bind_unseparated(text.clone());
    }

    if let Some(is_correct) = payload.is_correct {
        separated.push("is_correct = ");
        separated.push_bind_unseparated(is_correct);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(option_id);

    builder.build().execute(&mut **tx).await?;
    Ok(())
}

/// Re-reads a question's final state inside the transaction and checks the
/// shape invariants. Runs after option reconciliation so it sees the merged
/// result of partial updates.
async fn validate_question_state(
    tx: &mut Transaction<'_, Sqlite>,
    question_id: i64,
) -> Result<(), AppError> {
    let (question_type, correct_answer_bool): (QuestionType, Option<bool>) =
        sqlx::query_as("SELECT question_type, correct_answer_bool FROM questions WHERE id = ?")
            .bind(question_id)
            .fetch_one(&mut **tx)
            .await?;

    let flags: Vec<bool> =
        sqlx::query_scalar("SELECT is_correct FROM answer_options WHERE question_id = ? ORDER BY id")
            .bind(question_id)
            .fetch_all(&mut **tx)
            .await?;

    validate_question_shape(question_type, correct_answer_bool, &flags)
}
