// tests/quiz_authoring_tests.rs
//
// Covers the authoring surface: quiz creation, tree reconciliation on update
// (creates, field updates, deletes), shape invariant enforcement and the
// atomicity of failed edits.

use quiz_backend::{config::Config, routes, state::AppState};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

async fn spawn_app() -> (String, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Registers a user, promotes them to TEACHER and returns a fresh token.
async fn teacher_token(client: &reqwest::Client, address: &str, pool: &SqlitePool) -> String {
    let username = format!("teacher_{}", uuid::Uuid::new_v4().simple());
    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");

    sqlx::query("UPDATE users SET role = 'TEACHER' WHERE username = ?")
        .bind(&username)
        .execute(pool)
        .await
        .unwrap();

    let login_resp = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .unwrap();
    login_resp["token"].as_str().unwrap().to_string()
}

fn three_question_payload() -> serde_json::Value {
    serde_json::json!({
        "title": "Geography basics",
        "timing_minutes": 15,
        "questions": [
            {
                "question_type": "SINGLE_CHOICE",
                "text": "What is the capital of France?",
                "points": 2.0,
                "answer_options": [
                    { "text": "Paris", "is_correct": true },
                    { "text": "Berlin", "is_correct": false }
                ]
            },
            {
                "question_type": "MULTI_CHOICE",
                "text": "Which of these are in Europe?",
                "points": 3.0,
                "answer_options": [
                    { "text": "Spain", "is_correct": true },
                    { "text": "Portugal", "is_correct": true },
                    { "text": "Peru", "is_correct": false }
                ]
            },
            {
                "question_type": "TRUE_FALSE",
                "text": "The Nile is in Asia.",
                "points": 1.0,
                "correct_answer_bool": false
            }
        ]
    })
}

async fn create_quiz(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    payload: &serde_json::Value,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(payload)
        .send()
        .await
        .expect("Create quiz failed");
    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

async fn question_count(pool: &SqlitePool, quiz_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = ?")
        .bind(quiz_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn create_persists_the_full_tree() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    assert_eq!(quiz["title"], "Geography basics");
    assert_eq!(quiz["timing_minutes"], 15);
    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[0]["answer_options"].as_array().unwrap().len(), 2);
    assert_eq!(questions[1]["answer_options"].as_array().unwrap().len(), 3);
    assert!(questions[2]["answer_options"].as_array().unwrap().is_empty());

    assert_eq!(question_count(&pool, quiz_id).await, 3);
    let correct_flags: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM answer_options ao
         JOIN questions q ON q.id = ao.question_id
         WHERE q.quiz_id = ? AND ao.is_correct = 1",
    )
    .bind(quiz_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(correct_flags, 3);
}

#[tokio::test]
async fn create_rejects_invalid_question_shapes() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    // Single choice with two correct options.
    let bad = serde_json::json!({
        "title": "Broken quiz",
        "timing_minutes": 10,
        "questions": [
            {
                "question_type": "SINGLE_CHOICE",
                "text": "Pick one",
                "points": 1.0,
                "answer_options": [
                    { "text": "A", "is_correct": true },
                    { "text": "B", "is_correct": true }
                ]
            }
        ]
    });

    let response = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&bad)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Nothing was persisted.
    let quizzes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quizzes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(quizzes, 0);

    // True/false carrying choice options is also rejected.
    let bad = serde_json::json!({
        "title": "Broken quiz",
        "timing_minutes": 10,
        "questions": [
            {
                "question_type": "TRUE_FALSE",
                "text": "Yes or no?",
                "points": 1.0,
                "correct_answer_bool": true,
                "answer_options": [
                    { "text": "Yes", "is_correct": true }
                ]
            }
        ]
    });
    let response = client
        .post(format!("{}/api/quizzes", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&bad)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn echoing_the_current_tree_changes_nothing() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let question_ids: Vec<i64> = quiz["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect();

    // Send back just the ids: every question survives untouched.
    let echo = serde_json::json!({
        "questions": question_ids
            .iter()
            .map(|id| serde_json::json!({ "id": id }))
            .collect::<Vec<_>>()
    });

    let updated: serde_json::Value = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&echo)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let surviving: Vec<i64> = updated["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_i64().unwrap())
        .collect();
    assert_eq!(surviving, question_ids);
    assert_eq!(updated["title"], "Geography basics");
}

#[tokio::test]
async fn omitted_question_is_deleted_with_its_options() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let questions = quiz["questions"].as_array().unwrap();
    let kept_a = questions[0]["id"].as_i64().unwrap();
    let dropped = questions[1]["id"].as_i64().unwrap();
    let kept_b = questions[2]["id"].as_i64().unwrap();

    let payload = serde_json::json!({
        "questions": [
            { "id": kept_a },
            { "id": kept_b }
        ]
    });

    let response = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(question_count(&pool, quiz_id).await, 2);
    let orphaned_options: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM answer_options WHERE question_id = ?")
            .bind(dropped)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(orphaned_options, 0);
}

#[tokio::test]
async fn empty_question_list_clears_the_tree() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "questions": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(question_count(&pool, quiz_id).await, 0);
}

#[tokio::test]
async fn omitting_the_questions_key_leaves_the_tree_alone() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let updated: serde_json::Value = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "title": "Geography, renamed" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(updated["title"], "Geography, renamed");
    assert_eq!(updated["questions"].as_array().unwrap().len(), 3);
    assert_eq!(question_count(&pool, quiz_id).await, 3);
}

#[tokio::test]
async fn option_reconciliation_updates_adds_and_deletes() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let multi = &quiz["questions"].as_array().unwrap()[1];
    let multi_id = multi["id"].as_i64().unwrap();
    let options = multi["answer_options"].as_array().unwrap();
    let spain = options[0]["id"].as_i64().unwrap();
    let portugal = options[1]["id"].as_i64().unwrap();
    // Peru (options[2]) is omitted below, so it gets deleted.

    let payload = serde_json::json!({
        "questions": [
            { "id": quiz["questions"][0]["id"] },
            {
                "id": multi_id,
                "answer_options": [
                    { "id": spain, "text": "Spain (updated)" },
                    { "id": portugal, "is_correct": false },
                    { "text": "Italy", "is_correct": true }
                ]
            },
            { "id": quiz["questions"][2]["id"] }
        ]
    });

    let response = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let rows: Vec<(String, bool)> = sqlx::query_as(
        "SELECT text, is_correct FROM answer_options WHERE question_id = ? ORDER BY id",
    )
    .bind(multi_id)
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], ("Spain (updated)".to_string(), true));
    assert_eq!(rows[1], ("Portugal".to_string(), false));
    assert_eq!(rows[2], ("Italy".to_string(), true));
}

#[tokio::test]
async fn failed_update_rolls_back_entirely() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let single = &quiz["questions"].as_array().unwrap()[0];
    let single_id = single["id"].as_i64().unwrap();
    let paris = single["answer_options"][0]["id"].as_i64().unwrap();
    let berlin = single["answer_options"][1]["id"].as_i64().unwrap();

    // Renames the quiz AND flips Berlin to correct, which leaves the single
    // choice question with two correct options. The whole edit must abort.
    let payload = serde_json::json!({
        "title": "Should not stick",
        "questions": [
            {
                "id": single_id,
                "answer_options": [
                    { "id": paris },
                    { "id": berlin, "is_correct": true }
                ]
            },
            { "id": quiz["questions"][1]["id"] },
            { "id": quiz["questions"][2]["id"] }
        ]
    });

    let response = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let (title, berlin_correct): (String, bool) = {
        let title: String = sqlx::query_scalar("SELECT title FROM quizzes WHERE id = ?")
            .bind(quiz_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        let flag: bool = sqlx::query_scalar("SELECT is_correct FROM answer_options WHERE id = ?")
            .bind(berlin)
            .fetch_one(&pool)
            .await
            .unwrap();
        (title, flag)
    };
    assert_eq!(title, "Geography basics");
    assert!(!berlin_correct);
}

#[tokio::test]
async fn unknown_question_id_creates_a_fresh_question() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let payload = serde_json::json!({
        "questions": [
            { "id": quiz["questions"][0]["id"] },
            { "id": quiz["questions"][1]["id"] },
            { "id": quiz["questions"][2]["id"] },
            {
                "id": 424242,
                "question_type": "TRUE_FALSE",
                "text": "Water boils at 100C at sea level.",
                "points": 1.0,
                "correct_answer_bool": true
            }
        ]
    });

    let updated: serde_json::Value = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&payload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let questions = updated["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    // The server assigned its own id, not the client's guess.
    assert!(questions.iter().all(|q| q["id"] != 424242));
    assert_eq!(question_count(&pool, quiz_id).await, 4);
}

#[tokio::test]
async fn clearing_availability_bounds_with_explicit_null() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let mut payload = three_question_payload();
    payload["available_from"] = serde_json::json!("2026-01-01T00:00:00Z");
    payload["available_to"] = serde_json::json!("2026-12-31T00:00:00Z");

    let quiz = create_quiz(&client, &address, &token, &payload).await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    assert_eq!(quiz["has_availability_window"], true);

    let updated: serde_json::Value = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "available_from": null, "available_to": null }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(updated["has_availability_window"], false);
    assert!(updated["available_from"].is_null());
    assert!(updated["available_to"].is_null());

    let bounds: (Option<String>, Option<String>) =
        sqlx::query_as("SELECT available_from, available_to FROM quizzes WHERE id = ?")
            .bind(quiz_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(bounds, (None, None));
}

#[tokio::test]
async fn only_the_owner_or_an_admin_may_edit() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let owner = teacher_token(&client, &address, &pool).await;
    let other = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &owner, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", other))
        .json(&serde_json::json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .delete(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", other))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn delete_cascades_through_the_tree() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = teacher_token(&client, &address, &pool).await;

    let quiz = create_quiz(&client, &address, &token, &three_question_payload()).await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .delete(format!("{}/api/quizzes/{}", address, quiz_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(&pool)
        .await
        .unwrap();
    let options: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM answer_options")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(questions, 0);
    assert_eq!(options, 0);
}
