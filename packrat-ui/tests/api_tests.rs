//! Integration tests for packrat-ui API endpoints
//!
//! Exercises the real router against an in-memory database:
//! - Health endpoint (no auth required)
//! - Registration / login / session middleware
//! - Card CRUD with dedup merge
//! - Import status polling and upload + cancel flow

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

use packrat_ui::services::ScryfallClient;
use packrat_ui::{build_router, AppState};

/// Test helper: in-memory database with initialized schema
async fn setup_state() -> AppState {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    packrat_ui::db::init_tables(&pool).await.unwrap();

    let scryfall = Arc::new(ScryfallClient::new().expect("client builds"));
    AppState::new(pool, scryfall)
}

async fn setup_app() -> (Router, AppState) {
    let state = setup_state().await;
    (build_router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Test helper: extract JSON body from a response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Register and log in a user, returning the bearer token
async fn login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "email": email, "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": email, "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_endpoint_requires_no_auth() {
    let (app, _state) = setup_app().await;

    let response = app.oneshot(get_request("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "packrat-ui");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bogus_tokens() {
    let (app, _state) = setup_app().await;

    let response = app
        .clone()
        .oneshot(get_request("/api/cards", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get_request("/api/cards", Some("not-a-session")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (app, _state) = setup_app().await;
    login(&app, "a@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "email": "a@example.com", "password": "other" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let (app, _state) = setup_app().await;
    login(&app, "a@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "a@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn add_list_edit_delete_card_flow() {
    let (app, _state) = setup_app().await;
    let token = login(&app, "a@example.com").await;

    // Add
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/cards",
            Some(&token),
            json!({
                "card_name": "Nonexistent Card Zzz",
                "set_code": "TST",
                "collector_number": "1",
                "quantity": 2,
                "purchase_price": 1.5
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let card_id = body["id"].as_i64().unwrap();
    assert_eq!(body["merged"], false);

    // List
    let response = app
        .clone()
        .oneshot(get_request("/api/cards?search=Zzz", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["cards"][0]["card_name"], "Nonexistent Card Zzz");

    // Edit
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/cards/{}", card_id),
            Some(&token),
            json!({ "quantity": 5, "condition": "Played", "purchase_price": 2.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["quantity"], 5);
    assert_eq!(body["condition"], "Played");

    // Delete
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/cards/{}", card_id))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Gone
    let response = app
        .oneshot(get_request(
            &format!("/api/cards/{}", card_id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn adding_same_card_line_twice_merges_quantity() {
    let (app, _state) = setup_app().await;
    let token = login(&app, "a@example.com").await;

    let payload = json!({
        "card_name": "Nonexistent Card Zzz",
        "set_code": "TST",
        "collector_number": "1",
        "quantity": 2
    });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/cards", Some(&token), payload.clone()))
        .await
        .unwrap();
    let first = extract_json(response.into_body()).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/cards", Some(&token), payload))
        .await
        .unwrap();
    let second = extract_json(response.into_body()).await;

    assert_eq!(second["merged"], true);
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["quantity"], 4);
}

#[tokio::test]
async fn owners_only_see_their_own_cards() {
    let (app, _state) = setup_app().await;
    let token_a = login(&app, "a@example.com").await;
    let token_b = login(&app, "b@example.com").await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/cards",
            Some(&token_a),
            json!({ "card_name": "Nonexistent Card Zzz" }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(get_request("/api/cards", Some(&token_b)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn import_status_is_idle_before_any_run() {
    let (app, _state) = setup_app().await;
    let token = login(&app, "a@example.com").await;

    let response = app
        .oneshot(get_request("/api/import/status", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["active"], false);
    assert!(body["latest_progress"].is_null());
}

#[tokio::test]
async fn cancel_without_active_import_is_not_found() {
    let (app, _state) = setup_app().await;
    let token = login(&app, "a@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/import/cancel",
            Some(&token),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn multipart_upload(uri: &str, token: &str, csv: &str) -> Request<Body> {
    let boundary = "packrat-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"csv_file\"; filename=\"cards.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn csv_upload_starts_job_and_cancel_terminates_it() {
    let (app, state) = setup_app().await;
    let token = login(&app, "a@example.com").await;

    // A large file keeps the merge pass (and its cooperative pauses)
    // running while the follow-up requests execute
    let mut csv = String::from("card_name,quantity\n");
    for i in 0..500 {
        csv.push_str(&format!("Placeholder Card {},1\n", i));
    }

    let response = app
        .clone()
        .oneshot(multipart_upload("/api/import", &token, &csv))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["started"], true);

    // Second upload while the slot is held conflicts
    let response = app
        .clone()
        .oneshot(multipart_upload(
            "/api/import",
            &token,
            "card_name\nAnother\n",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Cancel the run before the spawned job makes network lookups
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/import/cancel",
            Some(&token),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Drive the job to completion and confirm the terminal snapshot
    let user_id = 1;
    let job = state
        .import_jobs
        .write()
        .await
        .remove(&user_id)
        .expect("job registered");
    assert!(job.handle.await.unwrap().is_err());

    let response = app
        .oneshot(get_request("/api/import/status", Some(&token)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["active"], false);
    assert_eq!(body["latest_progress"]["type"], "error");
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let (app, _state) = setup_app().await;
    let token = login(&app, "a@example.com").await;

    let boundary = "packrat-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"other\"\r\n\r\n\
         hello\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/import")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_prices_with_no_cards_is_rejected() {
    let (app, _state) = setup_app().await;
    let token = login(&app, "a@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/cards/refresh_prices",
            Some(&token),
            json!({ "card_ids": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let (app, _state) = setup_app().await;
    let token = login(&app, "a@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/logout",
            Some(&token),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get_request("/api/cards", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
