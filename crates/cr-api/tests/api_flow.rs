//! End-to-end HTTP tests against the real SQLite, local storage and
//! password auth adapters.

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::header::{AUTHORIZATION, CONTENT_TYPE};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use cr_api::{configure_routes, AppState};
use cr_auth_simple::SimpleAuthProvider;
use cr_core::service::{RankingService, ServiceSettings};
use cr_db_sqlite::SqliteChipRepo;
use cr_storage_local::LocalMediaStore;
use serde_json::{json, Value};

const BOUNDARY: &str = "chipboundary";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

async fn app_state(dir: &tempfile::TempDir) -> web::Data<AppState> {
    let repo = Arc::new(SqliteChipRepo::new("sqlite::memory:").await.unwrap());
    let media = Arc::new(LocalMediaStore::new(
        dir.path().to_path_buf(),
        "/static/uploads".into(),
        1024 * 1024,
    ));
    let auth = Arc::new(SimpleAuthProvider::new(
        repo.clone(),
        "pepper",
        Duration::from_secs(600),
    ));
    let service = RankingService::new(repo, media, auth, ServiceSettings::default());
    web::Data::new(AppState {
        service,
        max_upload_bytes: 1024 * 1024,
    })
}

fn multipart(fields: &[(&str, &str)], file: Option<(&str, &str)>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((field, file_name)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(PNG_MAGIC);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, token: &str, body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header((AUTHORIZATION, format!("Bearer {token}")))
        .insert_header((
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(App::new().app_data($state.clone()).configure(configure_routes)).await
    };
}

/// Signs up and in, returning the bearer token.
macro_rules! signed_in {
    ($app:expr, $email:expr) => {{
        let resp = test::call_service(
            &$app,
            test::TestRequest::post()
                .uri("/api/auth/signup")
                .set_json(json!({
                    "email": $email,
                    "password": "hunter22",
                    "username": "frog"
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let session: Value = test::call_and_read_body_json(
            &$app,
            test::TestRequest::post()
                .uri("/api/auth/signin")
                .set_json(json!({ "email": $email, "password": "hunter22" }))
                .to_request(),
        )
        .await;
        session["token"].as_str().unwrap().to_string()
    }};
}

#[actix_web::test]
async fn test_anonymous_writes_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir).await;
    let app = app!(state);

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/chips/{}/vote", uuid::Uuid::now_v7()))
            .set_json(json!({ "score": 4 }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "please sign in first");

    let resp = test::call_service(
        &app,
        multipart_request("/api/chips", "bogus", multipart(&[("name", "X")], Some(("file", "x.png"))))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_upload_vote_comment_delete() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir).await;
    let app = app!(state);
    let token = signed_in!(app, "frog@example.com");

    // Upload
    let resp = test::call_service(
        &app,
        multipart_request(
            "/api/chips",
            &token,
            multipart(
                &[("name", "Sea Salt"), ("brand", "Kettle"), ("admin_rating", "4.5")],
                Some(("file", "sea salt.png")),
            ),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let chip: Value = test::read_body_json(resp).await;
    let chip_id = chip["id"].as_str().unwrap().to_string();
    assert_eq!(chip["admin_rating"], 4.5);
    let image_url = chip["image_url"].as_str().unwrap();
    assert!(image_url.starts_with("/static/uploads/chip-images/chips/"));
    assert!(image_url.ends_with("-sea_salt.png"));

    // Fresh chip: no votes, zero strength
    let ranked: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/chips/public").to_request(),
    )
    .await;
    assert_eq!(ranked.as_array().unwrap().len(), 1);
    assert_eq!(ranked[0]["vote_count"], 0);
    assert_eq!(ranked[0]["strength"], 0.0);

    // Voting twice replaces the first score
    for score in [4, 2] {
        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/api/chips/{chip_id}/vote"))
                .insert_header((AUTHORIZATION, format!("Bearer {token}")))
                .set_json(json!({ "score": score }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let stats: Value = test::read_body_json(resp).await;
        assert_eq!(stats["vote_count"], 1);
        assert_eq!(stats["weighted_avg_score"], score as f64);
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/chips/{chip_id}/vote"))
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .set_json(json!({ "score": 9 }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Comments
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/chips/{chip_id}/comments"))
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .set_json(json!({ "content": "   " }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/chips/{chip_id}/comments"))
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .set_json(json!({ "content": "  Very crunchy  " }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let comments: Value = test::read_body_json(resp).await;
    assert_eq!(comments[0]["content"], "Very crunchy");

    let comments: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/chips/{chip_id}/comments"))
            .to_request(),
    )
    .await;
    assert_eq!(comments.as_array().unwrap().len(), 1);

    let ranked: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/chips/public?q=kettle").to_request(),
    )
    .await;
    assert_eq!(ranked[0]["comment_count"], 1);

    // Delete cascades and a second delete is a 404
    for expected in [StatusCode::NO_CONTENT, StatusCode::NOT_FOUND] {
        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/chips/{chip_id}"))
                .insert_header((AUTHORIZATION, format!("Bearer {token}")))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), expected);
    }
    let ranked: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/chips/admin").to_request(),
    )
    .await;
    assert!(ranked.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_writes_on_missing_chip_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir).await;
    let app = app!(state);
    let token = signed_in!(app, "toad@example.com");

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/chips/{}/vote", uuid::Uuid::now_v7()))
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .set_json(json!({ "score": 3 }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/chips/{}/comments", uuid::Uuid::now_v7()))
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .set_json(json!({ "content": "where did it go" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[actix_web::test]
async fn test_upload_requires_name_and_image() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir).await;
    let app = app!(state);
    let token = signed_in!(app, "frog@example.com");

    let resp = test::call_service(
        &app,
        multipart_request("/api/chips", &token, multipart(&[("name", "No Picture")], None))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        multipart_request("/api/chips", &token, multipart(&[], Some(("file", "a.png"))))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_batch_upload_reports_each_entry() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir).await;
    let app = app!(state);
    let token = signed_in!(app, "frog@example.com");

    // Entry 1 is complete, entry 3 has no image.
    let mut body = Vec::new();
    for (name, value) in [("name.1", "Salt & Vinegar"), ("name.3", "Ghost Chip")] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file.1\"; filename=\"sv.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(PNG_MAGIC);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let report: Value = test::call_and_read_body_json(
        &app,
        multipart_request("/api/chips/batch", &token, body).to_request(),
    )
    .await;
    assert_eq!(report["created"].as_array().unwrap().len(), 1);
    assert_eq!(report["failed"].as_array().unwrap().len(), 1);
    assert_eq!(report["failed"][0]["index"], 3);
    assert_eq!(report["failed"][0]["name"], "Ghost Chip");
}

#[actix_web::test]
async fn test_session_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let state = app_state(&dir).await;
    let app = app!(state);
    let token = signed_in!(app, "frog@example.com");

    let session: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/session")
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .to_request(),
    )
    .await;
    assert_eq!(session["email"], "frog@example.com");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({ "email": "frog@example.com", "password": "hunter22" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/signout")
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/session")
            .insert_header((AUTHORIZATION, format!("Bearer {token}")))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
