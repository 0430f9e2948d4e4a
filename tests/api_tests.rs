//! API integration tests
//!
//! Requests refused before any query run against a pool that never connects.
//! The `#[sqlx::test]` tests get a freshly migrated database each, and the
//! tests marked `#[ignore]` need a running server with a seeded database.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use common::{
    body_json, build_offline_app, build_test_app, create_equipment, create_user, get, post_json,
    token, token_for,
};
use equiplend_server::{
    config::AppConfig,
    models::enums::{ApprovalStatus, UserRole},
};

#[tokio::test]
async fn test_health_check() {
    let app = build_offline_app();

    let response = app.oneshot(get("/api/v1/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = build_offline_app();

    let response = app.oneshot(get("/api/v1/equipment", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Missing authorization header");
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = build_offline_app();

    let response = app
        .oneshot(get("/api/v1/auth/me", Some("not-a-jwt")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let app = build_offline_app();
    let token = token_for("some-other-secret", 1, UserRole::Admin);

    let response = app
        .oneshot(get("/api/v1/audit", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_invalid_payload() {
    let app = build_offline_app();

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/register",
            None,
            json!({
                "email": "not-an-email",
                "password": "short",
                "display_name": "Test"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = build_offline_app();

    let response = app
        .oneshot(get("/api-docs/openapi.json", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["info"]["title"], "EquipLend API");
    assert!(body["paths"]["/loans/{id}/return"].is_object());
    assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
}

// ---------------------------------------------------------------------------
// Access control against the account row
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_user_cannot_read_audit_log(pool: PgPool) {
    let services = common::services(pool.clone());
    let user = create_user(&services, "reader", UserRole::User, ApprovalStatus::Approved).await;
    let app = build_test_app(pool);

    let response = app
        .oneshot(get("/api/v1/audit", Some(&token(&user))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_user_cannot_approve_loans(pool: PgPool) {
    let services = common::services(pool.clone());
    let user = create_user(&services, "borrower", UserRole::User, ApprovalStatus::Approved).await;
    let app = build_test_app(pool);

    let response = app
        .oneshot(post_json("/api/v1/loans/1/approve", Some(&token(&user)), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_staff_cannot_broadcast(pool: PgPool) {
    let services = common::services(pool.clone());
    let staff = create_user(&services, "desk", UserRole::Staff, ApprovalStatus::Approved).await;
    let app = build_test_app(pool);

    let response = app
        .oneshot(post_json(
            "/api/v1/notifications/broadcast",
            Some(&token(&staff)),
            json!({ "title": "Closed", "message": "Closed on Friday" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_malformed_qr_payload(pool: PgPool) {
    let services = common::services(pool.clone());
    let user = create_user(&services, "scanner", UserRole::User, ApprovalStatus::Approved).await;
    let app = build_test_app(pool);

    let response = app
        .oneshot(get("/api/v1/equipment/qr/not-a-token", Some(&token(&user))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_suspended_account_loses_access_with_live_token(pool: PgPool) {
    let services = common::services(pool.clone());
    let user = create_user(&services, "suspended", UserRole::User, ApprovalStatus::Approved).await;
    let item = create_equipment(&services, "CAM-001").await;
    let token = token(&user);

    services
        .repository
        .users
        .update_approval(user.id, ApprovalStatus::Suspended)
        .await
        .unwrap();

    let today = Utc::now().date_naive();
    let response = build_test_app(pool.clone())
        .oneshot(post_json(
            "/api/v1/loans",
            Some(&token),
            json!({
                "equipment_id": item.id,
                "borrow_date": today.to_string(),
                "expected_return_date": (today + Duration::days(1)).to_string()
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Account is suspended");

    let loans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loan_requests")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(loans, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_demoted_admin_keeps_only_user_rights(pool: PgPool) {
    let services = common::services(pool.clone());
    let admin = create_user(&services, "former-admin", UserRole::Admin, ApprovalStatus::Approved).await;
    let token = token(&admin);

    let before = build_test_app(pool.clone())
        .oneshot(get("/api/v1/audit", Some(&token)))
        .await
        .unwrap();
    assert_eq!(before.status(), StatusCode::OK);

    services.repository.users.update_role(admin.id, UserRole::User).await.unwrap();

    let after = build_test_app(pool.clone())
        .oneshot(get("/api/v1/audit", Some(&token)))
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::FORBIDDEN);

    let me = build_test_app(pool)
        .oneshot(get("/api/v1/auth/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_token_of_deleted_account_is_rejected(pool: PgPool) {
    let token = token_for(&AppConfig::default().auth.jwt_secret, 4242, UserRole::Admin);

    let response = build_test_app(pool)
        .oneshot(get("/api/v1/audit", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_overlapping_reservation_returns_conflict(pool: PgPool) {
    let services = common::services(pool.clone());
    let user = create_user(&services, "booker", UserRole::User, ApprovalStatus::Approved).await;
    let item = create_equipment(&services, "CAM-002").await;
    let token = token(&user);
    let start = Utc::now() + Duration::hours(2);

    let first = build_test_app(pool.clone())
        .oneshot(post_json(
            "/api/v1/reservations",
            Some(&token),
            json!({
                "equipment_id": item.id,
                "start_time": start,
                "end_time": start + Duration::hours(3)
            }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = build_test_app(pool)
        .oneshot(post_json(
            "/api/v1/reservations",
            Some(&token),
            json!({
                "equipment_id": item.id,
                "start_time": start + Duration::hours(1),
                "end_time": start + Duration::hours(4)
            }),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = body_json(second).await;
    assert_eq!(body["error"], "Duplicate");
}

// ---------------------------------------------------------------------------
// Live server tests
// ---------------------------------------------------------------------------

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Log in with the account created by `equiplend-admin seed`
async fn admin_token(client: &reqwest::Client) -> String {
    let email = std::env::var("EQUIPLEND_ADMIN_EMAIL").expect("EQUIPLEND_ADMIN_EMAIL not set");
    let password =
        std::env::var("EQUIPLEND_ADMIN_PASSWORD").expect("EQUIPLEND_ADMIN_PASSWORD not set");
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_live_login_and_dashboard() {
    let client = reqwest::Client::new();
    let token = admin_token(&client).await;

    let response = client
        .get(format!("{}/reports/dashboard", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["equipment_total"].is_number());
}

#[tokio::test]
#[ignore]
async fn test_live_equipment_csv_export() {
    let client = reqwest::Client::new();
    let token = admin_token(&client).await;

    let response = client
        .get(format!("{}/reports/export/equipment.csv", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/csv"));
    let text = response.text().await.expect("Failed to read body");
    assert!(text.starts_with('\u{feff}'));
    assert!(text.contains("serial_number"));
}

#[tokio::test]
#[ignore]
async fn test_live_loan_request_lifecycle() {
    let client = reqwest::Client::new();
    let token = admin_token(&client).await;

    let equipment: Value = client
        .get(format!("{}/equipment?status=available&per_page=1", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let equipment_id = equipment["items"][0]["id"].as_i64().expect("No available equipment");

    let today = Utc::now().date_naive();
    let created = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "equipment_id": equipment_id,
            "borrow_date": today.to_string(),
            "expected_return_date": (today + Duration::days(2)).to_string(),
            "purpose": "Integration test"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(created.status().as_u16(), 201);
    let loan: Value = created.json().await.expect("Failed to parse response");
    let id = loan["id"].as_i64().expect("No loan id");

    for step in ["approve", "pickup"] {
        let response = client
            .post(format!("{}/loans/{}/{}", BASE_URL, id, step))
            .bearer_auth(&token)
            .send()
            .await
            .expect("Failed to send request");
        assert!(response.status().is_success(), "{} failed", step);
    }

    let returned: Value = client
        .post(format!("{}/loans/{}/return", BASE_URL, id))
        .bearer_auth(&token)
        .json(&json!({ "condition": "good" }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(returned["status"], "returned");

    // Second approval of the same request loses the race
    let again = client
        .post(format!("{}/loans/{}/approve", BASE_URL, id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(again.status().as_u16(), 409);
}
