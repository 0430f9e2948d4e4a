//! Shared helpers for the integration test binaries

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};

use equiplend_server::{
    api,
    config::AppConfig,
    models::{
        enums::{ApprovalStatus, UserRole},
        equipment::{CreateEquipment, Equipment},
        user::{RegisterUser, User, UserClaims},
    },
    repository::Repository,
    services::{users::hash_password, Services},
    AppState,
};

pub const PASSWORD: &str = "correct-horse-battery";

pub fn services(pool: PgPool) -> Services {
    Services::new(Repository::new(pool), &AppConfig::default())
}

/// Router over a migrated test database
pub fn build_test_app(pool: PgPool) -> Router {
    let config = AppConfig::default();
    let state = AppState {
        services: Arc::new(Services::new(Repository::new(pool), &config)),
        config: Arc::new(config),
    };
    api::router(state)
}

/// Router over a pool that never connects, for requests refused before any query
pub fn build_offline_app() -> Router {
    let config = AppConfig::default();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("Invalid database URL");
    build_test_app(pool)
}

pub fn token_for(secret: &str, user_id: i32, role: UserRole) -> String {
    let now = Utc::now();
    let claims = UserClaims {
        sub: format!("user{}@example.org", user_id),
        user_id,
        role,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    };
    claims.create_token(secret).expect("Failed to sign token")
}

/// Token signed with the default configuration's secret
pub fn token(user: &User) -> String {
    token_for(&AppConfig::default().auth.jwt_secret, user.id, user.role)
}

pub fn claims(user: &User) -> UserClaims {
    let now = Utc::now().timestamp();
    UserClaims {
        sub: user.email.clone(),
        user_id: user.id,
        role: user.role,
        exp: now + 3600,
        iat: now,
    }
}

/// Insert an account directly, skipping the registration workflow
pub async fn create_user(services: &Services, name: &str, role: UserRole, status: ApprovalStatus) -> User {
    let data = RegisterUser {
        email: format!("{name}@example.org"),
        password: PASSWORD.to_string(),
        display_name: name.to_string(),
        department: None,
        phone: None,
        student_id: None,
    };
    let hash = hash_password(PASSWORD).expect("hashing should succeed");
    services
        .repository
        .users
        .create(&data, &hash, role, status)
        .await
        .expect("user creation should succeed")
}

pub fn equipment_data(serial: &str, category: &str) -> CreateEquipment {
    CreateEquipment {
        name: format!("Item {serial}"),
        category: category.to_string(),
        brand: None,
        model: None,
        serial_number: serial.to_string(),
        status: None,
        location: None,
        description: None,
        image_url: None,
    }
}

pub async fn create_equipment(services: &Services, serial: &str) -> Equipment {
    services
        .repository
        .equipment
        .create(&equipment_data(serial, "camera"))
        .await
        .expect("equipment creation should succeed")
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}
