//! API handlers for the equipment lending REST endpoints

pub mod audit;
pub mod auth;
pub mod bulk;
pub mod equipment;
pub mod health;
pub mod loans;
pub mod notifications;
pub mod openapi;
pub mod reports;
pub mod reservations;
pub mod saved_searches;
pub mod settings;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = state.services.users.authorize(token.trim()).await?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// List of items
    pub items: Vec<T>,
    /// Total number of items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            items,
            total,
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, 500),
        }
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/password", put(auth::change_password))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/approval", put(users::update_approval))
        .route("/users/:id/role", put(users::update_role))
        // Equipment
        .route(
            "/equipment",
            get(equipment::list_equipment).post(equipment::create_equipment),
        )
        .route("/equipment/categories", get(equipment::list_categories))
        .route("/equipment/qr/:payload", get(equipment::lookup_by_qr))
        .route(
            "/equipment/:id",
            get(equipment::get_equipment)
                .put(equipment::update_equipment)
                .delete(equipment::delete_equipment),
        )
        .route(
            "/equipment/:id/qr",
            get(equipment::get_qr).post(equipment::regenerate_qr),
        )
        .route("/equipment/:id/loans", get(equipment::equipment_loans))
        .route("/equipment/:id/availability", get(equipment::availability))
        // Loan requests
        .route(
            "/loans",
            get(loans::list_loans).post(loans::create_loan),
        )
        .route("/loans/history", get(loans::loan_history))
        .route("/loans/mark-overdue", post(loans::mark_overdue))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/approve", post(loans::approve_loan))
        .route("/loans/:id/reject", post(loans::reject_loan))
        .route("/loans/:id/pickup", post(loans::pickup_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        // Reservations
        .route(
            "/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/reservations/:id", get(reservations::get_reservation))
        .route("/reservations/:id/approve", post(reservations::approve_reservation))
        .route("/reservations/:id/reject", post(reservations::reject_reservation))
        .route("/reservations/:id/cancel", post(reservations::cancel_reservation))
        .route("/reservations/:id/complete", post(reservations::complete_reservation))
        // Saved searches
        .route(
            "/saved-searches",
            get(saved_searches::list_saved_searches).post(saved_searches::create_saved_search),
        )
        .route("/saved-searches/:id", delete(saved_searches::delete_saved_search))
        .route("/saved-searches/:id/run", get(saved_searches::run_saved_search))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/grouped", get(notifications::grouped_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/broadcast", post(notifications::broadcast))
        .route("/notifications/:id/read", post(notifications::mark_read))
        // Audit
        .route("/audit", get(audit::list_audit))
        .route("/audit/staff-activity", get(audit::list_staff_activity))
        // Reports
        .route("/reports/dashboard", get(reports::dashboard))
        .route("/reports/utilization", get(reports::utilization))
        .route("/reports/export/loans.csv", get(reports::export_loans))
        .route("/reports/export/equipment.csv", get(reports::export_equipment))
        .route("/reports/export/utilization.csv", get(reports::export_utilization))
        // Bulk operations
        .route("/bulk/equipment/status", post(bulk::equipment_status))
        .route("/bulk/equipment/delete", post(bulk::delete_equipment))
        .route("/bulk/equipment/import", post(bulk::import_equipment))
        .route("/bulk/loans/approve", post(bulk::approve_loans))
        .route("/bulk/loans/reject", post(bulk::reject_loans))
        // Settings
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
