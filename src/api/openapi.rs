//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    audit, auth, bulk, equipment, health, loans, notifications, reports, reservations,
    saved_searches, settings, users,
};
use crate::models;

/// Registers the JWT bearer scheme referenced by `security(("bearer_auth" = []))`
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "EquipLend API",
        version = "1.0.0",
        description = "Equipment lending and tracking REST API",
        license(name = "MIT")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&SecurityAddon),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        auth::update_profile,
        auth::change_password,
        // Users
        users::list_users,
        users::get_user,
        users::update_approval,
        users::update_role,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        equipment::list_categories,
        equipment::get_qr,
        equipment::regenerate_qr,
        equipment::lookup_by_qr,
        equipment::equipment_loans,
        equipment::availability,
        // Loans
        loans::create_loan,
        loans::list_loans,
        loans::get_loan,
        loans::approve_loan,
        loans::reject_loan,
        loans::pickup_loan,
        loans::return_loan,
        loans::mark_overdue,
        loans::loan_history,
        // Reservations
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::approve_reservation,
        reservations::reject_reservation,
        reservations::cancel_reservation,
        reservations::complete_reservation,
        // Saved searches
        saved_searches::list_saved_searches,
        saved_searches::create_saved_search,
        saved_searches::delete_saved_search,
        saved_searches::run_saved_search,
        // Notifications
        notifications::list_notifications,
        notifications::grouped_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::broadcast,
        // Audit
        audit::list_audit,
        audit::list_staff_activity,
        // Reports
        reports::dashboard,
        reports::utilization,
        reports::export_loans,
        reports::export_equipment,
        reports::export_utilization,
        // Bulk
        bulk::equipment_status,
        bulk::delete_equipment,
        bulk::import_equipment,
        bulk::approve_loans,
        bulk::reject_loans,
        // Settings
        settings::get_settings,
        settings::update_settings,
    ),
    components(
        schemas(
            // Enums
            models::enums::EquipmentStatus,
            models::enums::LoanStatus,
            models::enums::ReturnCondition,
            models::enums::ReservationStatus,
            models::enums::UserRole,
            models::enums::ApprovalStatus,
            models::enums::StaffAction,
            models::enums::NotificationKind,
            models::enums::UtilizationClass,
            // Auth and users
            auth::LoginRequest,
            auth::LoginResponse,
            models::user::User,
            models::user::UserShort,
            models::user::RegisterUser,
            models::user::UpdateProfile,
            models::user::ChangePassword,
            models::user::UpdateRole,
            models::user::UpdateApproval,
            // Equipment
            models::equipment::Equipment,
            models::equipment::CreateEquipment,
            models::equipment::UpdateEquipment,
            models::equipment::EquipmentSearchCriteria,
            models::equipment::CategoryCount,
            models::equipment::EquipmentQr,
            // Loans
            models::loan_request::LoanRequest,
            models::loan_request::CreateLoanRequest,
            models::loan_request::RejectLoanRequest,
            models::loan_request::ReturnLoanRequest,
            models::loan_request::LoanHistoryStats,
            models::loan_request::LoanHistoryResponse,
            models::loan_request::OverdueSweepResult,
            // Reservations
            models::reservation::Reservation,
            models::reservation::CreateReservation,
            models::reservation::RejectReservation,
            models::reservation::AvailabilityResponse,
            // Saved searches
            models::saved_search::SavedSearch,
            models::saved_search::CreateSavedSearch,
            // Notifications
            models::notification::SystemNotification,
            models::notification::BroadcastNotification,
            models::notification::NotificationDayGroup,
            models::notification::UnreadCount,
            notifications::MarkAllReadResponse,
            // Audit
            models::audit::AuditLogEntry,
            models::audit::StaffActivity,
            // Reports
            models::report::UtilizationEntry,
            models::report::UtilizationReport,
            models::report::StatEntry,
            models::report::TopEquipment,
            models::report::DashboardStats,
            // Bulk
            models::bulk::BulkIds,
            models::bulk::BulkStatusRequest,
            models::bulk::BulkRejectRequest,
            models::bulk::BulkImportRequest,
            models::bulk::BulkFailure,
            models::bulk::BulkResult,
            // Settings
            models::settings::LoanPolicy,
            models::settings::CategoryPolicy,
            models::settings::SettingsResponse,
            models::settings::UpdateSettingsRequest,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and own profile"),
        (name = "users", description = "Account administration"),
        (name = "equipment", description = "Equipment catalog and QR codes"),
        (name = "loans", description = "Loan request lifecycle"),
        (name = "reservations", description = "Time-boxed equipment reservations"),
        (name = "saved_searches", description = "Saved equipment searches"),
        (name = "notifications", description = "In-app notifications"),
        (name = "audit", description = "Audit trail and staff activity"),
        (name = "reports", description = "Dashboard, utilization and CSV exports"),
        (name = "bulk", description = "Bulk operations"),
        (name = "settings", description = "Loan policies")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.as_ref().map(|c| c.security_schemes.len());
        assert_eq!(components, Some(1));
        assert!(doc.paths.paths.contains_key("/loans/{id}/approve"));
        assert!(doc.paths.paths.contains_key("/equipment/qr/{payload}"));
    }
}
