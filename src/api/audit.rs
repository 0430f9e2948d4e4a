//! Audit trail endpoints (administrators)

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::audit::{AuditLogEntry, AuditQuery, StaffActivity, StaffActivityQuery},
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/audit",
    tag = "audit",
    security(("bearer_auth" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries, newest first", body = PaginatedResponse<AuditLogEntry>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_audit(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<PaginatedResponse<AuditLogEntry>>> {
    claims.require_admin()?;

    let (entries, total) = state.services.audit.list(&query).await?;
    Ok(Json(PaginatedResponse {
        items: entries,
        total,
        page: query.page.unwrap_or(1).max(1),
        per_page: query.per_page.unwrap_or(50).clamp(1, 500),
    }))
}

/// Pickups, returns and decisions recorded per staff member
#[utoipa::path(
    get,
    path = "/audit/staff-activity",
    tag = "audit",
    security(("bearer_auth" = [])),
    params(StaffActivityQuery),
    responses(
        (status = 200, description = "Staff activity", body = PaginatedResponse<StaffActivity>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_staff_activity(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<StaffActivityQuery>,
) -> AppResult<Json<PaginatedResponse<StaffActivity>>> {
    claims.require_admin()?;

    let (entries, total) = state.services.audit.list_staff_activity(&query).await?;
    Ok(Json(PaginatedResponse {
        items: entries,
        total,
        page: query.page.unwrap_or(1).max(1),
        per_page: query.per_page.unwrap_or(50).clamp(1, 500),
    }))
}
