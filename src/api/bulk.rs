//! Bulk operations over equipment and loan requests

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::bulk::{BulkIds, BulkImportRequest, BulkRejectRequest, BulkResult, BulkStatusRequest},
    AppState,
};

use super::AuthenticatedUser;

/// Set the status of several items
#[utoipa::path(
    post,
    path = "/bulk/equipment/status",
    tag = "bulk",
    security(("bearer_auth" = [])),
    request_body = BulkStatusRequest,
    responses(
        (status = 200, description = "Per-item outcome", body = BulkResult),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn equipment_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BulkStatusRequest>,
) -> AppResult<Json<BulkResult>> {
    claims.require_staff()?;
    request.validate()?;

    let result = state
        .services
        .bulk
        .set_equipment_status(claims.user_id, &request.ids, request.status)
        .await?;
    Ok(Json(result))
}

/// Delete several items; items with active loans are reported as failed
#[utoipa::path(
    post,
    path = "/bulk/equipment/delete",
    tag = "bulk",
    security(("bearer_auth" = [])),
    request_body = BulkIds,
    responses(
        (status = 200, description = "Per-item outcome", body = BulkResult),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn delete_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BulkIds>,
) -> AppResult<Json<BulkResult>> {
    claims.require_admin()?;
    request.validate()?;

    let result = state.services.bulk.delete_equipment(claims.user_id, &request.ids).await?;
    Ok(Json(result))
}

/// Import equipment records; failed records are identified by their position
#[utoipa::path(
    post,
    path = "/bulk/equipment/import",
    tag = "bulk",
    security(("bearer_auth" = [])),
    request_body = BulkImportRequest,
    responses(
        (status = 200, description = "Created ids and failed positions", body = BulkResult),
        (status = 400, description = "Invalid record"),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn import_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BulkImportRequest>,
) -> AppResult<Json<BulkResult>> {
    claims.require_staff()?;
    request.validate()?;

    let result = state.services.bulk.import_equipment(claims.user_id, &request).await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/bulk/loans/approve",
    tag = "bulk",
    security(("bearer_auth" = [])),
    request_body = BulkIds,
    responses(
        (status = 200, description = "Per-request outcome", body = BulkResult),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn approve_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BulkIds>,
) -> AppResult<Json<BulkResult>> {
    claims.require_staff()?;
    request.validate()?;

    let result = state.services.bulk.approve_loans(claims.user_id, &request.ids).await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/bulk/loans/reject",
    tag = "bulk",
    security(("bearer_auth" = [])),
    request_body = BulkRejectRequest,
    responses(
        (status = 200, description = "Per-request outcome", body = BulkResult),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn reject_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BulkRejectRequest>,
) -> AppResult<Json<BulkResult>> {
    claims.require_staff()?;
    request.validate()?;

    let result = state
        .services
        .bulk
        .reject_loans(claims.user_id, &request.ids, &request.reason)
        .await?;
    Ok(Json(result))
}
