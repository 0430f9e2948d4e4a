//! Equipment catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{
            parse_qr_payload, CategoryCount, CreateEquipment, Equipment, EquipmentQr,
            EquipmentSearchCriteria, UpdateEquipment,
        },
        loan_request::LoanRequest,
        reservation::{AvailabilityQuery, AvailabilityResponse},
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Search equipment
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(EquipmentSearchCriteria),
    responses(
        (status = 200, description = "Matching equipment", body = PaginatedResponse<Equipment>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(criteria): Query<EquipmentSearchCriteria>,
) -> AppResult<Json<PaginatedResponse<Equipment>>> {
    let (items, total) = state.services.equipment.search(&criteria).await?;
    Ok(Json(PaginatedResponse {
        items,
        total,
        page: criteria.page(),
        per_page: criteria.per_page(),
    }))
}

/// Get equipment details
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = Equipment),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Equipment>> {
    let equipment = state.services.equipment.get(id).await?;
    Ok(Json(equipment))
}

/// Add equipment to the catalog
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment created", body = Equipment),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Staff privileges required"),
        (status = 409, description = "Serial number already exists")
    )
)]
pub async fn create_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<Equipment>)> {
    claims.require_staff()?;
    request.validate()?;

    let equipment = state.services.equipment.create(claims.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Update equipment
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Equipment updated", body = Equipment),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Serial number already exists")
    )
)]
pub async fn update_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateEquipment>,
) -> AppResult<Json<Equipment>> {
    claims.require_staff()?;
    request.validate()?;

    let equipment = state.services.equipment.update(claims.user_id, id, &request).await?;
    Ok(Json(equipment))
}

/// Delete equipment
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 204, description = "Equipment deleted"),
        (status = 403, description = "Administrator privileges required"),
        (status = 404, description = "Equipment not found"),
        (status = 422, description = "Equipment has active loans or a loan history")
    )
)]
pub async fn delete_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.equipment.delete(claims.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Categories with item counts
#[utoipa::path(
    get,
    path = "/equipment/categories",
    tag = "equipment",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Categories", body = Vec<CategoryCount>)
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<CategoryCount>>> {
    let categories = state.services.equipment.categories().await?;
    Ok(Json(categories))
}

/// QR payload of an item
#[utoipa::path(
    get,
    path = "/equipment/{id}/qr",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "QR payload", body = EquipmentQr),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_qr(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentQr>> {
    let qr = state.services.equipment.qr(id).await?;
    Ok(Json(qr))
}

/// Issue a new QR token; previously printed codes stop resolving
#[utoipa::path(
    post,
    path = "/equipment/{id}/qr",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "New QR payload", body = EquipmentQr),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn regenerate_qr(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentQr>> {
    claims.require_staff()?;

    let qr = state.services.equipment.regenerate_qr(claims.user_id, id).await?;
    Ok(Json(qr))
}

/// Resolve a scanned QR payload (or bare token) to its equipment
#[utoipa::path(
    get,
    path = "/equipment/qr/{payload}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("payload" = String, Path, description = "QR token or full payload")),
    responses(
        (status = 200, description = "Equipment", body = Equipment),
        (status = 400, description = "Malformed QR payload"),
        (status = 404, description = "Unknown QR code")
    )
)]
pub async fn lookup_by_qr(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(payload): Path<String>,
) -> AppResult<Json<Equipment>> {
    let token = parse_qr_payload(&payload)
        .ok_or_else(|| AppError::BadRequest("Malformed QR payload".to_string()))?;
    let equipment = state.services.equipment.lookup_by_qr(token).await?;
    Ok(Json(equipment))
}

/// Loan history of an item
#[utoipa::path(
    get,
    path = "/equipment/{id}/loans",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Loan requests for the item", body = Vec<LoanRequest>),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn equipment_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LoanRequest>>> {
    claims.require_staff()?;

    let loans = state.services.equipment.loan_history(id).await?;
    Ok(Json(loans))
}

/// Whether a window is free for reservation
#[utoipa::path(
    get,
    path = "/equipment/{id}/availability",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID"), AvailabilityQuery),
    responses(
        (status = 200, description = "Availability", body = AvailabilityResponse),
        (status = 400, description = "Invalid window")
    )
)]
pub async fn availability(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let response = state
        .services
        .reservations
        .availability(id, query.start_time, query.end_time)
        .await?;
    Ok(Json(response))
}
