//! Reservation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::reservation::{CreateReservation, RejectReservation, Reservation, ReservationQuery},
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Reserve an item for a time window
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = CreateReservation,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 400, description = "Invalid window"),
        (status = 409, description = "Window already reserved"),
        (status = 422, description = "Equipment retired")
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    request.validate()?;

    let reservation = state.services.reservations.create(claims.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// List reservations; regular users only see their own
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationQuery),
    responses(
        (status = 200, description = "Reservations", body = PaginatedResponse<Reservation>)
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ReservationQuery>,
) -> AppResult<Json<PaginatedResponse<Reservation>>> {
    let (page, per_page) = (query.page, query.per_page);
    let (reservations, total) = state.services.reservations.list(&claims, query).await?;
    Ok(Json(PaginatedResponse::new(reservations, total, page, per_page)))
}

#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation", body = Reservation),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.services.reservations.get(&claims, id).await?;
    Ok(Json(reservation))
}

#[utoipa::path(
    post,
    path = "/reservations/{id}/approve",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation approved", body = Reservation),
        (status = 409, description = "Reservation is not pending")
    )
)]
pub async fn approve_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    claims.require_staff()?;

    let reservation = state.services.reservations.approve(claims.user_id, id).await?;
    Ok(Json(reservation))
}

#[utoipa::path(
    post,
    path = "/reservations/{id}/reject",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    request_body = RejectReservation,
    responses(
        (status = 200, description = "Reservation rejected", body = Reservation),
        (status = 409, description = "Reservation is not pending")
    )
)]
pub async fn reject_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RejectReservation>,
) -> AppResult<Json<Reservation>> {
    claims.require_staff()?;
    request.validate()?;

    let reservation = state
        .services
        .reservations
        .reject(claims.user_id, id, &request.reason)
        .await?;
    Ok(Json(reservation))
}

/// Cancel a reservation (owner or staff)
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = Reservation),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Reservation already closed")
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.services.reservations.cancel(&claims, id).await?;
    Ok(Json(reservation))
}

#[utoipa::path(
    post,
    path = "/reservations/{id}/complete",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation completed", body = Reservation),
        (status = 409, description = "Reservation is not approved")
    )
)]
pub async fn complete_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    claims.require_staff()?;

    let reservation = state.services.reservations.complete(claims.user_id, id).await?;
    Ok(Json(reservation))
}
