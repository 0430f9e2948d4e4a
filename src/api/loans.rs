//! Loan request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppResult,
    models::loan_request::{
        CreateLoanRequest, LoanHistoryFilter, LoanHistoryResponse, LoanRequest, LoanRequestQuery,
        OverdueSweepResult, RejectLoanRequest, ReturnLoanRequest,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Request to borrow an item
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan request created", body = LoanRequest),
        (status = 400, description = "Invalid dates"),
        (status = 404, description = "Equipment not found"),
        (status = 422, description = "Equipment unavailable, quota reached or dates overlap")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoanRequest>,
) -> AppResult<(StatusCode, Json<LoanRequest>)> {
    request.validate()?;

    let loan = state.services.loans.create(claims.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// List loan requests; regular users only see their own
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanRequestQuery),
    responses(
        (status = 200, description = "Loan requests", body = PaginatedResponse<LoanRequest>)
    )
)]
pub async fn list_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanRequestQuery>,
) -> AppResult<Json<PaginatedResponse<LoanRequest>>> {
    let (page, per_page) = (query.page, query.per_page);
    let (loans, total) = state.services.loans.list(&claims, query).await?;
    Ok(Json(PaginatedResponse::new(loans, total, page, per_page)))
}

/// Get a loan request
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan request ID")),
    responses(
        (status = 200, description = "Loan request", body = LoanRequest),
        (status = 403, description = "Not the borrower"),
        (status = 404, description = "Loan request not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanRequest>> {
    let loan = state.services.loans.get(&claims, id).await?;
    Ok(Json(loan))
}

/// Approve a pending request
#[utoipa::path(
    post,
    path = "/loans/{id}/approve",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan request ID")),
    responses(
        (status = 200, description = "Request approved", body = LoanRequest),
        (status = 409, description = "Request is not pending"),
        (status = 422, description = "Dates overlap another approved loan")
    )
)]
pub async fn approve_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanRequest>> {
    claims.require_staff()?;

    let loan = state.services.loans.approve(claims.user_id, id).await?;
    Ok(Json(loan))
}

/// Reject a pending request
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan request ID")),
    request_body = RejectLoanRequest,
    responses(
        (status = 200, description = "Request rejected", body = LoanRequest),
        (status = 409, description = "Request is not pending")
    )
)]
pub async fn reject_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RejectLoanRequest>,
) -> AppResult<Json<LoanRequest>> {
    claims.require_staff()?;
    request.validate()?;

    let loan = state.services.loans.reject(claims.user_id, id, &request.reason).await?;
    Ok(Json(loan))
}

/// Hand an approved item over to the borrower
#[utoipa::path(
    post,
    path = "/loans/{id}/pickup",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan request ID")),
    responses(
        (status = 200, description = "Item picked up", body = LoanRequest),
        (status = 409, description = "Request is not approved")
    )
)]
pub async fn pickup_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanRequest>> {
    claims.require_staff()?;

    let loan = state.services.loans.pickup(claims.user_id, id).await?;
    Ok(Json(loan))
}

/// Record the return of a borrowed item
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan request ID")),
    request_body = ReturnLoanRequest,
    responses(
        (status = 200, description = "Item returned", body = LoanRequest),
        (status = 409, description = "Item is not borrowed")
    )
)]
pub async fn return_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ReturnLoanRequest>,
) -> AppResult<Json<LoanRequest>> {
    claims.require_staff()?;
    request.validate()?;

    let loan = state.services.loans.process_return(claims.user_id, id, &request).await?;
    Ok(Json(loan))
}

/// Flag borrowed items past their expected return date
#[utoipa::path(
    post,
    path = "/loans/mark-overdue",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep result", body = OverdueSweepResult),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn mark_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<OverdueSweepResult>> {
    claims.require_admin()?;

    let result = state
        .services
        .loans
        .mark_overdue(Utc::now().date_naive(), Some(claims.user_id))
        .await?;
    Ok(Json(result))
}

/// Loan history with statistics
#[utoipa::path(
    get,
    path = "/loans/history",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanHistoryFilter),
    responses(
        (status = 200, description = "Filtered history", body = LoanHistoryResponse),
        (status = 400, description = "Invalid date range")
    )
)]
pub async fn loan_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(filter): Query<LoanHistoryFilter>,
) -> AppResult<Json<LoanHistoryResponse>> {
    let history = state.services.loans.history(&claims, filter).await?;
    Ok(Json(history))
}
