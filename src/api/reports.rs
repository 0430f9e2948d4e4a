//! Reports and CSV exports (staff)

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        loan_request::LoanHistoryFilter,
        report::{DashboardStats, UtilizationQuery, UtilizationReport},
    },
    AppState,
};

use super::AuthenticatedUser;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

fn csv_attachment(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/reports/dashboard",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    claims.require_staff()?;

    let stats = state.services.reports.dashboard().await?;
    Ok(Json(stats))
}

/// Utilization rate and demand class per item
#[utoipa::path(
    get,
    path = "/reports/utilization",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(UtilizationQuery),
    responses(
        (status = 200, description = "Utilization report", body = UtilizationReport),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn utilization(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UtilizationQuery>,
) -> AppResult<Json<UtilizationReport>> {
    claims.require_staff()?;

    let report = state.services.reports.utilization(&query).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/reports/export/loans.csv",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(LoanHistoryFilter),
    responses(
        (status = 200, description = "Loan requests as CSV", content_type = "text/csv", body = String),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn export_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(filter): Query<LoanHistoryFilter>,
) -> AppResult<impl IntoResponse> {
    claims.require_staff()?;

    let csv = state.services.reports.loans_csv(&filter).await?;
    Ok(csv_attachment("loans.csv", csv))
}

#[utoipa::path(
    get,
    path = "/reports/export/equipment.csv",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Equipment catalog as CSV", content_type = "text/csv", body = String),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn export_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    claims.require_staff()?;

    let csv = state.services.reports.equipment_csv().await?;
    Ok(csv_attachment("equipment.csv", csv))
}

#[utoipa::path(
    get,
    path = "/reports/export/utilization.csv",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(UtilizationQuery),
    responses(
        (status = 200, description = "Utilization report as CSV", content_type = "text/csv", body = String),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn export_utilization(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UtilizationQuery>,
) -> AppResult<impl IntoResponse> {
    claims.require_staff()?;

    let csv = state.services.reports.utilization_csv(&query).await?;
    Ok(csv_attachment("utilization.csv", csv))
}
