//! Settings endpoints

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::settings::{SettingsResponse, UpdateSettingsRequest},
    AppState,
};

use super::AuthenticatedUser;

/// Get loan policy and category overrides
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current settings", body = SettingsResponse),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SettingsResponse>> {
    claims.require_admin()?;

    let settings = state.services.settings.get_settings().await?;
    Ok(Json(settings))
}

/// Update loan policy and category overrides
#[utoipa::path(
    put,
    path = "/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Settings updated", body = SettingsResponse),
        (status = 400, description = "Invalid values"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> AppResult<Json<SettingsResponse>> {
    claims.require_admin()?;
    request.validate()?;

    let settings = state.services.settings.update_settings(claims.user_id, request).await?;
    Ok(Json(settings))
}
