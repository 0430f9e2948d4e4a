//! Saved equipment searches of the current user

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        equipment::Equipment,
        saved_search::{CreateSavedSearch, SavedSearch},
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/saved-searches",
    tag = "saved_searches",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Saved searches of the caller", body = Vec<SavedSearch>)
    )
)]
pub async fn list_saved_searches(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<SavedSearch>>> {
    let searches = state.services.saved_searches.list(claims.user_id).await?;
    Ok(Json(searches))
}

#[utoipa::path(
    post,
    path = "/saved-searches",
    tag = "saved_searches",
    security(("bearer_auth" = [])),
    request_body = CreateSavedSearch,
    responses(
        (status = 201, description = "Search saved", body = SavedSearch),
        (status = 409, description = "A search with this name already exists")
    )
)]
pub async fn create_saved_search(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateSavedSearch>,
) -> AppResult<(StatusCode, Json<SavedSearch>)> {
    request.validate()?;

    let search = state.services.saved_searches.create(claims.user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(search)))
}

#[utoipa::path(
    delete,
    path = "/saved-searches/{id}",
    tag = "saved_searches",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Saved search ID")),
    responses(
        (status = 204, description = "Search deleted"),
        (status = 404, description = "Saved search not found")
    )
)]
pub async fn delete_saved_search(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.saved_searches.delete(claims.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run a saved search against the current catalog
#[utoipa::path(
    get,
    path = "/saved-searches/{id}/run",
    tag = "saved_searches",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Saved search ID")),
    responses(
        (status = 200, description = "Matching equipment", body = PaginatedResponse<Equipment>),
        (status = 404, description = "Saved search not found")
    )
)]
pub async fn run_saved_search(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<PaginatedResponse<Equipment>>> {
    let (search, items, total) = state.services.saved_searches.run(claims.user_id, id).await?;
    Ok(Json(PaginatedResponse {
        items,
        total,
        page: search.criteria.page(),
        per_page: search.criteria.per_page(),
    }))
}
