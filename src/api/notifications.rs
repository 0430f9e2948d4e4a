//! In-app notification endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::notification::{
        BroadcastNotification, NotificationDayGroup, NotificationQuery, SystemNotification,
        UnreadCount,
    },
    AppState,
};

use super::AuthenticatedUser;

#[derive(Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// Notifications that were unread before the call
    pub marked: u64,
}

/// Notifications visible to the caller, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "Notifications", body = Vec<SystemNotification>)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<SystemNotification>>> {
    let notifications = state.services.notifications.list(claims.user_id, &query).await?;
    Ok(Json(notifications))
}

/// Notifications grouped by local calendar day
#[utoipa::path(
    get,
    path = "/notifications/grouped",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "Day groups, newest first", body = Vec<NotificationDayGroup>)
    )
)]
pub async fn grouped_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<NotificationDayGroup>>> {
    let groups = state.services.notifications.grouped(claims.user_id, &query).await?;
    Ok(Json(groups))
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unread notifications", body = UnreadCount)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UnreadCount>> {
    let unread = state.services.notifications.unread_count(claims.user_id).await?;
    Ok(Json(UnreadCount { unread }))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.notifications.mark_read(id, claims.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All notifications marked as read", body = MarkAllReadResponse)
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MarkAllReadResponse>> {
    let marked = state.services.notifications.mark_all_read(claims.user_id).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}

/// Send a notification to every user
#[utoipa::path(
    post,
    path = "/notifications/broadcast",
    tag = "notifications",
    security(("bearer_auth" = [])),
    request_body = BroadcastNotification,
    responses(
        (status = 201, description = "Broadcast stored", body = SystemNotification),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn broadcast(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BroadcastNotification>,
) -> AppResult<(StatusCode, Json<SystemNotification>)> {
    claims.require_admin()?;
    request.validate()?;

    let notification = state.services.notifications.broadcast(&request).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}
