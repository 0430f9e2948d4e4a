//! In-app notifications, mirrored by email when the mailer is enabled

use chrono::{FixedOffset, Offset, Utc};

use super::email::EmailService;
use crate::{
    error::AppResult,
    models::{
        enums::NotificationKind,
        notification::{
            group_by_day, BroadcastNotification, NewNotification, NotificationDayGroup,
            NotificationQuery, SystemNotification,
        },
    },
    repository::Repository,
};

/// Upper bound on notifications returned in one listing
const MAX_LIST: i64 = 200;

/// Recipient of a personal notification
pub struct Recipient<'a> {
    pub user_id: i32,
    pub email: &'a str,
}

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
    email: EmailService,
    offset: FixedOffset,
}

impl NotificationsService {
    pub fn new(repository: Repository, email: EmailService, utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| {
            tracing::warn!(utc_offset_hours, "Invalid UTC offset, falling back to UTC");
            Utc.fix()
        });
        Self {
            repository,
            email,
            offset,
        }
    }

    /// Store a notification for one user and email it.
    /// Failures are logged, the triggering operation always goes through.
    pub async fn notify(
        &self,
        recipient: Recipient<'_>,
        kind: NotificationKind,
        title: &str,
        message: &str,
    ) {
        let notification = NewNotification {
            user_id: Some(recipient.user_id),
            kind,
            title: title.to_string(),
            message: message.to_string(),
        };
        if let Err(e) = self.repository.notifications.insert(&notification).await {
            tracing::warn!(user_id = recipient.user_id, %kind, "Failed to store notification: {}", e);
        }
        if let Err(e) = self.email.send_notification(recipient.email, title, message).await {
            tracing::warn!(user_id = recipient.user_id, %kind, "Failed to email notification: {}", e);
        }
    }

    pub async fn broadcast(&self, data: &BroadcastNotification) -> AppResult<SystemNotification> {
        let notification = NewNotification {
            user_id: None,
            kind: data.kind.unwrap_or(NotificationKind::Info),
            title: data.title.trim().to_string(),
            message: data.message.trim().to_string(),
        };
        let stored = self.repository.notifications.insert(&notification).await?;
        tracing::info!(id = stored.id, "Broadcast notification sent");
        Ok(stored)
    }

    pub async fn list(&self, user_id: i32, query: &NotificationQuery) -> AppResult<Vec<SystemNotification>> {
        let limit = query.limit.unwrap_or(50).clamp(1, MAX_LIST);
        self.repository
            .notifications
            .list_for_user(user_id, query.unread_only.unwrap_or(false), limit)
            .await
    }

    /// Notifications grouped by local calendar day, newest first
    pub async fn grouped(&self, user_id: i32, query: &NotificationQuery) -> AppResult<Vec<NotificationDayGroup>> {
        let notifications = self.list(user_id, query).await?;
        Ok(group_by_day(notifications, self.offset, Utc::now()))
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<i64> {
        self.repository.notifications.unread_count(user_id).await
    }

    pub async fn mark_read(&self, id: i32, user_id: i32) -> AppResult<()> {
        self.repository.notifications.mark_read(id, user_id).await
    }

    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        self.repository.notifications.mark_all_read(user_id).await
    }
}

