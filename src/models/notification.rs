//! System notifications

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::NotificationKind;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SystemNotification {
    pub id: i32,
    /// Recipient, absent for broadcasts
    pub user_id: Option<i32>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification to be stored
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Option<i32>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

/// Broadcast request (admin)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BroadcastNotification {
    pub kind: Option<NotificationKind>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

/// Notifications of one local calendar day
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationDayGroup {
    pub date: NaiveDate,
    /// "today", "yesterday" or the ISO date
    pub label: String,
    pub notifications: Vec<SystemNotification>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread: i64,
}

/// Group notifications by the calendar day they were created on, in the
/// given offset. Groups and their members are ordered newest first.
pub fn group_by_day(
    mut notifications: Vec<SystemNotification>,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Vec<NotificationDayGroup> {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let today = now.with_timezone(&offset).date_naive();
    let yesterday = today - Duration::days(1);

    let mut groups: IndexMap<NaiveDate, Vec<SystemNotification>> = IndexMap::new();
    for n in notifications {
        let day = n.created_at.with_timezone(&offset).date_naive();
        groups.entry(day).or_default().push(n);
    }

    groups
        .into_iter()
        .map(|(date, notifications)| {
            let label = if date == today {
                "today".to_string()
            } else if date == yesterday {
                "yesterday".to_string()
            } else {
                date.format("%Y-%m-%d").to_string()
            };
            NotificationDayGroup {
                date,
                label,
                notifications,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn n(id: i32, at: DateTime<Utc>) -> SystemNotification {
        SystemNotification {
            id,
            user_id: Some(1),
            kind: NotificationKind::Info,
            title: format!("n{}", id),
            message: String::new(),
            is_read: false,
            created_at: at,
        }
    }

    fn bangkok() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    #[test]
    fn test_empty() {
        assert!(group_by_day(Vec::new(), bangkok(), Utc::now()).is_empty());
    }

    #[test]
    fn test_groups_by_local_day_newest_first() {
        // 2024-06-10 12:00 local
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 5, 0, 0).unwrap();
        let items = vec![
            // 2024-06-09 23:30 local
            n(1, Utc.with_ymd_and_hms(2024, 6, 9, 16, 30, 0).unwrap()),
            // 2024-06-10 00:30 local, still the 9th in UTC
            n(2, Utc.with_ymd_and_hms(2024, 6, 9, 17, 30, 0).unwrap()),
            // 2024-06-10 11:00 local
            n(3, Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).unwrap()),
            // 2024-06-01 local
            n(4, Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap()),
        ];

        let groups = group_by_day(items, bangkok(), now);
        assert_eq!(groups.len(), 3);

        assert_eq!(groups[0].label, "today");
        let ids: Vec<i32> = groups[0].notifications.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 2]);

        assert_eq!(groups[1].label, "yesterday");
        assert_eq!(groups[1].notifications[0].id, 1);

        assert_eq!(groups[2].label, "2024-06-01");
        assert_eq!(groups[2].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_every_notification_lands_in_exactly_one_group() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let items: Vec<_> = (0..50)
            .map(|i| n(i, base + Duration::hours(i as i64 * 7)))
            .collect();
        let groups = group_by_day(items, bangkok(), base + Duration::days(30));
        let total: usize = groups.iter().map(|g| g.notifications.len()).sum();
        assert_eq!(total, 50);
        for pair in groups.windows(2) {
            assert!(pair[0].date > pair[1].date);
        }
    }
}
