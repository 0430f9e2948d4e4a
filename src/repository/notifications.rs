//! Notifications repository
//!
//! Personal notifications carry their own `is_read` flag. Broadcasts
//! (`user_id IS NULL`) are shared rows whose read state lives in
//! `notification_reads`, one row per reader.

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::notification::{NewNotification, SystemNotification},
};

/// Notifications visible to `$1`, with the read flag resolved for that user
const VISIBLE_TO_USER: &str = r#"
    SELECT n.id, n.user_id, n.kind, n.title, n.message,
           CASE WHEN n.user_id IS NULL
                THEN EXISTS(SELECT 1 FROM notification_reads r
                            WHERE r.notification_id = n.id AND r.user_id = $1)
                ELSE n.is_read
           END AS is_read,
           n.created_at
    FROM notifications n
    WHERE n.user_id = $1 OR n.user_id IS NULL
"#;

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Notifications of a user, newest first
    pub async fn list_for_user(
        &self,
        user_id: i32,
        unread_only: bool,
        limit: i64,
    ) -> AppResult<Vec<SystemNotification>> {
        let q = format!(
            r#"
            SELECT * FROM ({}) v
            WHERE ($2 = FALSE OR v.is_read = FALSE)
            ORDER BY v.created_at DESC, v.id DESC
            LIMIT $3
            "#,
            VISIBLE_TO_USER
        );
        let rows = sqlx::query_as::<_, SystemNotification>(&q)
            .bind(user_id)
            .bind(unread_only)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<i64> {
        let q = format!("SELECT COUNT(*) FROM ({}) v WHERE v.is_read = FALSE", VISIBLE_TO_USER);
        let count: i64 = sqlx::query_scalar(&q)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn insert(&self, notification: &NewNotification) -> AppResult<SystemNotification> {
        let row = sqlx::query_as::<_, SystemNotification>(
            r#"
            INSERT INTO notifications (user_id, kind, title, message)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Mark one notification read for `user_id`
    pub async fn mark_read(&self, id: i32, user_id: i32) -> AppResult<()> {
        let owner: Option<Option<i32>> =
            sqlx::query_scalar("SELECT user_id FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match owner {
            Some(Some(owner)) if owner == user_id => {
                sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            Some(None) => {
                sqlx::query(
                    r#"
                    INSERT INTO notification_reads (notification_id, user_id)
                    VALUES ($1, $2)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            }
            _ => return Err(AppError::NotFound(format!("Notification {} not found", id))),
        }
        Ok(())
    }

    /// Mark everything visible to `user_id` read, returns how many changed
    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let personal = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let broadcasts = sqlx::query(
            r#"
            INSERT INTO notification_reads (notification_id, user_id)
            SELECT n.id, $1 FROM notifications n
            WHERE n.user_id IS NULL
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;
        Ok(personal + broadcasts)
    }
}
