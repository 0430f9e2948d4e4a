//! Reservations repository

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::paging;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{EquipmentStatus, ReservationStatus},
        reservation::{CreateReservation, Reservation, ReservationQuery},
    },
};

const SELECT_RESERVATION: &str = r#"
    SELECT r.*, e.name AS equipment_name, u.display_name AS user_display_name
    FROM reservations r
    JOIN equipment e ON e.id = r.equipment_id
    JOIN users u ON u.id = r.user_id
"#;

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Reservation> {
        let q = format!("{} WHERE r.id = $1", SELECT_RESERVATION);
        sqlx::query_as::<_, Reservation>(&q)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", id)))
    }

    /// List reservations with filters and pagination
    pub async fn list(&self, query: &ReservationQuery) -> AppResult<(Vec<Reservation>, i64)> {
        let (_, per_page, offset) = paging(query.page, query.per_page, 20);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.equipment_id.is_some() {
            conditions.push(format!("r.equipment_id = ${}", idx));
            idx += 1;
        }
        if query.user_id.is_some() {
            conditions.push(format!("r.user_id = ${}", idx));
            idx += 1;
        }
        if query.status.is_some() {
            conditions.push(format!("r.status = ${}", idx));
            idx += 1;
        }
        if query.from.is_some() {
            conditions.push(format!("r.end_time > ${}", idx));
            idx += 1;
        }
        if query.to.is_some() {
            conditions.push(format!("r.start_time < ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM reservations r {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(v) = query.equipment_id { count_builder = count_builder.bind(v); }
        if let Some(v) = query.user_id { count_builder = count_builder.bind(v); }
        if let Some(v) = query.status { count_builder = count_builder.bind(v); }
        if let Some(v) = query.from { count_builder = count_builder.bind(v); }
        if let Some(v) = query.to { count_builder = count_builder.bind(v); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "{} {} ORDER BY r.start_time, r.id LIMIT {} OFFSET {}",
            SELECT_RESERVATION, where_clause, per_page, offset
        );
        let mut builder = sqlx::query_as::<_, Reservation>(&select_q);
        if let Some(v) = query.equipment_id { builder = builder.bind(v); }
        if let Some(v) = query.user_id { builder = builder.bind(v); }
        if let Some(v) = query.status { builder = builder.bind(v); }
        if let Some(v) = query.from { builder = builder.bind(v); }
        if let Some(v) = query.to { builder = builder.bind(v); }
        let rows = builder.fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    /// Reservations holding part of `[start, end)`
    pub async fn conflicts(
        &self,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Reservation>> {
        let q = format!(
            r#"{} WHERE r.equipment_id = $1 AND r.status = ANY($4)
                  AND r.start_time < $3 AND r.end_time > $2
               ORDER BY r.start_time"#,
            SELECT_RESERVATION
        );
        let rows = sqlx::query_as::<_, Reservation>(&q)
            .bind(equipment_id)
            .bind(start)
            .bind(end)
            .bind(ReservationStatus::texts_where(ReservationStatus::blocks_window))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn has_conflict(
        tx: &mut Transaction<'_, Postgres>,
        equipment_id: i32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE equipment_id = $1 AND status = ANY($4)
                  AND start_time < $3 AND end_time > $2
            )
            "#,
        )
        .bind(equipment_id)
        .bind(start)
        .bind(end)
        .bind(ReservationStatus::texts_where(ReservationStatus::blocks_window))
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    /// Create a reservation, refusing overlapping windows under an equipment row lock
    pub async fn create(&self, user_id: i32, data: &CreateReservation) -> AppResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let status: EquipmentStatus =
            sqlx::query_scalar("SELECT status FROM equipment WHERE id = $1 FOR UPDATE")
                .bind(data.equipment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", data.equipment_id)))?;

        if status == EquipmentStatus::Retired {
            return Err(AppError::BusinessRule(
                "Retired equipment cannot be reserved".to_string(),
            ));
        }

        if Self::has_conflict(&mut tx, data.equipment_id, data.start_time, data.end_time).await? {
            return Err(AppError::Conflict(
                "Equipment is already reserved during this window".to_string(),
            ));
        }

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO reservations (equipment_id, user_id, start_time, end_time, purpose, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING id
            "#,
        )
        .bind(data.equipment_id)
        .bind(user_id)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(&data.purpose)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Move a reservation to `next` if its current status allows it.
    /// `reviewer` and `reason` are recorded when given.
    pub async fn transition(
        &self,
        id: i32,
        next: ReservationStatus,
        reviewer: Option<i32>,
        reason: Option<&str>,
    ) -> AppResult<Reservation> {
        let sources: Vec<String> = ReservationStatus::sources_of(next)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let now = Utc::now();

        let updated = sqlx::query(
            r#"
            UPDATE reservations
            SET status = $2,
                reviewed_by = COALESCE($3, reviewed_by),
                reviewed_at = CASE WHEN $3::int IS NULL THEN reviewed_at ELSE $4 END,
                rejection_reason = COALESCE($5, rejection_reason),
                updated_at = $4
            WHERE id = $1 AND status = ANY($6)
            "#,
        )
        .bind(id)
        .bind(next)
        .bind(reviewer)
        .bind(now)
        .bind(reason)
        .bind(sources)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            let current = self.get_by_id(id).await?;
            return Err(AppError::InvalidTransition(format!(
                "Reservation {} cannot go from {} to {}",
                id, current.status, next
            )));
        }
        self.get_by_id(id).await
    }

    pub async fn count_by_status(&self, status: ReservationStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservations WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
