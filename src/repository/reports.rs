//! Aggregate queries behind the dashboard and utilization reports

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        enums::LoanStatus,
        report::{StatEntry, TopEquipment},
    },
};

/// Loan period of an item: pickup and, once back, return instant
pub type LoanPeriod = (DateTime<Utc>, Option<DateTime<Utc>>);

#[derive(Clone)]
pub struct ReportsRepository {
    pool: Pool<Postgres>,
}

impl ReportsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn grouped(&self, query: &str) -> AppResult<Vec<StatEntry>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(query).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(label, value)| StatEntry { label, value })
            .collect())
    }

    pub async fn equipment_by_status(&self) -> AppResult<Vec<StatEntry>> {
        self.grouped("SELECT status, COUNT(*) FROM equipment GROUP BY status ORDER BY status")
            .await
    }

    pub async fn equipment_by_category(&self) -> AppResult<Vec<StatEntry>> {
        self.grouped("SELECT category, COUNT(*) FROM equipment GROUP BY category ORDER BY category")
            .await
    }

    pub async fn loans_by_status(&self) -> AppResult<Vec<StatEntry>> {
        self.grouped("SELECT status, COUNT(*) FROM loan_requests GROUP BY status ORDER BY status")
            .await
    }

    /// Items picked up most often
    pub async fn top_equipment(&self, limit: i64) -> AppResult<Vec<TopEquipment>> {
        let rows: Vec<(i32, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT e.id, e.name, e.category, COUNT(l.id) AS loan_count
            FROM equipment e
            JOIN loan_requests l ON l.equipment_id = e.id AND l.picked_up_at IS NOT NULL
            GROUP BY e.id, e.name, e.category
            ORDER BY loan_count DESC, e.name
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(equipment_id, name, category, loan_count)| TopEquipment {
                equipment_id,
                name,
                category,
                loan_count,
            })
            .collect())
    }

    /// Loan periods touching `[window_start, window_end)`, per equipment
    pub async fn loan_periods(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<HashMap<i32, Vec<LoanPeriod>>> {
        let rows: Vec<(i32, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT equipment_id, picked_up_at, returned_at
            FROM loan_requests
            WHERE status = ANY($3)
              AND picked_up_at IS NOT NULL
              AND picked_up_at < $2
              AND (returned_at IS NULL OR returned_at > $1)
            "#,
        )
        .bind(window_start)
        .bind(window_end)
        .bind(LoanStatus::texts_where(LoanStatus::was_picked_up))
        .fetch_all(&self.pool)
        .await?;

        let mut periods: HashMap<i32, Vec<LoanPeriod>> = HashMap::new();
        for (equipment_id, start, end) in rows {
            periods.entry(equipment_id).or_default().push((start, end));
        }
        Ok(periods)
    }

    /// Last instant each item was on loan; items still out count as in use at `now`
    pub async fn last_used(&self, now: DateTime<Utc>) -> AppResult<HashMap<i32, DateTime<Utc>>> {
        let rows: Vec<(i32, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT equipment_id, MAX(COALESCE(returned_at, $1))
            FROM loan_requests
            WHERE picked_up_at IS NOT NULL
            GROUP BY equipment_id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }
}
