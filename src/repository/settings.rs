//! Lending policy storage

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::settings::{CategoryPolicy, LoanPolicy},
};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: Pool<Postgres>,
}

impl SettingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Stored global policy, `None` until an admin saves one
    pub async fn get_loan_policy(&self) -> AppResult<Option<(LoanPolicy, DateTime<Utc>)>> {
        let row: Option<(i32, i32, i32, DateTime<Utc>)> = sqlx::query_as(
            "SELECT max_loan_days, max_active_loans, max_advance_days, updated_at FROM loan_policy WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(max_loan_days, max_active_loans, max_advance_days, updated_at)| {
            (
                LoanPolicy {
                    max_loan_days,
                    max_active_loans,
                    max_advance_days,
                },
                updated_at,
            )
        }))
    }

    pub async fn upsert_loan_policy(&self, policy: &LoanPolicy) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO loan_policy (id, max_loan_days, max_active_loans, max_advance_days, updated_at)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                max_loan_days = EXCLUDED.max_loan_days,
                max_active_loans = EXCLUDED.max_active_loans,
                max_advance_days = EXCLUDED.max_advance_days,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(policy.max_loan_days)
        .bind(policy.max_active_loans)
        .bind(policy.max_advance_days)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn category_policies(&self) -> AppResult<Vec<CategoryPolicy>> {
        let rows = sqlx::query_as::<_, CategoryPolicy>("SELECT * FROM category_policies ORDER BY category")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn category_policy(&self, category: &str) -> AppResult<Option<CategoryPolicy>> {
        let row = sqlx::query_as::<_, CategoryPolicy>(
            "SELECT * FROM category_policies WHERE category = LOWER($1)",
        )
        .bind(category.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Create or replace overrides and drop the removed ones in one transaction
    pub async fn save_category_policies(
        &self,
        upserts: &[CategoryPolicy],
        removals: &[String],
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for policy in upserts {
            sqlx::query(
                r#"
                INSERT INTO category_policies (category, max_loan_days, max_active_loans, max_advance_days)
                VALUES (LOWER($1), $2, $3, $4)
                ON CONFLICT (category) DO UPDATE SET
                    max_loan_days = EXCLUDED.max_loan_days,
                    max_active_loans = EXCLUDED.max_active_loans,
                    max_advance_days = EXCLUDED.max_advance_days
                "#,
            )
            .bind(policy.category.trim())
            .bind(policy.max_loan_days)
            .bind(policy.max_active_loans)
            .bind(policy.max_advance_days)
            .execute(&mut *tx)
            .await?;
        }

        if !removals.is_empty() {
            let lowered: Vec<String> = removals.iter().map(|c| c.trim().to_lowercase()).collect();
            sqlx::query("DELETE FROM category_policies WHERE category = ANY($1)")
                .bind(lowered)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
