//! Audit and staff activity logs

use sqlx::{Pool, Postgres};

use super::paging;
use crate::{
    error::AppResult,
    models::{
        audit::{AuditLogEntry, AuditQuery, NewAuditEntry, StaffActivity, StaffActivityQuery},
        enums::StaffAction,
    },
};

#[derive(Clone)]
pub struct AuditRepository {
    pool: Pool<Postgres>,
}

impl AuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: &NewAuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Audit entries, newest first
    pub async fn list(&self, query: &AuditQuery) -> AppResult<(Vec<AuditLogEntry>, i64)> {
        let (_, per_page, offset) = paging(query.page, query.per_page, 50);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.actor_id.is_some() {
            conditions.push(format!("a.actor_id = ${}", idx));
            idx += 1;
        }
        if query.action.is_some() {
            conditions.push(format!("a.action = ${}", idx));
            idx += 1;
        }
        if query.entity_type.is_some() {
            conditions.push(format!("a.entity_type = ${}", idx));
            idx += 1;
        }
        if query.start_date.is_some() {
            conditions.push(format!("a.created_at::date >= ${}", idx));
            idx += 1;
        }
        if query.end_date.is_some() {
            conditions.push(format!("a.created_at::date <= ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM audit_logs a {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(v) = query.actor_id { count_builder = count_builder.bind(v); }
        if let Some(ref v) = query.action { count_builder = count_builder.bind(v); }
        if let Some(ref v) = query.entity_type { count_builder = count_builder.bind(v); }
        if let Some(v) = query.start_date { count_builder = count_builder.bind(v); }
        if let Some(v) = query.end_date { count_builder = count_builder.bind(v); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            r#"
            SELECT a.*, u.display_name AS actor_display_name
            FROM audit_logs a
            LEFT JOIN users u ON u.id = a.actor_id
            {}
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT {} OFFSET {}
            "#,
            where_clause, per_page, offset
        );
        let mut builder = sqlx::query_as::<_, AuditLogEntry>(&select_q);
        if let Some(v) = query.actor_id { builder = builder.bind(v); }
        if let Some(ref v) = query.action { builder = builder.bind(v); }
        if let Some(ref v) = query.entity_type { builder = builder.bind(v); }
        if let Some(v) = query.start_date { builder = builder.bind(v); }
        if let Some(v) = query.end_date { builder = builder.bind(v); }
        let rows = builder.fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    pub async fn record_staff_activity(
        &self,
        staff_id: i32,
        action: StaffAction,
        loan_request_id: Option<i32>,
        equipment_id: Option<i32>,
        notes: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO staff_activity_logs (staff_id, action, loan_request_id, equipment_id, notes)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(staff_id)
        .bind(action)
        .bind(loan_request_id)
        .bind(equipment_id)
        .bind(notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Staff activity, newest first
    pub async fn list_staff_activity(
        &self,
        query: &StaffActivityQuery,
    ) -> AppResult<(Vec<StaffActivity>, i64)> {
        let (_, per_page, offset) = paging(query.page, query.per_page, 50);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.staff_id.is_some() {
            conditions.push(format!("s.staff_id = ${}", idx));
            idx += 1;
        }
        if query.action.is_some() {
            conditions.push(format!("s.action = ${}", idx));
            idx += 1;
        }
        if query.start_date.is_some() {
            conditions.push(format!("s.created_at::date >= ${}", idx));
            idx += 1;
        }
        if query.end_date.is_some() {
            conditions.push(format!("s.created_at::date <= ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM staff_activity_logs s {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(v) = query.staff_id { count_builder = count_builder.bind(v); }
        if let Some(v) = query.action { count_builder = count_builder.bind(v); }
        if let Some(v) = query.start_date { count_builder = count_builder.bind(v); }
        if let Some(v) = query.end_date { count_builder = count_builder.bind(v); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            r#"
            SELECT s.*, u.display_name AS staff_display_name
            FROM staff_activity_logs s
            LEFT JOIN users u ON u.id = s.staff_id
            {}
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT {} OFFSET {}
            "#,
            where_clause, per_page, offset
        );
        let mut builder = sqlx::query_as::<_, StaffActivity>(&select_q);
        if let Some(v) = query.staff_id { builder = builder.bind(v); }
        if let Some(v) = query.action { builder = builder.bind(v); }
        if let Some(v) = query.start_date { builder = builder.bind(v); }
        if let Some(v) = query.end_date { builder = builder.bind(v); }
        let rows = builder.fetch_all(&self.pool).await?;

        Ok((rows, total))
    }
}
