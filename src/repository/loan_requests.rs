//! Loan requests repository

use chrono::{NaiveDate, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::paging;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{EquipmentStatus, LoanStatus, ReturnCondition},
        loan_request::{CreateLoanRequest, LoanHistoryFilter, LoanRequest, LoanRequestQuery},
    },
};

const SELECT_LOAN: &str = r#"
    SELECT l.*,
           e.name AS equipment_name, e.category AS equipment_category,
           e.brand AS equipment_brand, e.model AS equipment_model,
           e.serial_number AS equipment_serial_number,
           u.display_name AS user_display_name, u.email AS user_email
    FROM loan_requests l
    JOIN equipment e ON e.id = l.equipment_id
    JOIN users u ON u.id = l.user_id
"#;

#[derive(Clone)]
pub struct LoanRequestsRepository {
    pool: Pool<Postgres>,
}

impl LoanRequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan request by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<LoanRequest> {
        let q = format!("{} WHERE l.id = $1", SELECT_LOAN);
        sqlx::query_as::<_, LoanRequest>(&q)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan request {} not found", id)))
    }

    pub async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<LoanRequest>> {
        let q = format!("{} WHERE l.id = ANY($1) ORDER BY l.id", SELECT_LOAN);
        let rows = sqlx::query_as::<_, LoanRequest>(&q)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// List loan requests with filters and pagination
    pub async fn list(&self, query: &LoanRequestQuery) -> AppResult<(Vec<LoanRequest>, i64)> {
        let (_, per_page, offset) = paging(query.page, query.per_page, 20);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.status.is_some() {
            conditions.push(format!("l.status = ${}", idx));
            idx += 1;
        }
        if query.user_id.is_some() {
            conditions.push(format!("l.user_id = ${}", idx));
            idx += 1;
        }
        if query.equipment_id.is_some() {
            conditions.push(format!("l.equipment_id = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM loan_requests l {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(s) = query.status { count_builder = count_builder.bind(s); }
        if let Some(u) = query.user_id { count_builder = count_builder.bind(u); }
        if let Some(e) = query.equipment_id { count_builder = count_builder.bind(e); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "{} {} ORDER BY l.created_at DESC, l.id DESC LIMIT {} OFFSET {}",
            SELECT_LOAN, where_clause, per_page, offset
        );
        let mut builder = sqlx::query_as::<_, LoanRequest>(&select_q);
        if let Some(s) = query.status { builder = builder.bind(s); }
        if let Some(u) = query.user_id { builder = builder.bind(u); }
        if let Some(e) = query.equipment_id { builder = builder.bind(e); }
        let rows = builder.fetch_all(&self.pool).await?;

        Ok((rows, total))
    }

    /// Loan history narrowed by the structured part of the filter.
    /// The free-text part is applied in memory by the caller.
    pub async fn history(&self, filter: &LoanHistoryFilter) -> AppResult<Vec<LoanRequest>> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if filter.user_id.is_some() {
            conditions.push(format!("l.user_id = ${}", idx));
            idx += 1;
        }
        if filter.start_date.is_some() {
            conditions.push(format!("l.borrow_date >= ${}", idx));
            idx += 1;
        }
        if filter.end_date.is_some() {
            conditions.push(format!("l.borrow_date <= ${}", idx));
            idx += 1;
        }
        if filter.category.is_some() {
            conditions.push(format!("LOWER(e.category) = LOWER(${})", idx));
            idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("l.status = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let q = format!(
            "{} {} ORDER BY l.borrow_date DESC, l.id DESC",
            SELECT_LOAN, where_clause
        );
        let mut builder = sqlx::query_as::<_, LoanRequest>(&q);
        if let Some(u) = filter.user_id { builder = builder.bind(u); }
        if let Some(d) = filter.start_date { builder = builder.bind(d); }
        if let Some(d) = filter.end_date { builder = builder.bind(d); }
        if let Some(ref c) = filter.category { builder = builder.bind(c.trim()); }
        if let Some(s) = filter.status { builder = builder.bind(s); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Every loan request of one item, newest first
    pub async fn for_equipment(&self, equipment_id: i32) -> AppResult<Vec<LoanRequest>> {
        let q = format!(
            "{} WHERE l.equipment_id = $1 ORDER BY l.borrow_date DESC, l.id DESC",
            SELECT_LOAN
        );
        let rows = sqlx::query_as::<_, LoanRequest>(&q)
            .bind(equipment_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count_by_status(&self, status: LoanStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loan_requests WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Create a loan request.
    ///
    /// Date rules are checked by the caller; the quota, equipment state and
    /// overlap checks run here under row locks so concurrent requests cannot
    /// both pass them.
    pub async fn create(
        &self,
        user_id: i32,
        data: &CreateLoanRequest,
        max_active_loans: i32,
    ) -> AppResult<LoanRequest> {
        let mut tx = self.pool.begin().await?;

        let status: EquipmentStatus =
            sqlx::query_scalar("SELECT status FROM equipment WHERE id = $1 FOR UPDATE")
                .bind(data.equipment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", data.equipment_id)))?;

        if !status.accepts_requests() {
            return Err(AppError::BusinessRule(format!(
                "Equipment is {} and cannot be requested",
                status
            )));
        }

        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loan_requests WHERE user_id = $1 AND status = ANY($2)",
        )
        .bind(user_id)
        .bind(LoanStatus::texts_where(LoanStatus::is_open))
        .fetch_one(&mut *tx)
        .await?;
        if open >= max_active_loans as i64 {
            return Err(AppError::BusinessRule(format!(
                "Maximum active loan requests reached ({}/{})",
                open, max_active_loans
            )));
        }

        if Self::overlaps_active(&mut tx, data.equipment_id, data.borrow_date, data.expected_return_date, None).await? {
            return Err(AppError::BusinessRule(
                "Equipment is already committed for these dates".to_string(),
            ));
        }

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO loan_requests (equipment_id, user_id, status, purpose,
                                       borrow_date, expected_return_date)
            VALUES ($1, $2, 'pending', $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(data.equipment_id)
        .bind(user_id)
        .bind(&data.purpose)
        .bind(data.borrow_date)
        .bind(data.expected_return_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Whether an approved, borrowed or overdue request holds the item on any of the given days
    async fn overlaps_active(
        tx: &mut Transaction<'_, Postgres>,
        equipment_id: i32,
        from: NaiveDate,
        to: NaiveDate,
        exclude_id: Option<i32>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loan_requests
                WHERE equipment_id = $1 AND status = ANY($5)
                  AND borrow_date <= $3 AND expected_return_date >= $2
                  AND ($4::int IS NULL OR id != $4)
            )
            "#,
        )
        .bind(equipment_id)
        .bind(from)
        .bind(to)
        .bind(exclude_id)
        .bind(LoanStatus::texts_where(LoanStatus::is_active))
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }

    /// Error for an update that matched no row: either missing or in the wrong state
    async fn transition_error(&self, id: i32, next: LoanStatus) -> AppError {
        let current: Result<Option<LoanStatus>, _> =
            sqlx::query_scalar("SELECT status FROM loan_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        match current {
            Ok(Some(current)) => AppError::InvalidTransition(format!(
                "Loan request {} cannot go from {} to {}",
                id, current, next
            )),
            Ok(None) => AppError::NotFound(format!("Loan request {} not found", id)),
            Err(e) => e.into(),
        }
    }

    fn sources(next: LoanStatus) -> Vec<String> {
        LoanStatus::sources_of(next)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }

    /// pending -> approved
    pub async fn approve(&self, id: i32, staff_id: i32) -> AppResult<LoanRequest> {
        let mut tx = self.pool.begin().await?;
        Self::approve_in(&mut tx, id, staff_id).await?;
        tx.commit().await?;
        self.get_by_id(id).await
    }

    async fn approve_in(tx: &mut Transaction<'_, Postgres>, id: i32, staff_id: i32) -> AppResult<()> {
        let row: Option<(i32, NaiveDate, NaiveDate, LoanStatus)> = sqlx::query_as(
            r#"
            SELECT equipment_id, borrow_date, expected_return_date, status
            FROM loan_requests WHERE id = $1 FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        let Some((equipment_id, from, to, status)) = row else {
            return Err(AppError::NotFound(format!("Loan request {} not found", id)));
        };
        if !status.can_transition_to(LoanStatus::Approved) {
            return Err(AppError::InvalidTransition(format!(
                "Loan request {} cannot go from {} to approved",
                id, status
            )));
        }

        sqlx::query("SELECT id FROM equipment WHERE id = $1 FOR UPDATE")
            .bind(equipment_id)
            .execute(&mut **tx)
            .await?;
        if Self::overlaps_active(tx, equipment_id, from, to, Some(id)).await? {
            return Err(AppError::BusinessRule(
                "Equipment is already committed for these dates".to_string(),
            ));
        }

        sqlx::query(
            r#"
            UPDATE loan_requests
            SET status = 'approved', approved_by = $2, approved_at = $3, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(staff_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// pending | approved -> rejected
    pub async fn reject(&self, id: i32, staff_id: i32, reason: &str) -> AppResult<LoanRequest> {
        let updated = sqlx::query(
            r#"
            UPDATE loan_requests
            SET status = 'rejected', rejected_by = $2, rejected_at = $3,
                rejection_reason = $4, updated_at = $3
            WHERE id = $1 AND status = ANY($5)
            "#,
        )
        .bind(id)
        .bind(staff_id)
        .bind(Utc::now())
        .bind(reason.trim())
        .bind(Self::sources(LoanStatus::Rejected))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(self.transition_error(id, LoanStatus::Rejected).await);
        }
        self.get_by_id(id).await
    }

    /// approved -> borrowed, the item leaves the counter
    pub async fn pickup(&self, id: i32, staff_id: i32) -> AppResult<LoanRequest> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let equipment_id: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE loan_requests
            SET status = 'borrowed', picked_up_at = $2, pickup_processed_by = $3, updated_at = $2
            WHERE id = $1 AND status = ANY($4)
            RETURNING equipment_id
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(staff_id)
        .bind(Self::sources(LoanStatus::Borrowed))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(equipment_id) = equipment_id else {
            return Err(self.transition_error(id, LoanStatus::Borrowed).await);
        };

        sqlx::query("UPDATE equipment SET status = $2, modif_date = $3 WHERE id = $1")
            .bind(equipment_id)
            .bind(EquipmentStatus::Borrowed)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// borrowed | overdue -> returned, the item goes back according to its condition
    pub async fn process_return(
        &self,
        id: i32,
        staff_id: i32,
        condition: ReturnCondition,
        notes: Option<&str>,
    ) -> AppResult<LoanRequest> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let equipment_id: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE loan_requests
            SET status = 'returned', returned_at = $2, return_processed_by = $3,
                return_condition = $4, return_notes = $5, updated_at = $2
            WHERE id = $1 AND status = ANY($6)
            RETURNING equipment_id
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(staff_id)
        .bind(condition)
        .bind(notes)
        .bind(Self::sources(LoanStatus::Returned))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(equipment_id) = equipment_id else {
            return Err(self.transition_error(id, LoanStatus::Returned).await);
        };

        sqlx::query("UPDATE equipment SET status = $2, modif_date = $3 WHERE id = $1")
            .bind(equipment_id)
            .bind(condition.resulting_equipment_status())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// borrowed -> overdue for every loan whose expected return date is before `today`
    pub async fn mark_overdue(&self, today: NaiveDate) -> AppResult<Vec<LoanRequest>> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r#"
            UPDATE loan_requests
            SET status = 'overdue', updated_at = $2
            WHERE status = 'borrowed' AND expected_return_date < $1
            RETURNING id
            "#,
        )
        .bind(today)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.get_many(&ids).await
    }

    // -----------------------------------------------------------------------
    // Bulk operations, one transaction per chunk
    // -----------------------------------------------------------------------

    /// Approve each listed request, returning the outcome per id.
    /// Rule violations are reported per item; a database error fails the chunk.
    pub async fn bulk_approve(
        &self,
        ids: &[i32],
        staff_id: i32,
    ) -> AppResult<Vec<(i32, Result<(), AppError>)>> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            match Self::approve_in(&mut tx, id, staff_id).await {
                Err(AppError::Database(e)) => return Err(AppError::Database(e)),
                outcome => outcomes.push((id, outcome)),
            }
        }
        tx.commit().await?;
        Ok(outcomes)
    }

    /// Reject every listed request that is still pending or approved, returns the ids rejected
    pub async fn bulk_reject(&self, ids: &[i32], staff_id: i32, reason: &str) -> AppResult<Vec<i32>> {
        let mut tx = self.pool.begin().await?;
        let rejected: Vec<i32> = sqlx::query_scalar(
            r#"
            UPDATE loan_requests
            SET status = 'rejected', rejected_by = $2, rejected_at = $3,
                rejection_reason = $4, updated_at = $3
            WHERE id = ANY($1) AND status = ANY($5)
            RETURNING id
            "#,
        )
        .bind(ids)
        .bind(staff_id)
        .bind(Utc::now())
        .bind(reason.trim())
        .bind(Self::sources(LoanStatus::Rejected))
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rejected)
    }
}
