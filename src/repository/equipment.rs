//! Equipment repository

use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{EquipmentStatus, LoanStatus},
        equipment::{CategoryCount, CreateEquipment, Equipment, EquipmentSearchCriteria, UpdateEquipment},
    },
};

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Search equipment with pagination
    pub async fn search(&self, criteria: &EquipmentSearchCriteria) -> AppResult<(Vec<Equipment>, i64)> {
        let per_page = criteria.per_page();
        let offset = (criteria.page() - 1) * per_page;

        let mut conditions = Vec::new();
        let mut idx = 1;

        if criteria.query.is_some() {
            conditions.push(format!(
                "(LOWER(name) LIKE ${0} OR LOWER(COALESCE(brand, '')) LIKE ${0} \
                 OR LOWER(COALESCE(model, '')) LIKE ${0} OR LOWER(serial_number) LIKE ${0})",
                idx
            ));
            idx += 1;
        }
        if criteria.category.is_some() {
            conditions.push(format!("LOWER(category) = LOWER(${})", idx));
            idx += 1;
        }
        if criteria.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        if criteria.location.is_some() {
            conditions.push(format!("LOWER(COALESCE(location, '')) LIKE ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query_pattern = criteria.query.as_deref().map(crate::text::like_pattern);
        let location_pattern = criteria.location.as_deref().map(crate::text::like_pattern);

        let count_q = format!("SELECT COUNT(*) FROM equipment {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(ref p) = query_pattern { count_builder = count_builder.bind(p); }
        if let Some(ref c) = criteria.category { count_builder = count_builder.bind(c); }
        if let Some(s) = criteria.status { count_builder = count_builder.bind(s); }
        if let Some(ref l) = location_pattern { count_builder = count_builder.bind(l); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT * FROM equipment {} ORDER BY category, name, id LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut builder = sqlx::query_as::<_, Equipment>(&select_q);
        if let Some(ref p) = query_pattern { builder = builder.bind(p); }
        if let Some(ref c) = criteria.category { builder = builder.bind(c); }
        if let Some(s) = criteria.status { builder = builder.bind(s); }
        if let Some(ref l) = location_pattern { builder = builder.bind(l); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    /// All equipment, for exports and reports
    pub async fn list_all(&self) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment ORDER BY category, name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Get equipment by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Get equipment by the token printed in its QR code
    pub async fn get_by_qr_token(&self, token: Uuid) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE qr_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No equipment matches this QR code".to_string()))
    }

    pub async fn serial_exists(&self, serial_number: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM equipment WHERE serial_number = $1 AND ($2::int IS NULL OR id != $2))",
        )
        .bind(serial_number.trim())
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Create equipment
    pub async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (name, category, brand, model, serial_number, status,
                                   location, description, image_url, qr_token)
            VALUES ($1, LOWER($2), $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(data.name.trim())
        .bind(data.category.trim())
        .bind(&data.brand)
        .bind(&data.model)
        .bind(data.serial_number.trim())
        .bind(data.status.unwrap_or(EquipmentStatus::Available))
        .bind(&data.location)
        .bind(&data.description)
        .bind(&data.image_url)
        .bind(Uuid::new_v4())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Update equipment
    pub async fn update(&self, id: i32, data: &UpdateEquipment) -> AppResult<Equipment> {
        let now = Utc::now();
        let mut sets = vec!["modif_date = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.name, "name");
        add_field!(data.category, "category");
        add_field!(data.brand, "brand");
        add_field!(data.model, "model");
        add_field!(data.serial_number, "serial_number");
        add_field!(data.status, "status");
        add_field!(data.location, "location");
        add_field!(data.description, "description");
        add_field!(data.image_url, "image_url");

        let query = format!(
            "UPDATE equipment SET {} WHERE id = ${} RETURNING *",
            sets.join(", "),
            idx
        );

        let name = data.name.as_deref().map(str::trim);
        let category = data.category.as_deref().map(|c| c.trim().to_lowercase());
        let serial_number = data.serial_number.as_deref().map(str::trim);

        let mut builder = sqlx::query_as::<_, Equipment>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(name);
        bind_field!(category);
        bind_field!(data.brand);
        bind_field!(data.model);
        bind_field!(serial_number);
        bind_field!(data.status);
        bind_field!(data.location);
        bind_field!(data.description);
        bind_field!(data.image_url);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Set the status of one item
    pub async fn set_status(&self, id: i32, status: EquipmentStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE equipment SET status = $2, modif_date = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        Ok(())
    }

    /// Issue a new QR token, invalidating the printed one
    pub async fn regenerate_qr_token(&self, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(
            "UPDATE equipment SET qr_token = $2, modif_date = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Whether the item is committed to a borrower
    pub async fn has_active_loans(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loan_requests WHERE equipment_id = $1 AND status = ANY($2))",
        )
        .bind(id)
        .bind(LoanStatus::texts_where(LoanStatus::is_active))
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Whether any loan request or reservation ever referenced the item
    pub async fn has_loan_history(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM loan_requests WHERE equipment_id = $1)
                OR EXISTS(SELECT 1 FROM reservations WHERE equipment_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Delete equipment
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        Ok(())
    }

    /// Categories with their item counts
    pub async fn categories(&self) -> AppResult<Vec<CategoryCount>> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT category,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'available') AS available
            FROM equipment
            GROUP BY category
            ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Bulk operations, one transaction per chunk
    // -----------------------------------------------------------------------

    /// Set the status of every listed item, returns the ids actually updated
    pub async fn bulk_set_status(&self, ids: &[i32], status: EquipmentStatus) -> AppResult<Vec<i32>> {
        let mut tx = self.pool.begin().await?;
        let updated: Vec<i32> = sqlx::query_scalar(
            "UPDATE equipment SET status = $2, modif_date = $3 WHERE id = ANY($1) RETURNING id",
        )
        .bind(ids)
        .bind(status)
        .bind(Utc::now())
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Delete every listed item that never had a loan request or reservation,
    /// returns the ids deleted
    pub async fn bulk_delete(&self, ids: &[i32]) -> AppResult<Vec<i32>> {
        let mut tx = self.pool.begin().await?;
        let deleted: Vec<i32> = sqlx::query_scalar(
            r#"
            DELETE FROM equipment e
            WHERE e.id = ANY($1)
              AND NOT EXISTS (SELECT 1 FROM loan_requests l WHERE l.equipment_id = e.id)
              AND NOT EXISTS (SELECT 1 FROM reservations r WHERE r.equipment_id = e.id)
            RETURNING e.id
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// Insert records, skipping duplicate serial numbers.
    /// Returns for each record the created item, or `None` when its serial already exists.
    pub async fn bulk_create(&self, records: &[CreateEquipment]) -> AppResult<Vec<Option<Equipment>>> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(records.len());
        for data in records {
            let row = sqlx::query_as::<_, Equipment>(
                r#"
                INSERT INTO equipment (name, category, brand, model, serial_number, status,
                                       location, description, image_url, qr_token)
                VALUES ($1, LOWER($2), $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (serial_number) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(data.name.trim())
            .bind(data.category.trim())
            .bind(&data.brand)
            .bind(&data.model)
            .bind(data.serial_number.trim())
            .bind(data.status.unwrap_or(EquipmentStatus::Available))
            .bind(&data.location)
            .bind(&data.description)
            .bind(&data.image_url)
            .bind(Uuid::new_v4())
            .fetch_optional(&mut *tx)
            .await?;
            results.push(row);
        }
        tx.commit().await?;
        Ok(results)
    }

    /// Recompute every item's status from its loan requests.
    /// Items out on loan become `borrowed`; `borrowed` items with no open loan become `available`.
    pub async fn reconcile_statuses(&self) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;
        let out = LoanStatus::texts_where(LoanStatus::is_out);
        let lent = sqlx::query(
            r#"
            UPDATE equipment e SET status = 'borrowed', modif_date = NOW()
            WHERE e.status <> 'borrowed'
              AND EXISTS (SELECT 1 FROM loan_requests l
                          WHERE l.equipment_id = e.id AND l.status = ANY($1))
            "#,
        )
        .bind(&out)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let freed = sqlx::query(
            r#"
            UPDATE equipment e SET status = 'available', modif_date = NOW()
            WHERE e.status = 'borrowed'
              AND NOT EXISTS (SELECT 1 FROM loan_requests l
                              WHERE l.equipment_id = e.id AND l.status = ANY($1))
            "#,
        )
        .bind(&out)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;
        Ok(lent + freed)
    }
}
