//! Users repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::paging;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{ApprovalStatus, LoanStatus, UserRole},
        user::{RegisterUser, UpdateProfile, User, UserQuery, UserShort},
    },
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by email (login)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email.trim())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Search users with pagination
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        let (_, per_page, offset) = paging(query.page, query.per_page, 20);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.name.is_some() {
            conditions.push(format!(
                "(LOWER(u.display_name) LIKE ${0} OR LOWER(u.email) LIKE ${0})",
                idx
            ));
            idx += 1;
        }
        if query.role.is_some() {
            conditions.push(format!("u.role = ${}", idx));
            idx += 1;
        }
        if query.approval_status.is_some() {
            conditions.push(format!("u.approval_status = ${}", idx));
            idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let name_pattern = query.name.as_deref().map(crate::text::like_pattern);

        let count_query = format!("SELECT COUNT(*) FROM users u {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(ref p) = name_pattern {
            count_builder = count_builder.bind(p);
        }
        if let Some(role) = query.role {
            count_builder = count_builder.bind(role);
        }
        if let Some(status) = query.approval_status {
            count_builder = count_builder.bind(status);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            r#"
            SELECT u.id, u.email, u.display_name, u.role, u.approval_status, u.department,
                   (SELECT COUNT(*) FROM loan_requests l
                     WHERE l.user_id = u.id
                       AND l.status = ANY(${})) AS nb_open_loans,
                   (SELECT COUNT(*) FROM loan_requests l
                     WHERE l.user_id = u.id AND l.status = 'overdue') AS nb_overdue_loans
            FROM users u
            {}
            ORDER BY u.display_name, u.id
            LIMIT {} OFFSET {}
            "#,
            idx, where_clause, per_page, offset
        );

        let mut builder = sqlx::query_as::<_, UserShort>(&select_query);
        if let Some(ref p) = name_pattern {
            builder = builder.bind(p);
        }
        if let Some(role) = query.role {
            builder = builder.bind(role);
        }
        if let Some(status) = query.approval_status {
            builder = builder.bind(status);
        }
        let users = builder
            .bind(LoanStatus::texts_where(LoanStatus::is_open))
            .fetch_all(&self.pool)
            .await?;

        Ok((users, total))
    }

    /// Create a new user with an already hashed password
    pub async fn create(
        &self,
        data: &RegisterUser,
        password_hash: &str,
        role: UserRole,
        approval_status: ApprovalStatus,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password, display_name, role, approval_status,
                               department, phone, student_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(data.email.trim())
        .bind(password_hash)
        .bind(data.display_name.trim())
        .bind(role)
        .bind(approval_status)
        .bind(&data.department)
        .bind(&data.phone)
        .bind(&data.student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    /// Update profile fields that were provided
    pub async fn update_profile(&self, id: i32, data: &UpdateProfile) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                department = COALESCE($3, department),
                phone = COALESCE($4, phone),
                student_id = COALESCE($5, student_id),
                updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.display_name)
        .bind(&data.department)
        .bind(&data.phone)
        .bind(&data.student_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn update_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_role(&self, id: i32, role: UserRole) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn update_approval(&self, id: i32, status: ApprovalStatus) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET approval_status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn touch_last_login(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Count accounts waiting for approval
    pub async fn count_pending_approval(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE approval_status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
