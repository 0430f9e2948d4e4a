//! Saved searches repository

use sqlx::{types::Json, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::saved_search::{CreateSavedSearch, SavedSearch},
};

#[derive(Clone)]
pub struct SavedSearchesRepository {
    pool: Pool<Postgres>,
}

impl SavedSearchesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<SavedSearch>> {
        let rows = sqlx::query_as::<_, SavedSearch>(
            "SELECT * FROM saved_searches WHERE user_id = $1 ORDER BY name, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Get a saved search owned by `user_id`
    pub async fn get(&self, id: i32, user_id: i32) -> AppResult<SavedSearch> {
        sqlx::query_as::<_, SavedSearch>(
            "SELECT * FROM saved_searches WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Saved search {} not found", id)))
    }

    pub async fn create(&self, user_id: i32, data: &CreateSavedSearch) -> AppResult<SavedSearch> {
        let row = sqlx::query_as::<_, SavedSearch>(
            r#"
            INSERT INTO saved_searches (user_id, name, criteria)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(data.name.trim())
        .bind(Json(&data.criteria))
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| {
            AppError::Conflict(format!("A saved search named '{}' already exists", data.name.trim()))
        })
    }

    pub async fn delete(&self, id: i32, user_id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM saved_searches WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Saved search {} not found", id)));
        }
        Ok(())
    }
}
