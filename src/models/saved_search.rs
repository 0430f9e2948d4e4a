//! Saved equipment searches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use validator::Validate;

use super::equipment::EquipmentSearchCriteria;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct SavedSearch {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    #[schema(value_type = EquipmentSearchCriteria)]
    pub criteria: Json<EquipmentSearchCriteria>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSavedSearch {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    pub criteria: EquipmentSearchCriteria,
}
