//! Audit log and staff activity log

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::StaffAction;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_id: Option<i32>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i32>,
    #[schema(value_type = Object)]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub actor_display_name: Option<String>,
}

/// Audit record to be written
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub actor_id: Option<i32>,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<i32>,
    pub details: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(actor_id: Option<i32>, action: &'static str, entity_type: &'static str, entity_id: Option<i32>) -> Self {
        Self {
            actor_id,
            action,
            entity_type,
            entity_id,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    pub actor_id: Option<i32>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Staff activity log entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StaffActivity {
    pub id: i64,
    pub staff_id: i32,
    pub action: StaffAction,
    pub loan_request_id: Option<i32>,
    pub equipment_id: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub staff_display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct StaffActivityQuery {
    pub staff_id: Option<i32>,
    pub action: Option<StaffAction>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
