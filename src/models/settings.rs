//! Lending policy settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::config::LoansConfig;

/// Global lending policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema, Validate)]
pub struct LoanPolicy {
    /// Maximum loan duration in days
    #[validate(range(min = 1, max = 365))]
    pub max_loan_days: i32,
    /// Maximum simultaneous open requests per user
    #[validate(range(min = 1, max = 100))]
    pub max_active_loans: i32,
    /// How far ahead a loan or reservation may start, in days
    #[validate(range(min = 0, max = 365))]
    pub max_advance_days: i32,
}

impl From<&LoansConfig> for LoanPolicy {
    fn from(config: &LoansConfig) -> Self {
        Self {
            max_loan_days: config.default_max_loan_days,
            max_active_loans: config.default_max_active_loans,
            max_advance_days: config.default_max_advance_days,
        }
    }
}

/// Per-category override of the global policy
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema, Validate)]
pub struct CategoryPolicy {
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(range(min = 1, max = 365))]
    pub max_loan_days: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub max_active_loans: Option<i32>,
    #[validate(range(min = 0, max = 365))]
    pub max_advance_days: Option<i32>,
}

impl LoanPolicy {
    /// Policy in force for a category: overridden fields win
    pub fn effective(&self, override_: Option<&CategoryPolicy>) -> LoanPolicy {
        match override_ {
            None => *self,
            Some(o) => LoanPolicy {
                max_loan_days: o.max_loan_days.unwrap_or(self.max_loan_days),
                max_active_loans: o.max_active_loans.unwrap_or(self.max_active_loans),
                max_advance_days: o.max_advance_days.unwrap_or(self.max_advance_days),
            },
        }
    }
}

/// Settings response
#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub loan_policy: LoanPolicy,
    pub category_policies: Vec<CategoryPolicy>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Update settings request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSettingsRequest {
    #[validate(nested)]
    pub loan_policy: Option<LoanPolicy>,
    /// Overrides to create or replace
    #[validate(nested)]
    pub category_policies: Option<Vec<CategoryPolicy>>,
    /// Categories whose override should be removed
    pub remove_categories: Option<Vec<String>>,
}
