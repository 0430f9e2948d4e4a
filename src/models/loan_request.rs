//! Loan request model, loan history filtering and statistics

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{LoanStatus, ReturnCondition};
use super::settings::LoanPolicy;
use crate::error::{AppError, AppResult};

/// Loan request joined with the equipment and borrower it refers to
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanRequest {
    pub id: i32,
    pub equipment_id: i32,
    pub user_id: i32,
    pub status: LoanStatus,
    pub purpose: Option<String>,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub approved_by: Option<i32>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<i32>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub pickup_processed_by: Option<i32>,
    pub returned_at: Option<DateTime<Utc>>,
    pub return_processed_by: Option<i32>,
    pub return_condition: Option<ReturnCondition>,
    pub return_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Joined fields
    pub equipment_name: String,
    pub equipment_category: String,
    pub equipment_brand: Option<String>,
    pub equipment_model: Option<String>,
    pub equipment_serial_number: String,
    pub user_display_name: String,
    pub user_email: String,
}

impl LoanRequest {
    /// Whole days the loan lasted, from borrow date to the day it came back
    pub fn duration_days(&self) -> Option<i64> {
        self.returned_at
            .map(|r| (r.date_naive() - self.borrow_date).num_days().max(0))
    }

    /// Returned on or before the expected date
    pub fn returned_on_time(&self) -> Option<bool> {
        self.returned_at
            .map(|r| r.date_naive() <= self.expected_return_date)
    }

    /// Past its expected return date without having come back
    pub fn is_late(&self, today: NaiveDate) -> bool {
        match self.status {
            LoanStatus::Overdue => true,
            LoanStatus::Borrowed => self.expected_return_date < today,
            _ => false,
        }
    }
}

/// Create loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLoanRequest {
    pub equipment_id: i32,
    /// Pickup date (YYYY-MM-DD)
    pub borrow_date: NaiveDate,
    /// Expected return date (YYYY-MM-DD)
    pub expected_return_date: NaiveDate,
    #[validate(length(max = 500))]
    pub purpose: Option<String>,
}

impl CreateLoanRequest {
    /// Date rules that do not need the database
    pub fn check_dates(&self, today: NaiveDate, policy: &LoanPolicy) -> AppResult<()> {
        if self.borrow_date < today {
            return Err(AppError::Validation(
                "Borrow date cannot be in the past".to_string(),
            ));
        }
        if self.expected_return_date < self.borrow_date {
            return Err(AppError::Validation(
                "Return date must be on or after the borrow date".to_string(),
            ));
        }
        let duration = (self.expected_return_date - self.borrow_date).num_days() + 1;
        if duration > policy.max_loan_days as i64 {
            return Err(AppError::BusinessRule(format!(
                "Loan duration of {} days exceeds the maximum of {} days",
                duration, policy.max_loan_days
            )));
        }
        let advance = (self.borrow_date - today).num_days();
        if advance > policy.max_advance_days as i64 {
            return Err(AppError::BusinessRule(format!(
                "Loans can be requested at most {} days in advance",
                policy.max_advance_days
            )));
        }
        Ok(())
    }
}

/// Reject request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectLoanRequest {
    #[validate(length(min = 1, max = 500, message = "A rejection reason is required"))]
    pub reason: String,
}

/// Return processing request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReturnLoanRequest {
    pub condition: ReturnCondition,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Query parameters for listing loan requests
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanRequestQuery {
    pub status: Option<LoanStatus>,
    pub user_id: Option<i32>,
    pub equipment_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Loan history filter
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanHistoryFilter {
    /// Borrower (staff only, defaults to the caller)
    pub user_id: Option<i32>,
    /// Earliest borrow date (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Latest borrow date (inclusive)
    pub end_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub status: Option<LoanStatus>,
    /// Matched against equipment name, brand, model, serial number and purpose
    pub search: Option<String>,
}

impl LoanHistoryFilter {
    pub fn check(&self) -> AppResult<()> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(AppError::Validation(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn matches(&self, loan: &LoanRequest) -> bool {
        if let Some(user_id) = self.user_id {
            if loan.user_id != user_id {
                return false;
            }
        }
        if let Some(start) = self.start_date {
            if loan.borrow_date < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if loan.borrow_date > end {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if crate::text::normalize(&loan.equipment_category) != crate::text::normalize(category) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if loan.status != status {
                return false;
            }
        }
        if let Some(ref search) = self.search {
            let fields = [
                Some(loan.equipment_name.as_str()),
                loan.equipment_brand.as_deref(),
                loan.equipment_model.as_deref(),
                Some(loan.equipment_serial_number.as_str()),
                loan.purpose.as_deref(),
            ];
            if !crate::text::any_contains(&fields, search) {
                return false;
            }
        }
        true
    }

    /// Keep the loans matching every set criterion, preserving order
    pub fn apply(&self, loans: Vec<LoanRequest>) -> Vec<LoanRequest> {
        loans.into_iter().filter(|l| self.matches(l)).collect()
    }
}

/// Aggregates over a loan history
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LoanHistoryStats {
    pub total: i64,
    pub returned: i64,
    pub currently_overdue: i64,
    /// Mean duration of returned loans, in days
    pub average_duration_days: f64,
    /// Percentage (0-100) of returned loans handed back by the expected date
    pub on_time_rate: f64,
}

impl LoanHistoryStats {
    /// Computes the statistics in a single pass
    pub fn compute(loans: &[LoanRequest], today: NaiveDate) -> Self {
        let mut returned = 0i64;
        let mut on_time = 0i64;
        let mut total_days = 0i64;
        let mut overdue = 0i64;

        for loan in loans {
            if let Some(days) = loan.duration_days() {
                returned += 1;
                total_days += days;
                if loan.returned_on_time() == Some(true) {
                    on_time += 1;
                }
            }
            if loan.is_late(today) {
                overdue += 1;
            }
        }

        let (average_duration_days, on_time_rate) = if returned == 0 {
            (0.0, 0.0)
        } else {
            (
                round2(total_days as f64 / returned as f64),
                round2(on_time as f64 * 100.0 / returned as f64),
            )
        };

        Self {
            total: loans.len() as i64,
            returned,
            currently_overdue: overdue,
            average_duration_days,
            on_time_rate,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Filtered history with its statistics
#[derive(Debug, Serialize, ToSchema)]
pub struct LoanHistoryResponse {
    pub loans: Vec<LoanRequest>,
    pub stats: LoanHistoryStats,
}

/// Result of an overdue sweep
#[derive(Debug, Serialize, ToSchema)]
pub struct OverdueSweepResult {
    pub marked_overdue: usize,
    pub loan_ids: Vec<i32>,
}

#[cfg(test)]
pub(crate) fn sample(id: i32, status: LoanStatus, borrow: NaiveDate, expected: NaiveDate) -> LoanRequest {
    let now = Utc::now();
    LoanRequest {
        id,
        equipment_id: 1,
        user_id: 10,
        status,
        purpose: Some("Field recording".to_string()),
        borrow_date: borrow,
        expected_return_date: expected,
        approved_by: None,
        approved_at: None,
        rejected_by: None,
        rejected_at: None,
        rejection_reason: None,
        picked_up_at: None,
        pickup_processed_by: None,
        returned_at: None,
        return_processed_by: None,
        return_condition: None,
        return_notes: None,
        created_at: now,
        updated_at: now,
        equipment_name: "Canon EOS R6".to_string(),
        equipment_category: "camera".to_string(),
        equipment_brand: Some("Canon".to_string()),
        equipment_model: Some("EOS R6".to_string()),
        equipment_serial_number: "CAM-0001".to_string(),
        user_display_name: "Somchai".to_string(),
        user_email: "somchai@example.org".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn returned(id: i32, borrow: NaiveDate, expected: NaiveDate, back: NaiveDate) -> LoanRequest {
        let mut loan = sample(id, LoanStatus::Returned, borrow, expected);
        loan.returned_at = Some(
            Utc.from_utc_datetime(&back.and_hms_opt(10, 0, 0).unwrap()),
        );
        loan
    }

    fn policy() -> LoanPolicy {
        LoanPolicy {
            max_loan_days: 7,
            max_active_loans: 2,
            max_advance_days: 14,
        }
    }

    #[test]
    fn test_stats_empty_history() {
        let stats = LoanHistoryStats::compute(&[], d(2024, 3, 1));
        assert_eq!(stats.total, 0);
        assert_eq!(stats.returned, 0);
        assert_eq!(stats.average_duration_days, 0.0);
        assert_eq!(stats.on_time_rate, 0.0);
    }

    #[test]
    fn test_stats_average_and_on_time() {
        let loans = vec![
            // 4 days, on time
            returned(1, d(2024, 1, 1), d(2024, 1, 5), d(2024, 1, 5)),
            // 6 days, late
            returned(2, d(2024, 1, 10), d(2024, 1, 12), d(2024, 1, 16)),
            // still out and past due
            sample(3, LoanStatus::Borrowed, d(2024, 2, 1), d(2024, 2, 3)),
            sample(4, LoanStatus::Pending, d(2024, 3, 10), d(2024, 3, 12)),
        ];
        let stats = LoanHistoryStats::compute(&loans, d(2024, 3, 1));
        assert_eq!(stats.total, 4);
        assert_eq!(stats.returned, 2);
        assert_eq!(stats.average_duration_days, 5.0);
        assert_eq!(stats.on_time_rate, 50.0);
        assert_eq!(stats.currently_overdue, 1);
    }

    #[test]
    fn test_stats_rounding() {
        let loans = vec![
            returned(1, d(2024, 1, 1), d(2024, 1, 5), d(2024, 1, 2)),
            returned(2, d(2024, 1, 1), d(2024, 1, 5), d(2024, 1, 3)),
            returned(3, d(2024, 1, 1), d(2024, 1, 1), d(2024, 1, 3)),
        ];
        let stats = LoanHistoryStats::compute(&loans, d(2024, 3, 1));
        assert_eq!(stats.average_duration_days, 1.67);
        assert_eq!(stats.on_time_rate, 66.67);
    }

    #[test]
    fn test_filter_by_date_range_category_status_and_text() {
        let mut laptop = sample(2, LoanStatus::Pending, d(2024, 2, 1), d(2024, 2, 2));
        laptop.equipment_category = "laptop".to_string();
        laptop.equipment_name = "ThinkPad X1".to_string();
        laptop.purpose = Some("Thesis writing".to_string());

        let loans = vec![
            returned(1, d(2024, 1, 1), d(2024, 1, 5), d(2024, 1, 4)),
            laptop,
            sample(3, LoanStatus::Borrowed, d(2024, 3, 1), d(2024, 3, 3)),
        ];

        let jan_feb = LoanHistoryFilter {
            start_date: Some(d(2024, 1, 1)),
            end_date: Some(d(2024, 2, 1)),
            ..Default::default()
        };
        let ids: Vec<i32> = jan_feb.apply(loans.clone()).iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let cameras = LoanHistoryFilter {
            category: Some("Camera".to_string()),
            ..Default::default()
        };
        assert_eq!(cameras.apply(loans.clone()).len(), 2);

        let borrowed = LoanHistoryFilter {
            status: Some(LoanStatus::Borrowed),
            ..Default::default()
        };
        assert_eq!(borrowed.apply(loans.clone())[0].id, 3);

        let thesis = LoanHistoryFilter {
            search: Some("THESIS".to_string()),
            ..Default::default()
        };
        assert_eq!(thesis.apply(loans)[0].id, 2);
    }

    #[test]
    fn test_category_filter_trims_and_folds_case() {
        let mut camera = sample(1, LoanStatus::Returned, d(2024, 1, 1), d(2024, 1, 2));
        camera.equipment_category = "camera".to_string();
        let mut optics = sample(2, LoanStatus::Returned, d(2024, 1, 1), d(2024, 1, 2));
        optics.equipment_category = "\u{c9}quipement optique".to_string();
        let loans = vec![camera, optics];

        let padded = LoanHistoryFilter {
            category: Some("camera ".to_string()),
            ..Default::default()
        };
        let ids: Vec<i32> = padded.apply(loans.clone()).iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1]);

        let accented = LoanHistoryFilter {
            category: Some("\u{e9}quipement OPTIQUE".to_string()),
            ..Default::default()
        };
        let ids: Vec<i32> = accented.apply(loans).iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_filter_rejects_inverted_range() {
        let f = LoanHistoryFilter {
            start_date: Some(d(2024, 2, 1)),
            end_date: Some(d(2024, 1, 1)),
            ..Default::default()
        };
        assert!(f.check().is_err());
    }

    #[test]
    fn test_check_dates() {
        let today = d(2024, 5, 1);
        let req = |b, e| CreateLoanRequest {
            equipment_id: 1,
            borrow_date: b,
            expected_return_date: e,
            purpose: None,
        };

        assert!(req(d(2024, 5, 1), d(2024, 5, 7)).check_dates(today, &policy()).is_ok());
        // past
        assert!(matches!(
            req(d(2024, 4, 30), d(2024, 5, 2)).check_dates(today, &policy()),
            Err(AppError::Validation(_))
        ));
        // inverted
        assert!(matches!(
            req(d(2024, 5, 3), d(2024, 5, 2)).check_dates(today, &policy()),
            Err(AppError::Validation(_))
        ));
        // 8 days > 7
        assert!(matches!(
            req(d(2024, 5, 1), d(2024, 5, 8)).check_dates(today, &policy()),
            Err(AppError::BusinessRule(_))
        ));
        // too far ahead
        assert!(matches!(
            req(d(2024, 5, 16), d(2024, 5, 17)).check_dates(today, &policy()),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_is_late() {
        let today = d(2024, 5, 10);
        assert!(sample(1, LoanStatus::Borrowed, d(2024, 5, 1), d(2024, 5, 9)).is_late(today));
        assert!(!sample(1, LoanStatus::Borrowed, d(2024, 5, 1), d(2024, 5, 10)).is_late(today));
        assert!(sample(1, LoanStatus::Overdue, d(2024, 5, 1), d(2024, 5, 10)).is_late(today));
        assert!(!sample(1, LoanStatus::Approved, d(2024, 5, 1), d(2024, 5, 2)).is_late(today));
    }
}
