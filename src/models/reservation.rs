//! Reservation model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::ReservationStatus;
use super::settings::LoanPolicy;
use crate::error::{AppError, AppResult};

/// Reservation joined with equipment and user names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub equipment_id: i32,
    pub user_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: Option<String>,
    pub status: ReservationStatus,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub equipment_name: String,
    pub user_display_name: String,
}

/// Create reservation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservation {
    pub equipment_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(length(max = 500))]
    pub purpose: Option<String>,
}

impl CreateReservation {
    pub fn check_window(&self, now: DateTime<Utc>, policy: &LoanPolicy) -> AppResult<()> {
        if self.start_time >= self.end_time {
            return Err(AppError::Validation(
                "Reservation must end after it starts".to_string(),
            ));
        }
        if self.start_time < now {
            return Err(AppError::Validation(
                "Reservation cannot start in the past".to_string(),
            ));
        }
        if self.end_time - now > Duration::days(policy.max_advance_days as i64) {
            return Err(AppError::BusinessRule(format!(
                "Reservations must end within {} days from now",
                policy.max_advance_days
            )));
        }
        Ok(())
    }
}

/// Reject reservation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectReservation {
    #[validate(length(min = 1, max = 500, message = "A rejection reason is required"))]
    pub reason: String,
}

/// Query parameters for reservations
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReservationQuery {
    pub equipment_id: Option<i32>,
    pub user_id: Option<i32>,
    pub status: Option<ReservationStatus>,
    /// Only reservations ending after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only reservations starting before this instant
    pub to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Availability query
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub equipment_id: i32,
    pub available: bool,
    /// Reservations holding part of the window
    pub conflicts: Vec<Reservation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> LoanPolicy {
        LoanPolicy {
            max_loan_days: 3,
            max_active_loans: 2,
            max_advance_days: 10,
        }
    }

    #[test]
    fn test_check_window() {
        let now = Utc::now();
        let req = |start, end| CreateReservation {
            equipment_id: 1,
            start_time: start,
            end_time: end,
            purpose: None,
        };

        let ok = req(now + Duration::hours(1), now + Duration::hours(5));
        assert!(ok.check_window(now, &policy()).is_ok());

        let inverted = req(now + Duration::hours(5), now + Duration::hours(1));
        assert!(matches!(inverted.check_window(now, &policy()), Err(AppError::Validation(_))));

        let past = req(now - Duration::hours(1), now + Duration::hours(1));
        assert!(matches!(past.check_window(now, &policy()), Err(AppError::Validation(_))));

        let far = req(now + Duration::days(11), now + Duration::days(12));
        assert!(matches!(far.check_window(now, &policy()), Err(AppError::BusinessRule(_))));

        // longer than a loan is fine as long as the window stays inside the horizon
        let long = req(now + Duration::hours(1), now + Duration::days(4));
        assert!(long.check_window(now, &policy()).is_ok());
    }

    #[test]
    fn test_check_window_bounds_the_end_by_advance_days() {
        let now = Utc::now();
        let req = |start, end| CreateReservation {
            equipment_id: 1,
            start_time: start,
            end_time: end,
            purpose: None,
        };

        let at_horizon = req(now + Duration::days(9), now + Duration::days(10));
        assert!(at_horizon.check_window(now, &policy()).is_ok());

        let past_horizon = req(
            now + Duration::days(9),
            now + Duration::days(10) + Duration::seconds(1),
        );
        assert!(matches!(
            past_horizon.check_window(now, &policy()),
            Err(AppError::BusinessRule(_))
        ));

        // starts early but runs beyond the horizon
        let straddling = req(now + Duration::hours(1), now + Duration::days(16));
        assert!(matches!(
            straddling.check_window(now, &policy()),
            Err(AppError::BusinessRule(_))
        ));
    }
}
