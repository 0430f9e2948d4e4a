//! Reporting types and the equipment utilization classifier

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::enums::{EquipmentStatus, UtilizationClass};

/// Thresholds driving the classifier
#[derive(Debug, Clone, Copy)]
pub struct UtilizationThresholds {
    pub high_demand_rate: f64,
    pub idle_days: i64,
}

impl From<&crate::config::ReportsConfig> for UtilizationThresholds {
    fn from(config: &crate::config::ReportsConfig) -> Self {
        Self {
            high_demand_rate: config.high_demand_threshold,
            idle_days: config.idle_days,
        }
    }
}

/// Clamp a rate into `[0, 1]`, non-finite values count as 0
pub fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Classify an item from its utilization rate and the days since it was last on loan
/// (`None` when it never was).
pub fn classify_utilization(
    rate: f64,
    days_since_last_use: Option<i64>,
    thresholds: &UtilizationThresholds,
) -> UtilizationClass {
    let rate = sanitize_rate(rate);
    if rate >= thresholds.high_demand_rate {
        return UtilizationClass::HighDemand;
    }
    match days_since_last_use {
        None => UtilizationClass::Idle,
        Some(days) if days >= thresholds.idle_days => UtilizationClass::Idle,
        Some(_) => UtilizationClass::Normal,
    }
}

/// Fraction of `[window_start, window_end)` covered by the loan periods.
/// Open periods (no end) run until `window_end`; overlapping periods are
/// counted once.
pub fn utilization_rate(
    periods: &[(DateTime<Utc>, Option<DateTime<Utc>>)],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> f64 {
    let window = (window_end - window_start).num_seconds();
    if window <= 0 {
        return 0.0;
    }

    let mut clipped: Vec<(DateTime<Utc>, DateTime<Utc>)> = periods
        .iter()
        .filter_map(|&(start, end)| {
            let start = start.max(window_start);
            let end = end.unwrap_or(window_end).min(window_end);
            (start < end).then_some((start, end))
        })
        .collect();
    clipped.sort();

    let mut covered = 0i64;
    let mut current: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for (start, end) in clipped {
        current = match current {
            Some((cs, ce)) if start <= ce => Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                covered += (ce - cs).num_seconds();
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((cs, ce)) = current {
        covered += (ce - cs).num_seconds();
    }

    sanitize_rate(covered as f64 / window as f64)
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UtilizationQuery {
    /// Window length in days ending now
    pub window_days: Option<i64>,
    pub category: Option<String>,
    pub class: Option<UtilizationClass>,
}

/// Utilization of one equipment item
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UtilizationEntry {
    pub equipment_id: i32,
    pub name: String,
    pub category: String,
    pub serial_number: String,
    pub status: EquipmentStatus,
    /// Fraction of the window spent on loan, in [0, 1]
    pub utilization_rate: f64,
    pub loan_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub days_since_last_use: Option<i64>,
    pub class: UtilizationClass,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UtilizationReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub entries: Vec<UtilizationEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatEntry {
    pub label: String,
    pub value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopEquipment {
    pub equipment_id: i32,
    pub name: String,
    pub category: String,
    pub loan_count: i64,
}

/// Dashboard summary
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub equipment_total: i64,
    pub equipment_by_status: Vec<StatEntry>,
    pub equipment_by_category: Vec<StatEntry>,
    pub loans_by_status: Vec<StatEntry>,
    pub overdue_loans: i64,
    pub pending_loan_requests: i64,
    pub pending_reservations: i64,
    pub users_pending_approval: i64,
    pub top_equipment: Vec<TopEquipment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const T: UtilizationThresholds = UtilizationThresholds {
        high_demand_rate: 0.7,
        idle_days: 30,
    };

    #[test]
    fn test_classifier_boundaries() {
        assert_eq!(classify_utilization(0.7, Some(0), &T), UtilizationClass::HighDemand);
        assert_eq!(classify_utilization(0.69, Some(0), &T), UtilizationClass::Normal);
        assert_eq!(classify_utilization(0.2, Some(29), &T), UtilizationClass::Normal);
        assert_eq!(classify_utilization(0.2, Some(30), &T), UtilizationClass::Idle);
        assert_eq!(classify_utilization(0.0, None, &T), UtilizationClass::Idle);
        // high demand wins over idleness
        assert_eq!(classify_utilization(0.9, Some(45), &T), UtilizationClass::HighDemand);
    }

    #[test]
    fn test_classifier_sanitizes_input() {
        assert_eq!(classify_utilization(f64::NAN, Some(1), &T), UtilizationClass::Normal);
        assert_eq!(classify_utilization(f64::INFINITY, Some(1), &T), UtilizationClass::Normal);
        assert_eq!(classify_utilization(3.5, Some(1), &T), UtilizationClass::HighDemand);
        assert_eq!(sanitize_rate(-0.5), 0.0);
        assert_eq!(sanitize_rate(1.5), 1.0);
    }

    #[test]
    fn test_rate_is_bounded_for_arbitrary_inputs() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(10);
        for offset in -15i64..15 {
            for len in 0i64..25 {
                let p0 = start + Duration::days(offset);
                let periods = [(p0, Some(p0 + Duration::days(len))), (p0, None)];
                let rate = utilization_rate(&periods, start, end);
                assert!((0.0..=1.0).contains(&rate), "rate {} out of bounds", rate);
            }
        }
    }

    #[test]
    fn test_rate_counts_overlaps_once_and_clips() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(10);
        let day = |n: i64| start + Duration::days(n);

        // days 0-2 and 1-4 overlap: 4 days covered
        let periods = [(day(0), Some(day(2))), (day(1), Some(day(4)))];
        assert!((utilization_rate(&periods, start, end) - 0.4).abs() < 1e-9);

        // started before the window, still open: days 0-10
        let periods = [(day(-5), None)];
        assert_eq!(utilization_rate(&periods, start, end), 1.0);

        // entirely before the window
        let periods = [(day(-5), Some(day(-1)))];
        assert_eq!(utilization_rate(&periods, start, end), 0.0);

        assert_eq!(utilization_rate(&[], start, end), 0.0);
        assert_eq!(utilization_rate(&periods, end, start), 0.0);
    }
}
