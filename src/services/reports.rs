//! Dashboard, utilization report and CSV exports

use chrono::{Duration, Utc};

use super::export::{opt, CsvWriter};
use crate::{
    config::ReportsConfig,
    error::AppResult,
    models::{
        enums::{LoanStatus, ReservationStatus},
        loan_request::{LoanHistoryFilter, LoanRequest},
        report::{
            classify_utilization, utilization_rate, DashboardStats, UtilizationEntry,
            UtilizationQuery, UtilizationReport, UtilizationThresholds,
        },
    },
    repository::Repository,
};

const MAX_WINDOW_DAYS: i64 = 366;

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
    config: ReportsConfig,
}

impl ReportsService {
    pub fn new(repository: Repository, config: ReportsConfig) -> Self {
        Self { repository, config }
    }

    /// Utilization of every item over the last `window_days` days, busiest first
    pub async fn utilization(&self, query: &UtilizationQuery) -> AppResult<UtilizationReport> {
        let window_days = query
            .window_days
            .unwrap_or(self.config.default_window_days)
            .clamp(1, MAX_WINDOW_DAYS);
        let window_end = Utc::now();
        let window_start = window_end - Duration::days(window_days);
        let thresholds = UtilizationThresholds::from(&self.config);

        let equipment = self.repository.equipment.list_all().await?;
        let periods = self
            .repository
            .reports
            .loan_periods(window_start, window_end)
            .await?;
        let last_used = self.repository.reports.last_used(window_end).await?;

        let mut entries: Vec<UtilizationEntry> = equipment
            .into_iter()
            .filter(|e| {
                query
                    .category
                    .as_deref()
                    .map_or(true, |c| e.category.eq_ignore_ascii_case(c.trim()))
            })
            .map(|e| {
                let item_periods = periods.get(&e.id).map(Vec::as_slice).unwrap_or(&[]);
                let rate = utilization_rate(item_periods, window_start, window_end);
                let last_used_at = last_used.get(&e.id).copied();
                let days_since_last_use =
                    last_used_at.map(|at| (window_end - at).num_days().max(0));
                UtilizationEntry {
                    equipment_id: e.id,
                    name: e.name,
                    category: e.category,
                    serial_number: e.serial_number,
                    status: e.status,
                    utilization_rate: (rate * 10_000.0).round() / 10_000.0,
                    loan_count: item_periods.len() as i64,
                    last_used_at,
                    days_since_last_use,
                    class: classify_utilization(rate, days_since_last_use, &thresholds),
                }
            })
            .filter(|entry| query.class.map_or(true, |c| entry.class == c))
            .collect();

        entries.sort_by(|a, b| {
            b.utilization_rate
                .total_cmp(&a.utilization_rate)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(UtilizationReport {
            window_start,
            window_end,
            entries,
        })
    }

    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let equipment_by_status = self.repository.reports.equipment_by_status().await?;
        let equipment_total: i64 = equipment_by_status.iter().map(|s| s.value).sum();

        Ok(DashboardStats {
            equipment_total,
            equipment_by_status,
            equipment_by_category: self.repository.reports.equipment_by_category().await?,
            loans_by_status: self.repository.reports.loans_by_status().await?,
            overdue_loans: self
                .repository
                .loan_requests
                .count_by_status(LoanStatus::Overdue)
                .await?,
            pending_loan_requests: self
                .repository
                .loan_requests
                .count_by_status(LoanStatus::Pending)
                .await?,
            pending_reservations: self
                .repository
                .reservations
                .count_by_status(ReservationStatus::Pending)
                .await?,
            users_pending_approval: self.repository.users.count_pending_approval().await?,
            top_equipment: self.repository.reports.top_equipment(10).await?,
        })
    }

    /// Loan requests matching the history filter, as CSV
    pub async fn loans_csv(&self, filter: &LoanHistoryFilter) -> AppResult<String> {
        filter.check()?;
        let loans = filter.apply(self.repository.loan_requests.history(filter).await?);
        Ok(render_loans(&loans))
    }

    pub async fn equipment_csv(&self) -> AppResult<String> {
        let equipment = self.repository.equipment.list_all().await?;
        let mut w = CsvWriter::new();
        w.write_record([
            "id", "name", "category", "brand", "model", "serial_number", "status", "location",
            "qr_payload", "created_at",
        ]);
        for e in &equipment {
            w.write_record([
                e.id.to_string(),
                e.name.clone(),
                e.category.clone(),
                opt(e.brand.as_deref()),
                opt(e.model.as_deref()),
                e.serial_number.clone(),
                e.status.to_string(),
                opt(e.location.as_deref()),
                e.qr_payload(),
                e.crea_date.to_rfc3339(),
            ]);
        }
        Ok(w.finish())
    }

    pub async fn utilization_csv(&self, query: &UtilizationQuery) -> AppResult<String> {
        let report = self.utilization(query).await?;
        let mut w = CsvWriter::new();
        w.write_record([
            "equipment_id", "name", "category", "serial_number", "status", "utilization_rate",
            "loan_count", "last_used_at", "days_since_last_use", "class",
        ]);
        for e in &report.entries {
            w.write_record([
                e.equipment_id.to_string(),
                e.name.clone(),
                e.category.clone(),
                e.serial_number.clone(),
                e.status.to_string(),
                format!("{:.4}", e.utilization_rate),
                e.loan_count.to_string(),
                opt(e.last_used_at.map(|at| at.to_rfc3339())),
                opt(e.days_since_last_use),
                e.class.to_string(),
            ]);
        }
        Ok(w.finish())
    }
}

fn render_loans(loans: &[LoanRequest]) -> String {
    let mut w = CsvWriter::new();
    w.write_record([
        "id", "status", "equipment", "serial_number", "category", "borrower", "email", "purpose",
        "borrow_date", "expected_return_date", "picked_up_at", "returned_at", "return_condition",
        "rejection_reason",
    ]);
    for l in loans {
        w.write_record([
            l.id.to_string(),
            l.status.to_string(),
            l.equipment_name.clone(),
            l.equipment_serial_number.clone(),
            l.equipment_category.clone(),
            l.user_display_name.clone(),
            l.user_email.clone(),
            opt(l.purpose.as_deref()),
            l.borrow_date.to_string(),
            l.expected_return_date.to_string(),
            opt(l.picked_up_at.map(|at| at.to_rfc3339())),
            opt(l.returned_at.map(|at| at.to_rfc3339())),
            opt(l.return_condition),
            opt(l.rejection_reason.as_deref()),
        ]);
    }
    w.finish()
}
