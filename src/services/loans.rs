//! Loan request workflow
//!
//! Every staff transition leaves three traces: a staff activity entry, an
//! audit entry and a notification to the borrower.

use chrono::{NaiveDate, Utc};
use serde_json::json;

use super::{
    audit::AuditService,
    notifications::{NotificationsService, Recipient},
    settings::SettingsService,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        audit::NewAuditEntry,
        enums::{NotificationKind, StaffAction},
        loan_request::{
            CreateLoanRequest, LoanHistoryFilter, LoanHistoryResponse, LoanHistoryStats, LoanRequest,
            LoanRequestQuery, OverdueSweepResult, ReturnLoanRequest,
        },
        user::UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    settings: SettingsService,
    audit: AuditService,
    notifications: NotificationsService,
}

impl LoansService {
    pub fn new(
        repository: Repository,
        settings: SettingsService,
        audit: AuditService,
        notifications: NotificationsService,
    ) -> Self {
        Self {
            repository,
            settings,
            audit,
            notifications,
        }
    }

    /// Submit a loan request for the caller
    pub async fn create(&self, user_id: i32, data: &CreateLoanRequest) -> AppResult<LoanRequest> {
        let equipment = self.repository.equipment.get_by_id(data.equipment_id).await?;
        let policy = self.settings.effective_policy(&equipment.category).await?;
        data.check_dates(Utc::now().date_naive(), &policy)?;

        let loan = self
            .repository
            .loan_requests
            .create(user_id, data, policy.max_active_loans)
            .await?;

        tracing::info!(loan_id = loan.id, user_id, equipment_id = loan.equipment_id, "Loan requested");
        self.audit
            .record(
                NewAuditEntry::new(Some(user_id), "create", "loan_request", Some(loan.id)).with_details(json!({
                    "equipment_id": loan.equipment_id,
                    "borrow_date": loan.borrow_date,
                    "expected_return_date": loan.expected_return_date,
                })),
            )
            .await;
        Ok(loan)
    }

    /// Get a loan request visible to the caller
    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<LoanRequest> {
        let loan = self.repository.loan_requests.get_by_id(id).await?;
        claims.require_self_or_staff(loan.user_id)?;
        Ok(loan)
    }

    /// Staff see every request, users only their own
    pub async fn list(&self, claims: &UserClaims, mut query: LoanRequestQuery) -> AppResult<(Vec<LoanRequest>, i64)> {
        if !claims.is_staff() {
            query.user_id = Some(claims.user_id);
        }
        self.repository.loan_requests.list(&query).await
    }

    pub async fn approve(&self, staff_id: i32, id: i32) -> AppResult<LoanRequest> {
        let loan = self.repository.loan_requests.approve(id, staff_id).await?;
        self.announce_approval(staff_id, &loan).await;
        Ok(loan)
    }

    pub async fn reject(&self, staff_id: i32, id: i32, reason: &str) -> AppResult<LoanRequest> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation("A rejection reason is required".to_string()));
        }
        let loan = self.repository.loan_requests.reject(id, staff_id, reason).await?;
        self.announce_rejection(staff_id, &loan, reason).await;
        Ok(loan)
    }

    pub(crate) async fn announce_approval(&self, staff_id: i32, loan: &LoanRequest) {
        tracing::info!(loan_id = loan.id, staff_id, "Loan request approved");
        self.record_transition(staff_id, StaffAction::Approve, loan, None).await;
        self.notify(
            loan,
            NotificationKind::LoanApproved,
            "Loan request approved",
            &format!(
                "Your request for {} from {} to {} was approved. Please pick it up on the borrow date.",
                loan.equipment_name, loan.borrow_date, loan.expected_return_date
            ),
        )
        .await;
    }

    pub(crate) async fn announce_rejection(&self, staff_id: i32, loan: &LoanRequest, reason: &str) {
        tracing::info!(loan_id = loan.id, staff_id, "Loan request rejected");
        self.record_transition(staff_id, StaffAction::Reject, loan, Some(reason)).await;
        self.notify(
            loan,
            NotificationKind::LoanRejected,
            "Loan request rejected",
            &format!("Your request for {} was rejected: {}", loan.equipment_name, reason.trim()),
        )
        .await;
    }

    pub async fn pickup(&self, staff_id: i32, id: i32) -> AppResult<LoanRequest> {
        let loan = self.repository.loan_requests.pickup(id, staff_id).await?;
        tracing::info!(loan_id = id, staff_id, "Equipment picked up");
        self.record_transition(staff_id, StaffAction::Pickup, &loan, None).await;
        self.notify(
            &loan,
            NotificationKind::Info,
            "Equipment picked up",
            &format!(
                "You picked up {}. Please return it by {}.",
                loan.equipment_name, loan.expected_return_date
            ),
        )
        .await;
        Ok(loan)
    }

    pub async fn process_return(&self, staff_id: i32, id: i32, data: &ReturnLoanRequest) -> AppResult<LoanRequest> {
        let loan = self
            .repository
            .loan_requests
            .process_return(id, staff_id, data.condition, data.notes.as_deref())
            .await?;
        tracing::info!(loan_id = id, staff_id, condition = %data.condition, "Equipment returned");
        self.record_transition(staff_id, StaffAction::Return, &loan, data.notes.as_deref())
            .await;
        self.notify(
            &loan,
            NotificationKind::Info,
            "Equipment returned",
            &format!(
                "The return of {} was recorded (condition: {}).",
                loan.equipment_name, data.condition
            ),
        )
        .await;
        Ok(loan)
    }

    /// Move every borrowed request past its expected return date to overdue.
    /// `actor` is the staff member who triggered it, `None` for the background sweep.
    pub async fn mark_overdue(&self, today: NaiveDate, actor: Option<i32>) -> AppResult<OverdueSweepResult> {
        let loans = self.repository.loan_requests.mark_overdue(today).await?;
        if !loans.is_empty() {
            tracing::info!(count = loans.len(), %today, "Loans marked overdue");
        }

        for loan in &loans {
            if let Some(staff_id) = actor {
                self.audit
                    .staff_activity(staff_id, StaffAction::Overdue, Some(loan.id), Some(loan.equipment_id), None)
                    .await;
            }
            self.audit
                .record(
                    NewAuditEntry::new(actor, "mark_overdue", "loan_request", Some(loan.id))
                        .with_details(json!({ "expected_return_date": loan.expected_return_date })),
                )
                .await;
            self.notify(
                loan,
                NotificationKind::LoanOverdue,
                "Loan overdue",
                &format!(
                    "{} was due back on {}. Please return it as soon as possible.",
                    loan.equipment_name, loan.expected_return_date
                ),
            )
            .await;
        }

        Ok(OverdueSweepResult {
            marked_overdue: loans.len(),
            loan_ids: loans.iter().map(|l| l.id).collect(),
        })
    }

    /// Loan history with statistics. Users only see their own history.
    pub async fn history(&self, claims: &UserClaims, mut filter: LoanHistoryFilter) -> AppResult<LoanHistoryResponse> {
        filter.check()?;
        match filter.user_id {
            Some(user_id) => claims.require_self_or_staff(user_id)?,
            None if !claims.is_staff() => filter.user_id = Some(claims.user_id),
            None => {}
        }

        let loans = filter.apply(self.repository.loan_requests.history(&filter).await?);
        let stats = LoanHistoryStats::compute(&loans, Utc::now().date_naive());
        Ok(LoanHistoryResponse { loans, stats })
    }

    async fn record_transition(&self, staff_id: i32, action: StaffAction, loan: &LoanRequest, notes: Option<&str>) {
        self.audit
            .staff_activity(staff_id, action, Some(loan.id), Some(loan.equipment_id), notes)
            .await;
        self.audit
            .record(
                NewAuditEntry::new(Some(staff_id), action.as_str(), "loan_request", Some(loan.id))
                    .with_details(json!({ "status": loan.status, "notes": notes })),
            )
            .await;
    }

    async fn notify(&self, loan: &LoanRequest, kind: NotificationKind, title: &str, message: &str) {
        self.notifications
            .notify(
                Recipient {
                    user_id: loan.user_id,
                    email: &loan.user_email,
                },
                kind,
                title,
                message,
            )
            .await;
    }
}

/// Run the overdue sweep every `interval_secs` seconds until the runtime shuts down
pub fn spawn_overdue_sweep(loans: LoansService, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match loans.mark_overdue(Utc::now().date_naive(), None).await {
                Ok(result) => tracing::debug!(marked = result.marked_overdue, "Overdue sweep finished"),
                Err(e) => tracing::error!("Overdue sweep failed: {}", e),
            }
        }
    })
}
