//! Audit trail
//!
//! Writes never fail the operation being audited: errors are logged and dropped.

use crate::{
    error::AppResult,
    models::{
        audit::{AuditLogEntry, AuditQuery, NewAuditEntry, StaffActivity, StaffActivityQuery},
        enums::StaffAction,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuditService {
    repository: Repository,
}

impl AuditService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn record(&self, entry: NewAuditEntry) {
        if let Err(e) = self.repository.audit.record(&entry).await {
            tracing::warn!(
                action = entry.action,
                entity_type = entry.entity_type,
                entity_id = ?entry.entity_id,
                "Failed to write audit log: {}",
                e
            );
        }
    }

    pub async fn staff_activity(
        &self,
        staff_id: i32,
        action: StaffAction,
        loan_request_id: Option<i32>,
        equipment_id: Option<i32>,
        notes: Option<&str>,
    ) {
        if let Err(e) = self
            .repository
            .audit
            .record_staff_activity(staff_id, action, loan_request_id, equipment_id, notes)
            .await
        {
            tracing::warn!(staff_id, %action, "Failed to write staff activity: {}", e);
        }
    }

    pub async fn list(&self, query: &AuditQuery) -> AppResult<(Vec<AuditLogEntry>, i64)> {
        self.repository.audit.list(query).await
    }

    pub async fn list_staff_activity(
        &self,
        query: &StaffActivityQuery,
    ) -> AppResult<(Vec<StaffActivity>, i64)> {
        self.repository.audit.list_staff_activity(query).await
    }
}
