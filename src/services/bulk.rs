//! Bulk operations
//!
//! Ids are processed in chunks of `BULK_CHUNK_SIZE`, each chunk in its own
//! transaction. A chunk whose transaction fails marks all of its items failed
//! and processing moves on to the next chunk.

use serde_json::json;

use super::{audit::AuditService, loans::LoansService};
use crate::{
    error::{AppError, AppResult},
    models::{
        audit::NewAuditEntry,
        bulk::{dedup_ids, BulkImportRequest, BulkResult, BULK_CHUNK_SIZE},
        enums::EquipmentStatus,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BulkService {
    repository: Repository,
    loans: LoansService,
    audit: AuditService,
}

impl BulkService {
    pub fn new(repository: Repository, loans: LoansService, audit: AuditService) -> Self {
        Self {
            repository,
            loans,
            audit,
        }
    }

    pub async fn set_equipment_status(
        &self,
        actor_id: i32,
        ids: &[i32],
        status: EquipmentStatus,
    ) -> AppResult<BulkResult> {
        let mut result = BulkResult::default();
        for chunk in dedup_ids(ids).chunks(BULK_CHUNK_SIZE) {
            match self.repository.equipment.bulk_set_status(chunk, status).await {
                Ok(updated) => result.settle(chunk, &updated, "Equipment not found"),
                Err(e) => chunk_failed(&mut result, chunk, e),
            }
        }
        self.summarize(actor_id, "bulk_set_status", "equipment", &result, json!({ "status": status }))
            .await;
        Ok(result)
    }

    pub async fn delete_equipment(&self, actor_id: i32, ids: &[i32]) -> AppResult<BulkResult> {
        let mut result = BulkResult::default();
        for chunk in dedup_ids(ids).chunks(BULK_CHUNK_SIZE) {
            match self.repository.equipment.bulk_delete(chunk).await {
                Ok(deleted) => result.settle(chunk, &deleted, "Equipment not found or has a loan history"),
                Err(e) => chunk_failed(&mut result, chunk, e),
            }
        }
        self.summarize(actor_id, "bulk_delete", "equipment", &result, json!({})).await;
        Ok(result)
    }

    /// Import equipment records. Failures are keyed by the record's position.
    pub async fn import_equipment(&self, actor_id: i32, request: &BulkImportRequest) -> AppResult<BulkResult> {
        let mut result = BulkResult::default();
        for (chunk_index, chunk) in request.records.chunks(BULK_CHUNK_SIZE).enumerate() {
            let base = (chunk_index * BULK_CHUNK_SIZE) as i32;
            match self.repository.equipment.bulk_create(chunk).await {
                Ok(created) => {
                    for (offset, (record, row)) in chunk.iter().zip(created).enumerate() {
                        match row {
                            Some(equipment) => result.succeeded.push(equipment.id),
                            None => result.fail(
                                base + offset as i32,
                                format!("Serial number {} already exists", record.serial_number.trim()),
                            ),
                        }
                    }
                }
                Err(e) => {
                    let positions: Vec<i32> = (base..base + chunk.len() as i32).collect();
                    chunk_failed(&mut result, &positions, e);
                }
            }
        }
        self.summarize(actor_id, "bulk_import", "equipment", &result, json!({})).await;
        Ok(result)
    }

    pub async fn approve_loans(&self, staff_id: i32, ids: &[i32]) -> AppResult<BulkResult> {
        let mut result = BulkResult::default();
        let mut approved = Vec::new();
        for chunk in dedup_ids(ids).chunks(BULK_CHUNK_SIZE) {
            match self.repository.loan_requests.bulk_approve(chunk, staff_id).await {
                Ok(outcomes) => {
                    for (id, outcome) in outcomes {
                        match outcome {
                            Ok(()) => {
                                result.succeeded.push(id);
                                approved.push(id);
                            }
                            Err(e) => result.fail(id, e.public_message()),
                        }
                    }
                }
                Err(e) => chunk_failed(&mut result, chunk, e),
            }
        }

        for loan in self.repository.loan_requests.get_many(&approved).await? {
            self.loans.announce_approval(staff_id, &loan).await;
        }
        Ok(result)
    }

    pub async fn reject_loans(&self, staff_id: i32, ids: &[i32], reason: &str) -> AppResult<BulkResult> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation("A rejection reason is required".to_string()));
        }

        let mut result = BulkResult::default();
        let mut rejected = Vec::new();
        for chunk in dedup_ids(ids).chunks(BULK_CHUNK_SIZE) {
            match self.repository.loan_requests.bulk_reject(chunk, staff_id, reason).await {
                Ok(done) => {
                    result.settle(chunk, &done, "Loan request not found or cannot be rejected");
                    rejected.extend(done);
                }
                Err(e) => chunk_failed(&mut result, chunk, e),
            }
        }

        for loan in self.repository.loan_requests.get_many(&rejected).await? {
            self.loans.announce_rejection(staff_id, &loan, reason).await;
        }
        Ok(result)
    }

    async fn summarize(
        &self,
        actor_id: i32,
        action: &'static str,
        entity_type: &'static str,
        result: &BulkResult,
        mut details: serde_json::Value,
    ) {
        tracing::info!(
            action,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Bulk operation finished"
        );
        if let Some(map) = details.as_object_mut() {
            map.insert("succeeded".to_string(), json!(result.succeeded));
            map.insert("failed".to_string(), json!(result.failed.len()));
        }
        self.audit
            .record(NewAuditEntry::new(Some(actor_id), action, entity_type, None).with_details(details))
            .await;
    }
}

fn chunk_failed(result: &mut BulkResult, ids: &[i32], error: AppError) {
    tracing::error!(items = ids.len(), "Bulk chunk failed: {}", error);
    result.fail_all(ids, &error.public_message());
}
