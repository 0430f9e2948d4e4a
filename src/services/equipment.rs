//! Equipment catalog service

use serde_json::json;
use uuid::Uuid;

use super::audit::AuditService;
use crate::{
    error::{AppError, AppResult},
    models::{
        audit::NewAuditEntry,
        equipment::{
            CategoryCount, CreateEquipment, Equipment, EquipmentQr, EquipmentSearchCriteria,
            UpdateEquipment,
        },
        loan_request::LoanRequest,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
    audit: AuditService,
}

impl EquipmentService {
    pub fn new(repository: Repository, audit: AuditService) -> Self {
        Self { repository, audit }
    }

    pub async fn search(&self, criteria: &EquipmentSearchCriteria) -> AppResult<(Vec<Equipment>, i64)> {
        self.repository.equipment.search(criteria).await
    }

    pub async fn get(&self, id: i32) -> AppResult<Equipment> {
        self.repository.equipment.get_by_id(id).await
    }

    pub async fn categories(&self) -> AppResult<Vec<CategoryCount>> {
        self.repository.equipment.categories().await
    }

    pub async fn create(&self, actor_id: i32, data: &CreateEquipment) -> AppResult<Equipment> {
        if self.repository.equipment.serial_exists(&data.serial_number, None).await? {
            return Err(AppError::Conflict(format!(
                "Serial number {} already exists",
                data.serial_number.trim()
            )));
        }

        let equipment = self.repository.equipment.create(data).await?;
        tracing::info!(equipment_id = equipment.id, "Equipment created");
        self.audit
            .record(
                NewAuditEntry::new(Some(actor_id), "create", "equipment", Some(equipment.id))
                    .with_details(json!({ "serial_number": equipment.serial_number })),
            )
            .await;
        Ok(equipment)
    }

    pub async fn update(&self, actor_id: i32, id: i32, data: &UpdateEquipment) -> AppResult<Equipment> {
        if let Some(ref serial) = data.serial_number {
            if self.repository.equipment.serial_exists(serial, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "Serial number {} already exists",
                    serial.trim()
                )));
            }
        }

        let before = self.repository.equipment.get_by_id(id).await?;
        let equipment = self.repository.equipment.update(id, data).await?;
        self.audit
            .record(
                NewAuditEntry::new(Some(actor_id), "update", "equipment", Some(id)).with_details(json!({
                    "status_from": before.status,
                    "status_to": equipment.status,
                })),
            )
            .await;
        Ok(equipment)
    }

    /// Delete an item that was never lent or reserved.
    /// Items with a loan history are kept for statistics and must be retired instead.
    pub async fn delete(&self, actor_id: i32, id: i32) -> AppResult<()> {
        let equipment = self.repository.equipment.get_by_id(id).await?;
        if self.repository.equipment.has_active_loans(id).await? {
            return Err(AppError::BusinessRule(
                "Equipment has active loans and cannot be deleted".to_string(),
            ));
        }
        if self.repository.equipment.has_loan_history(id).await? {
            return Err(AppError::BusinessRule(
                "Equipment has a loan history, retire it instead of deleting it".to_string(),
            ));
        }

        self.repository.equipment.delete(id).await?;
        tracing::info!(equipment_id = id, "Equipment deleted");
        self.audit
            .record(
                NewAuditEntry::new(Some(actor_id), "delete", "equipment", Some(id))
                    .with_details(json!({ "name": equipment.name, "serial_number": equipment.serial_number })),
            )
            .await;
        Ok(())
    }

    pub async fn qr(&self, id: i32) -> AppResult<EquipmentQr> {
        let equipment = self.repository.equipment.get_by_id(id).await?;
        Ok(to_qr(&equipment))
    }

    pub async fn regenerate_qr(&self, actor_id: i32, id: i32) -> AppResult<EquipmentQr> {
        let equipment = self.repository.equipment.regenerate_qr_token(id).await?;
        self.audit
            .record(NewAuditEntry::new(Some(actor_id), "regenerate_qr", "equipment", Some(id)))
            .await;
        Ok(to_qr(&equipment))
    }

    pub async fn lookup_by_qr(&self, token: Uuid) -> AppResult<Equipment> {
        self.repository.equipment.get_by_qr_token(token).await
    }

    pub async fn loan_history(&self, id: i32) -> AppResult<Vec<LoanRequest>> {
        self.repository.equipment.get_by_id(id).await?;
        self.repository.loan_requests.for_equipment(id).await
    }

    /// Recompute statuses from loan requests, returns how many items changed
    pub async fn reconcile_statuses(&self) -> AppResult<u64> {
        let changed = self.repository.equipment.reconcile_statuses().await?;
        tracing::info!(changed, "Equipment statuses reconciled");
        Ok(changed)
    }
}

fn to_qr(equipment: &Equipment) -> EquipmentQr {
    EquipmentQr {
        equipment_id: equipment.id,
        qr_token: equipment.qr_token,
        payload: equipment.qr_payload(),
    }
}
