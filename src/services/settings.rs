//! Lending policy settings

use serde_json::json;

use super::audit::AuditService;
use crate::{
    config::LoansConfig,
    error::AppResult,
    models::{
        audit::NewAuditEntry,
        settings::{LoanPolicy, SettingsResponse, UpdateSettingsRequest},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct SettingsService {
    repository: Repository,
    defaults: LoanPolicy,
    audit: AuditService,
}

impl SettingsService {
    pub fn new(repository: Repository, config: &LoansConfig, audit: AuditService) -> Self {
        Self {
            repository,
            defaults: LoanPolicy::from(config),
            audit,
        }
    }

    /// Global policy, falling back to the configured defaults
    pub async fn loan_policy(&self) -> AppResult<LoanPolicy> {
        Ok(self
            .repository
            .settings
            .get_loan_policy()
            .await?
            .map(|(policy, _)| policy)
            .unwrap_or(self.defaults))
    }

    /// Policy in force for equipment of `category`
    pub async fn effective_policy(&self, category: &str) -> AppResult<LoanPolicy> {
        let global = self.loan_policy().await?;
        let category_policy = self.repository.settings.category_policy(category).await?;
        Ok(global.effective(category_policy.as_ref()))
    }

    pub async fn get_settings(&self) -> AppResult<SettingsResponse> {
        let stored = self.repository.settings.get_loan_policy().await?;
        let category_policies = self.repository.settings.category_policies().await?;
        Ok(SettingsResponse {
            loan_policy: stored.map(|(p, _)| p).unwrap_or(self.defaults),
            category_policies,
            updated_at: stored.map(|(_, at)| at),
        })
    }

    pub async fn update_settings(&self, actor_id: i32, request: UpdateSettingsRequest) -> AppResult<SettingsResponse> {
        if let Some(ref policy) = request.loan_policy {
            self.repository.settings.upsert_loan_policy(policy).await?;
        }

        let upserts = request.category_policies.unwrap_or_default();
        let removals = request.remove_categories.unwrap_or_default();
        if !upserts.is_empty() || !removals.is_empty() {
            self.repository
                .settings
                .save_category_policies(&upserts, &removals)
                .await?;
        }

        tracing::info!(actor_id, "Lending policy updated");
        self.audit
            .record(
                NewAuditEntry::new(Some(actor_id), "update_settings", "settings", None).with_details(json!({
                    "loan_policy": request.loan_policy,
                    "category_policies": upserts,
                    "removed_categories": removals,
                })),
            )
            .await;

        self.get_settings().await
    }
}
