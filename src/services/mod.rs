//! Business logic services

pub mod audit;
pub mod bulk;
pub mod email;
pub mod equipment;
pub mod export;
pub mod loans;
pub mod notifications;
pub mod reports;
pub mod reservations;
pub mod saved_searches;
pub mod settings;
pub mod users;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub equipment: equipment::EquipmentService,
    pub loans: loans::LoansService,
    pub reservations: reservations::ReservationsService,
    pub saved_searches: saved_searches::SavedSearchesService,
    pub notifications: notifications::NotificationsService,
    pub audit: audit::AuditService,
    pub reports: reports::ReportsService,
    pub bulk: bulk::BulkService,
    pub settings: settings::SettingsService,
    pub email: email::EmailService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let email = email::EmailService::new(config.email.clone());
        let audit = audit::AuditService::new(repository.clone());
        let notifications = notifications::NotificationsService::new(
            repository.clone(),
            email.clone(),
            config.reports.utc_offset_hours,
        );
        let settings = settings::SettingsService::new(repository.clone(), &config.loans, audit.clone());
        let loans = loans::LoansService::new(
            repository.clone(),
            settings.clone(),
            audit.clone(),
            notifications.clone(),
        );

        Self {
            users: users::UsersService::new(repository.clone(), config.auth.clone(), audit.clone()),
            equipment: equipment::EquipmentService::new(repository.clone(), audit.clone()),
            reservations: reservations::ReservationsService::new(
                repository.clone(),
                settings.clone(),
                audit.clone(),
                notifications.clone(),
            ),
            saved_searches: saved_searches::SavedSearchesService::new(repository.clone()),
            reports: reports::ReportsService::new(repository.clone(), config.reports.clone()),
            bulk: bulk::BulkService::new(repository.clone(), loans.clone(), audit.clone()),
            loans,
            notifications,
            audit,
            settings,
            email,
            repository,
        }
    }
}
