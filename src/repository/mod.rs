//! Repository layer for database operations

pub mod audit;
pub mod equipment;
pub mod loan_requests;
pub mod notifications;
pub mod reports;
pub mod reservations;
pub mod saved_searches;
pub mod settings;
pub mod users;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub users: users::UsersRepository,
    pub equipment: equipment::EquipmentRepository,
    pub loan_requests: loan_requests::LoanRequestsRepository,
    pub reservations: reservations::ReservationsRepository,
    pub saved_searches: saved_searches::SavedSearchesRepository,
    pub notifications: notifications::NotificationsRepository,
    pub audit: audit::AuditRepository,
    pub settings: settings::SettingsRepository,
    pub reports: reports::ReportsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            equipment: equipment::EquipmentRepository::new(pool.clone()),
            loan_requests: loan_requests::LoanRequestsRepository::new(pool.clone()),
            reservations: reservations::ReservationsRepository::new(pool.clone()),
            saved_searches: saved_searches::SavedSearchesRepository::new(pool.clone()),
            notifications: notifications::NotificationsRepository::new(pool.clone()),
            audit: audit::AuditRepository::new(pool.clone()),
            settings: settings::SettingsRepository::new(pool.clone()),
            reports: reports::ReportsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Page and page size from optional query values, page is 1-based
pub(crate) fn paging(page: Option<i64>, per_page: Option<i64>, default_per_page: i64) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, 500);
    (page, per_page, (page - 1) * per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging() {
        assert_eq!(paging(None, None, 20), (1, 20, 0));
        assert_eq!(paging(Some(3), Some(10), 20), (3, 10, 20));
        assert_eq!(paging(Some(-1), Some(0), 20), (1, 1, 0));
        assert_eq!(paging(Some(2), Some(10_000), 20), (2, 500, 500));
    }
}
