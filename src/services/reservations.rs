//! Reservation workflow

use chrono::Utc;
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
        enums::{NotificationKind, ReservationStatus},
        reservation::{AvailabilityResponse, CreateReservation, Reservation, ReservationQuery},
        user::UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
    settings: SettingsService,
    audit: AuditService,
    notifications: NotificationsService,
}

impl ReservationsService {
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

    pub async fn create(&self, user_id: i32, data: &CreateReservation) -> AppResult<Reservation> {
        let equipment = self.repository.equipment.get_by_id(data.equipment_id).await?;
        let policy = self.settings.effective_policy(&equipment.category).await?;
        data.check_window(Utc::now(), &policy)?;

        let reservation = self.repository.reservations.create(user_id, data).await?;
        tracing::info!(reservation_id = reservation.id, user_id, "Reservation requested");
        self.audit
            .record(
                NewAuditEntry::new(Some(user_id), "create", "reservation", Some(reservation.id)).with_details(json!({
                    "equipment_id": reservation.equipment_id,
                    "start_time": reservation.start_time,
                    "end_time": reservation.end_time,
                })),
            )
            .await;
        Ok(reservation)
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<Reservation> {
        let reservation = self.repository.reservations.get_by_id(id).await?;
        claims.require_self_or_staff(reservation.user_id)?;
        Ok(reservation)
    }

    pub async fn list(&self, claims: &UserClaims, mut query: ReservationQuery) -> AppResult<(Vec<Reservation>, i64)> {
        if !claims.is_staff() {
            query.user_id = Some(claims.user_id);
        }
        self.repository.reservations.list(&query).await
    }

    /// Whether `[start, end)` is free on the item
    pub async fn availability(
        &self,
        equipment_id: i32,
        start: chrono::DateTime<Utc>,
        end: chrono::DateTime<Utc>,
    ) -> AppResult<AvailabilityResponse> {
        if start >= end {
            return Err(AppError::Validation("end_time must be after start_time".to_string()));
        }
        self.repository.equipment.get_by_id(equipment_id).await?;
        let conflicts = self
            .repository
            .reservations
            .conflicts(equipment_id, start, end)
            .await?;
        Ok(AvailabilityResponse {
            equipment_id,
            available: conflicts.is_empty(),
            conflicts,
        })
    }

    pub async fn approve(&self, staff_id: i32, id: i32) -> AppResult<Reservation> {
        let reservation = self
            .repository
            .reservations
            .transition(id, ReservationStatus::Approved, Some(staff_id), None)
            .await?;
        self.after_transition(staff_id, &reservation, None).await;
        self.notify(
            &reservation,
            NotificationKind::ReservationApproved,
            "Reservation approved",
            &format!(
                "Your reservation of {} starting {} was approved.",
                reservation.equipment_name,
                reservation.start_time.format("%Y-%m-%d %H:%M UTC")
            ),
        )
        .await;
        Ok(reservation)
    }

    pub async fn reject(&self, staff_id: i32, id: i32, reason: &str) -> AppResult<Reservation> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation("A rejection reason is required".to_string()));
        }
        let reservation = self
            .repository
            .reservations
            .transition(id, ReservationStatus::Rejected, Some(staff_id), Some(reason.trim()))
            .await?;
        self.after_transition(staff_id, &reservation, Some(reason)).await;
        self.notify(
            &reservation,
            NotificationKind::ReservationRejected,
            "Reservation rejected",
            &format!(
                "Your reservation of {} was rejected: {}",
                reservation.equipment_name,
                reason.trim()
            ),
        )
        .await;
        Ok(reservation)
    }

    /// Cancel a reservation, by its owner or by staff
    pub async fn cancel(&self, claims: &UserClaims, id: i32) -> AppResult<Reservation> {
        let current = self.repository.reservations.get_by_id(id).await?;
        claims.require_self_or_staff(current.user_id)?;
        let reviewer = claims.is_staff().then_some(claims.user_id);
        let reservation = self
            .repository
            .reservations
            .transition(id, ReservationStatus::Cancelled, reviewer, None)
            .await?;
        self.after_transition(claims.user_id, &reservation, None).await;
        if reservation.user_id != claims.user_id {
            self.notify(
                &reservation,
                NotificationKind::Info,
                "Reservation cancelled",
                &format!(
                    "Your reservation of {} starting {} was cancelled by staff.",
                    reservation.equipment_name,
                    reservation.start_time.format("%Y-%m-%d %H:%M UTC")
                ),
            )
            .await;
        }
        Ok(reservation)
    }

    pub async fn complete(&self, staff_id: i32, id: i32) -> AppResult<Reservation> {
        let reservation = self
            .repository
            .reservations
            .transition(id, ReservationStatus::Completed, Some(staff_id), None)
            .await?;
        self.after_transition(staff_id, &reservation, None).await;
        if reservation.user_id != staff_id {
            self.notify(
                &reservation,
                NotificationKind::Info,
                "Reservation completed",
                &format!("Your reservation of {} is complete.", reservation.equipment_name),
            )
            .await;
        }
        Ok(reservation)
    }

    async fn after_transition(&self, actor_id: i32, reservation: &Reservation, reason: Option<&str>) {
        tracing::info!(
            reservation_id = reservation.id,
            actor_id,
            status = %reservation.status,
            "Reservation updated"
        );
        self.audit
            .record(
                NewAuditEntry::new(Some(actor_id), reservation.status.as_str(), "reservation", Some(reservation.id))
                    .with_details(json!({ "reason": reason })),
            )
            .await;
    }

    async fn notify(&self, reservation: &Reservation, kind: NotificationKind, title: &str, message: &str) {
        match self.repository.users.get_by_id(reservation.user_id).await {
            Ok(user) => {
                self.notifications
                    .notify(
                        Recipient {
                            user_id: user.id,
                            email: &user.email,
                        },
                        kind,
                        title,
                        message,
                    )
                    .await
            }
            Err(e) => tracing::warn!(reservation_id = reservation.id, "Cannot notify owner: {}", e),
        }
    }
}
