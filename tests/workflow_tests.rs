//! Lending workflow tests against a migrated database
//!
//! Each `#[sqlx::test]` gets its own database with the migrations applied.

mod common;

use axum::{http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::PgPool;

use common::{claims, create_equipment, create_user, equipment_data};
use equiplend_server::{
    error::AppError,
    models::{
        bulk::BulkImportRequest,
        enums::{ApprovalStatus, EquipmentStatus, LoanStatus, ReservationStatus, ReturnCondition, UserRole},
        equipment::UpdateEquipment,
        loan_request::{CreateLoanRequest, ReturnLoanRequest},
        reservation::CreateReservation,
        settings::{CategoryPolicy, UpdateSettingsRequest},
        user::RegisterUser,
    },
    services::Services,
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn loan_request(equipment_id: i32, from_days: i64, to_days: i64) -> CreateLoanRequest {
    CreateLoanRequest {
        equipment_id,
        borrow_date: today() + Duration::days(from_days),
        expected_return_date: today() + Duration::days(to_days),
        purpose: None,
    }
}

/// Create, approve and hand out a loan
async fn borrowed_loan(services: &Services, user_id: i32, staff_id: i32, equipment_id: i32, to_days: i64) -> i32 {
    let loan = services
        .loans
        .create(user_id, &loan_request(equipment_id, 0, to_days))
        .await
        .unwrap();
    services.loans.approve(staff_id, loan.id).await.unwrap();
    services.loans.pickup(staff_id, loan.id).await.unwrap();
    loan.id
}

fn good_return() -> ReturnLoanRequest {
    ReturnLoanRequest {
        condition: ReturnCondition::Good,
        notes: None,
    }
}

// ---------------------------------------------------------------------------
// Loan requests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_open_requests_are_capped_by_quota(pool: PgPool) {
    let services = common::services(pool);
    let user = create_user(&services, "quota", UserRole::User, ApprovalStatus::Approved).await;
    let staff = create_user(&services, "desk", UserRole::Staff, ApprovalStatus::Approved).await;

    // default quota is three open requests
    let mut ids = Vec::new();
    for serial in ["Q-1", "Q-2", "Q-3"] {
        let item = create_equipment(&services, serial).await;
        let loan = services.loans.create(user.id, &loan_request(item.id, 0, 1)).await.unwrap();
        ids.push(loan.id);
    }

    let fourth = create_equipment(&services, "Q-4").await;
    let refused = services.loans.create(user.id, &loan_request(fourth.id, 0, 1)).await;
    assert!(matches!(refused, Err(AppError::BusinessRule(_))), "{refused:?}");

    // a rejected request frees its slot
    services.loans.reject(staff.id, ids[0], "Not available").await.unwrap();
    let accepted = services.loans.create(user.id, &loan_request(fourth.id, 0, 1)).await.unwrap();
    assert_eq!(accepted.status, LoanStatus::Pending);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_committed_dates_refuse_overlapping_requests(pool: PgPool) {
    let services = common::services(pool);
    let alice = create_user(&services, "alice", UserRole::User, ApprovalStatus::Approved).await;
    let bob = create_user(&services, "bob", UserRole::User, ApprovalStatus::Approved).await;
    let staff = create_user(&services, "desk", UserRole::Staff, ApprovalStatus::Approved).await;
    let item = create_equipment(&services, "OV-1").await;

    let first = services.loans.create(alice.id, &loan_request(item.id, 1, 3)).await.unwrap();

    // pending requests do not hold the dates
    let competing = services.loans.create(bob.id, &loan_request(item.id, 3, 5)).await.unwrap();

    services.loans.approve(staff.id, first.id).await.unwrap();

    let overlapping = services.loans.create(bob.id, &loan_request(item.id, 2, 4)).await;
    assert!(matches!(overlapping, Err(AppError::BusinessRule(_))), "{overlapping:?}");

    // the competing request shares day 3 with the approved one
    let approval = services.loans.approve(staff.id, competing.id).await;
    assert!(matches!(approval, Err(AppError::BusinessRule(_))), "{approval:?}");

    let after = services.loans.create(bob.id, &loan_request(item.id, 4, 6)).await.unwrap();
    assert_eq!(after.status, LoanStatus::Pending);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_transitions_have_one_winner(pool: PgPool) {
    let services = common::services(pool);
    let user = create_user(&services, "racer", UserRole::User, ApprovalStatus::Approved).await;
    let staff = create_user(&services, "desk", UserRole::Staff, ApprovalStatus::Approved).await;
    let other = create_user(&services, "desk2", UserRole::Staff, ApprovalStatus::Approved).await;
    let item = create_equipment(&services, "RC-1").await;
    let loan = services.loans.create(user.id, &loan_request(item.id, 0, 2)).await.unwrap();

    let (a, b) = tokio::join!(
        services.loans.approve(staff.id, loan.id),
        services.loans.approve(other.id, loan.id)
    );
    let (winners, losers): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(|r| r.is_ok());
    assert_eq!(winners.len(), 1);
    assert!(matches!(losers[0], Err(AppError::InvalidTransition(_))), "{:?}", losers[0]);

    let (a, b) = tokio::join!(
        services.loans.pickup(staff.id, loan.id),
        services.loans.pickup(other.id, loan.id)
    );
    let (winners, losers): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(|r| r.is_ok());
    assert_eq!(winners.len(), 1);
    assert!(matches!(losers[0], Err(AppError::InvalidTransition(_))), "{:?}", losers[0]);

    let loser_response = AppError::InvalidTransition("x".into()).into_response();
    assert_eq!(loser_response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_mark_overdue_moves_only_late_borrowed_loans(pool: PgPool) {
    let services = common::services(pool);
    let user = create_user(&services, "late", UserRole::User, ApprovalStatus::Approved).await;
    let staff = create_user(&services, "desk", UserRole::Staff, ApprovalStatus::Approved).await;

    let due_soon = create_equipment(&services, "OD-1").await;
    let due_later = create_equipment(&services, "OD-2").await;
    let never_picked = create_equipment(&services, "OD-3").await;

    let late = borrowed_loan(&services, user.id, staff.id, due_soon.id, 2).await;
    let on_time = borrowed_loan(&services, user.id, staff.id, due_later.id, 5).await;
    let approved = services
        .loans
        .create(user.id, &loan_request(never_picked.id, 0, 1))
        .await
        .unwrap();
    services.loans.approve(staff.id, approved.id).await.unwrap();

    // due today is not late yet
    let sweep = services.loans.mark_overdue(today() + Duration::days(2), None).await.unwrap();
    assert_eq!(sweep.marked_overdue, 0);

    let sweep = services
        .loans
        .mark_overdue(today() + Duration::days(3), Some(staff.id))
        .await
        .unwrap();
    assert_eq!(sweep.loan_ids, vec![late]);

    let staff_claims = claims(&staff);
    assert_eq!(services.loans.get(&staff_claims, late).await.unwrap().status, LoanStatus::Overdue);
    assert_eq!(services.loans.get(&staff_claims, on_time).await.unwrap().status, LoanStatus::Borrowed);
    assert_eq!(
        services.loans.get(&staff_claims, approved.id).await.unwrap().status,
        LoanStatus::Approved
    );

    // a second sweep finds nothing new
    let again = services.loans.mark_overdue(today() + Duration::days(3), None).await.unwrap();
    assert_eq!(again.marked_overdue, 0);

    // overdue loans can still come back
    let returned = services.loans.process_return(staff.id, late, &good_return()).await.unwrap();
    assert_eq!(returned.status, LoanStatus::Returned);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_return_condition_sets_equipment_status(pool: PgPool) {
    let services = common::services(pool);
    let user = create_user(&services, "careful", UserRole::User, ApprovalStatus::Approved).await;
    let staff = create_user(&services, "desk", UserRole::Staff, ApprovalStatus::Approved).await;

    let cases = [
        ("RT-1", ReturnCondition::Good, EquipmentStatus::Available),
        ("RT-2", ReturnCondition::Damaged, EquipmentStatus::Maintenance),
        ("RT-3", ReturnCondition::Lost, EquipmentStatus::Retired),
    ];
    for (serial, condition, expected) in cases {
        let item = create_equipment(&services, serial).await;
        let loan = borrowed_loan(&services, user.id, staff.id, item.id, 1).await;
        assert_eq!(services.equipment.get(item.id).await.unwrap().status, EquipmentStatus::Borrowed);

        let data = ReturnLoanRequest {
            condition,
            notes: Some("Checked at the counter".to_string()),
        };
        let returned = services.loans.process_return(staff.id, loan, &data).await.unwrap();
        assert_eq!(returned.return_condition, Some(condition));
        assert_eq!(services.equipment.get(item.id).await.unwrap().status, expected);

        let twice = services.loans.process_return(staff.id, loan, &data).await;
        assert!(matches!(twice, Err(AppError::InvalidTransition(_))), "{twice:?}");
    }
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

fn window(base: DateTime<Utc>, equipment_id: i32, from_hours: i64, to_hours: i64) -> CreateReservation {
    CreateReservation {
        equipment_id,
        start_time: base + Duration::hours(from_hours),
        end_time: base + Duration::hours(to_hours),
        purpose: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_reservation_overlap_is_a_conflict(pool: PgPool) {
    let services = common::services(pool);
    let user = create_user(&services, "booker", UserRole::User, ApprovalStatus::Approved).await;
    let item = create_equipment(&services, "RS-1").await;
    let base = Utc::now() + Duration::hours(1);

    let first = services.reservations.create(user.id, &window(base, item.id, 0, 3)).await.unwrap();

    let clash = services.reservations.create(user.id, &window(base, item.id, 2, 5)).await;
    assert!(matches!(clash, Err(AppError::Conflict(_))), "{clash:?}");

    // back-to-back windows do not clash
    services.reservations.create(user.id, &window(base, item.id, 3, 4)).await.unwrap();

    let availability = services
        .reservations
        .availability(item.id, first.start_time, first.end_time)
        .await
        .unwrap();
    assert!(!availability.available);
    assert_eq!(availability.conflicts.len(), 1);

    // a cancelled window is free again
    services.reservations.cancel(&claims(&user), first.id).await.unwrap();
    let rebooked = services.reservations.create(user.id, &window(base, item.id, 1, 2)).await.unwrap();
    assert_eq!(rebooked.status, ReservationStatus::Pending);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_staff_cancel_and_complete_notify_owner(pool: PgPool) {
    let services = common::services(pool);
    let owner = create_user(&services, "owner", UserRole::User, ApprovalStatus::Approved).await;
    let staff = create_user(&services, "desk", UserRole::Staff, ApprovalStatus::Approved).await;
    let item = create_equipment(&services, "RS-2").await;
    let base = Utc::now() + Duration::hours(1);

    let first = services.reservations.create(owner.id, &window(base, item.id, 0, 1)).await.unwrap();
    let second = services.reservations.create(owner.id, &window(base, item.id, 2, 3)).await.unwrap();
    let third = services.reservations.create(owner.id, &window(base, item.id, 4, 5)).await.unwrap();
    assert_eq!(services.notifications.unread_count(owner.id).await.unwrap(), 0);

    services.reservations.approve(staff.id, first.id).await.unwrap();
    services.reservations.complete(staff.id, first.id).await.unwrap();
    assert_eq!(services.notifications.unread_count(owner.id).await.unwrap(), 2);

    services.reservations.cancel(&claims(&staff), second.id).await.unwrap();
    assert_eq!(services.notifications.unread_count(owner.id).await.unwrap(), 3);

    // cancelling your own reservation sends nothing
    services.reservations.cancel(&claims(&owner), third.id).await.unwrap();
    assert_eq!(services.notifications.unread_count(owner.id).await.unwrap(), 3);
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_equipment_with_loan_history_is_kept(pool: PgPool) {
    let services = common::services(pool.clone());
    let user = create_user(&services, "borrower", UserRole::User, ApprovalStatus::Approved).await;
    let admin = create_user(&services, "admin", UserRole::Admin, ApprovalStatus::Approved).await;
    let lent = create_equipment(&services, "DL-1").await;
    let unused = create_equipment(&services, "DL-2").await;

    let loan = borrowed_loan(&services, user.id, admin.id, lent.id, 1).await;
    services.loans.process_return(admin.id, loan, &good_return()).await.unwrap();

    let refused = services.equipment.delete(admin.id, lent.id).await;
    assert!(matches!(refused, Err(AppError::BusinessRule(_))), "{refused:?}");
    assert_eq!(services.equipment.loan_history(lent.id).await.unwrap().len(), 1);

    let result = services
        .bulk
        .delete_equipment(admin.id, &[lent.id, unused.id, 999_999])
        .await
        .unwrap();
    assert_eq!(result.succeeded, vec![unused.id]);
    let failed: Vec<i32> = result.failed.iter().map(|f| f.id).collect();
    assert_eq!(failed, vec![lent.id, 999_999]);

    // the database refuses it too
    let direct = services.repository.equipment.delete(lent.id).await;
    assert!(matches!(direct, Err(AppError::Conflict(_))), "{direct:?}");

    let returned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loan_requests WHERE status = 'returned'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(returned, 1);

    // retiring is the way out of the catalog
    let retired = services
        .bulk
        .set_equipment_status(admin.id, &[lent.id], EquipmentStatus::Retired)
        .await
        .unwrap();
    assert_eq!(retired.succeeded, vec![lent.id]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_trims_and_folds_catalog_fields(pool: PgPool) {
    let services = common::services(pool);
    let staff = create_user(&services, "staff", UserRole::Staff, ApprovalStatus::Approved).await;
    let item = create_equipment(&services, "UP-1").await;

    let data = UpdateEquipment {
        name: Some("  Studio light ".to_string()),
        category: Some(" Lighting ".to_string()),
        brand: None,
        model: None,
        serial_number: Some(" UP-2 ".to_string()),
        status: None,
        location: None,
        description: None,
        image_url: None,
    };
    let updated = services.equipment.update(staff.id, item.id, &data).await.unwrap();
    assert_eq!(updated.name, "Studio light");
    assert_eq!(updated.category, "lighting");
    assert_eq!(updated.serial_number, "UP-2");
    assert_eq!(updated.status, EquipmentStatus::Available);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicates_racing_past_the_check_are_conflicts(pool: PgPool) {
    let services = common::services(pool);
    create_equipment(&services, "DUP-1").await;

    let serial = services
        .repository
        .equipment
        .create(&equipment_data(" DUP-1 ", "camera"))
        .await;
    match serial {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "Serial number already exists"),
        other => panic!("expected a conflict, got {other:?}"),
    }

    create_user(&services, "dup", UserRole::User, ApprovalStatus::Pending).await;
    let data = RegisterUser {
        email: "DUP@example.org".to_string(),
        password: common::PASSWORD.to_string(),
        display_name: "Dup".to_string(),
        department: None,
        phone: None,
        student_id: None,
    };
    let email = services
        .repository
        .users
        .create(&data, "hash", UserRole::User, ApprovalStatus::Pending)
        .await;
    match email {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "Email is already registered"),
        other => panic!("expected a conflict, got {other:?}"),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_failed_import_chunk_marks_every_record(pool: PgPool) {
    let services = common::services(pool.clone());
    let admin = create_user(&services, "admin", UserRole::Admin, ApprovalStatus::Approved).await;

    sqlx::query("ALTER TABLE equipment ADD CONSTRAINT equipment_name_not_broken CHECK (name <> 'Broken')")
        .execute(&pool)
        .await
        .unwrap();

    let mut records: Vec<_> = (0..503).map(|i| equipment_data(&format!("IMP-{i}"), "tripod")).collect();
    records[501].name = "Broken".to_string();

    let result = services
        .bulk
        .import_equipment(admin.id, &BulkImportRequest { records })
        .await
        .unwrap();

    assert_eq!(result.succeeded.len(), 500);
    let failed: Vec<i32> = result.failed.iter().map(|f| f.id).collect();
    assert_eq!(failed, vec![500, 501, 502]);
    assert!(result.failed.iter().all(|f| f.error == "Database error"));

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM equipment")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 500);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_bulk_approval_reports_each_request(pool: PgPool) {
    let services = common::services(pool);
    let user = create_user(&services, "many", UserRole::User, ApprovalStatus::Approved).await;
    let staff = create_user(&services, "desk", UserRole::Staff, ApprovalStatus::Approved).await;
    let a = create_equipment(&services, "BA-1").await;
    let b = create_equipment(&services, "BA-2").await;

    let pending = services.loans.create(user.id, &loan_request(a.id, 0, 1)).await.unwrap();
    let approved = services.loans.create(user.id, &loan_request(b.id, 0, 1)).await.unwrap();
    services.loans.approve(staff.id, approved.id).await.unwrap();

    let result = services
        .bulk
        .approve_loans(staff.id, &[pending.id, approved.id, 999_999, pending.id])
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec![pending.id]);
    let failed: Vec<i32> = result.failed.iter().map(|f| f.id).collect();
    assert_eq!(failed, vec![approved.id, 999_999]);
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_category_override_removal_ignores_case(pool: PgPool) {
    let services = common::services(pool);
    let admin = create_user(&services, "admin", UserRole::Admin, ApprovalStatus::Approved).await;

    let saved = services
        .settings
        .update_settings(
            admin.id,
            UpdateSettingsRequest {
                loan_policy: None,
                category_policies: Some(vec![CategoryPolicy {
                    category: "Camera".to_string(),
                    max_loan_days: Some(2),
                    max_active_loans: None,
                    max_advance_days: None,
                }]),
                remove_categories: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(saved.category_policies.len(), 1);
    assert_eq!(saved.category_policies[0].category, "camera");
    assert_eq!(services.settings.effective_policy("CAMERA").await.unwrap().max_loan_days, 2);

    let cleared = services
        .settings
        .update_settings(
            admin.id,
            UpdateSettingsRequest {
                loan_policy: None,
                category_policies: None,
                remove_categories: Some(vec!["  Camera ".to_string()]),
            },
        )
        .await
        .unwrap();
    assert!(cleared.category_policies.is_empty());
}
