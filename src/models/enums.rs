//! Shared domain enums
//!
//! All of them are stored as lowercase text columns.

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

use crate::error::AppError;

/// Declares an enum persisted as a text column, with its string form,
/// `Display`/`FromStr` and the SQLx conversions delegating to `String`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }

            /// Text of every variant satisfying `pred`, bound as `status = ANY($n)`
            pub fn texts_where(pred: impl Fn(&$name) -> bool) -> Vec<String> {
                $name::ALL
                    .iter()
                    .copied()
                    .filter(|v| pred(v))
                    .map(|v| v.as_str().to_string())
                    .collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

text_enum! {
    /// Physical state of an equipment item
    pub enum EquipmentStatus {
        Available => "available",
        Borrowed => "borrowed",
        Maintenance => "maintenance",
        Retired => "retired",
    }
}

impl EquipmentStatus {
    /// Whether new loan requests or reservations may target the item
    pub fn accepts_requests(&self) -> bool {
        matches!(self, EquipmentStatus::Available | EquipmentStatus::Borrowed)
    }
}

// ---------------------------------------------------------------------------
// Loan requests
// ---------------------------------------------------------------------------

text_enum! {
    /// Loan request lifecycle
    pub enum LoanStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Borrowed => "borrowed",
        Overdue => "overdue",
        Returned => "returned",
    }
}

impl LoanStatus {
    /// Permitted lifecycle transitions
    pub fn can_transition_to(&self, next: LoanStatus) -> bool {
        use LoanStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Rejected)
                | (Approved, Borrowed)
                | (Borrowed, Overdue)
                | (Borrowed, Returned)
                | (Overdue, Returned)
        )
    }

    /// Statuses from which `next` may be reached
    pub fn sources_of(next: LoanStatus) -> Vec<LoanStatus> {
        LoanStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    /// The equipment is committed to the borrower
    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Borrowed | LoanStatus::Overdue)
    }

    /// Counts against the borrower's quota
    pub fn is_open(&self) -> bool {
        *self == LoanStatus::Pending || self.is_active()
    }

    /// Equipment is with the borrower right now
    pub fn is_out(&self) -> bool {
        matches!(self, LoanStatus::Borrowed | LoanStatus::Overdue)
    }

    /// Equipment physically left the counter
    pub fn was_picked_up(&self) -> bool {
        self.is_out() || *self == LoanStatus::Returned
    }
}

text_enum! {
    /// State of an item when handed back
    pub enum ReturnCondition {
        Good => "good",
        Damaged => "damaged",
        Lost => "lost",
    }
}

impl ReturnCondition {
    pub fn resulting_equipment_status(&self) -> EquipmentStatus {
        match self {
            ReturnCondition::Good => EquipmentStatus::Available,
            ReturnCondition::Damaged => EquipmentStatus::Maintenance,
            ReturnCondition::Lost => EquipmentStatus::Retired,
        }
    }
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

text_enum! {
    pub enum ReservationStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
        Completed => "completed",
    }
}

impl ReservationStatus {
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Cancelled)
                | (Approved, Completed)
        )
    }

    pub fn sources_of(next: ReservationStatus) -> Vec<ReservationStatus> {
        ReservationStatus::ALL
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    /// Holds its time window
    pub fn blocks_window(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Approved)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

text_enum! {
    pub enum UserRole {
        User => "user",
        Staff => "staff",
        Admin => "admin",
    }
}

impl UserRole {
    /// Staff privileges (admins included)
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Staff | UserRole::Admin)
    }
}

text_enum! {
    /// Account approval state, only approved accounts may sign in
    pub enum ApprovalStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Suspended => "suspended",
    }
}

impl ApprovalStatus {
    /// Refuse sign-in and token use for anything but an approved account
    pub fn ensure_can_sign_in(self) -> Result<(), AppError> {
        let message = match self {
            ApprovalStatus::Approved => return Ok(()),
            ApprovalStatus::Pending => "Account is awaiting approval",
            ApprovalStatus::Rejected => "Account registration was rejected",
            ApprovalStatus::Suspended => "Account is suspended",
        };
        Err(AppError::Authentication(message.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Logs, notifications, reports
// ---------------------------------------------------------------------------

text_enum! {
    pub enum StaffAction {
        Approve => "approve",
        Reject => "reject",
        Pickup => "pickup",
        Return => "return",
        Overdue => "overdue",
    }
}

text_enum! {
    pub enum NotificationKind {
        Info => "info",
        Warning => "warning",
        LoanApproved => "loan_approved",
        LoanRejected => "loan_rejected",
        LoanOverdue => "loan_overdue",
        ReservationApproved => "reservation_approved",
        ReservationRejected => "reservation_rejected",
    }
}

text_enum! {
    pub enum UtilizationClass {
        HighDemand => "high_demand",
        Idle => "idle",
        Normal => "normal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_lifecycle_transitions() {
        assert!(LoanStatus::Pending.can_transition_to(LoanStatus::Approved));
        assert!(LoanStatus::Pending.can_transition_to(LoanStatus::Rejected));
        assert!(LoanStatus::Approved.can_transition_to(LoanStatus::Borrowed));
        assert!(LoanStatus::Borrowed.can_transition_to(LoanStatus::Overdue));
        assert!(LoanStatus::Overdue.can_transition_to(LoanStatus::Returned));

        assert!(!LoanStatus::Pending.can_transition_to(LoanStatus::Borrowed));
        assert!(!LoanStatus::Returned.can_transition_to(LoanStatus::Borrowed));
        assert!(!LoanStatus::Rejected.can_transition_to(LoanStatus::Approved));
        assert!(!LoanStatus::Overdue.can_transition_to(LoanStatus::Borrowed));
    }

    #[test]
    fn test_sources_of_returned() {
        let sources = LoanStatus::sources_of(LoanStatus::Returned);
        assert_eq!(sources, vec![LoanStatus::Borrowed, LoanStatus::Overdue]);
        assert!(LoanStatus::sources_of(LoanStatus::Pending).is_empty());
    }

    #[test]
    fn test_open_and_active() {
        assert!(LoanStatus::Pending.is_open());
        assert!(!LoanStatus::Pending.is_active());
        assert!(LoanStatus::Overdue.is_active());
        assert!(!LoanStatus::Returned.is_open());
        assert!(!LoanStatus::Rejected.is_open());
    }

    #[test]
    fn test_status_lists_for_queries() {
        assert_eq!(
            LoanStatus::texts_where(LoanStatus::is_open),
            vec!["pending", "approved", "borrowed", "overdue"]
        );
        assert_eq!(
            LoanStatus::texts_where(LoanStatus::is_active),
            vec!["approved", "borrowed", "overdue"]
        );
        assert_eq!(LoanStatus::texts_where(LoanStatus::is_out), vec!["borrowed", "overdue"]);
        assert_eq!(
            LoanStatus::texts_where(LoanStatus::was_picked_up),
            vec!["borrowed", "overdue", "returned"]
        );
        assert_eq!(
            ReservationStatus::texts_where(ReservationStatus::blocks_window),
            vec!["pending", "approved"]
        );
    }

    #[test]
    fn test_reservation_transitions() {
        assert!(ReservationStatus::Approved.can_transition_to(ReservationStatus::Completed));
        assert!(!ReservationStatus::Cancelled.can_transition_to(ReservationStatus::Approved));
        assert!(ReservationStatus::Pending.blocks_window());
        assert!(!ReservationStatus::Rejected.blocks_window());
    }

    #[test]
    fn test_text_round_trip_and_case() {
        assert_eq!("HIGH_DEMAND".parse::<UtilizationClass>(), Ok(UtilizationClass::HighDemand));
        assert_eq!(" overdue ".parse::<LoanStatus>(), Ok(LoanStatus::Overdue));
        assert!("lent".parse::<LoanStatus>().is_err());
        assert_eq!(NotificationKind::LoanApproved.to_string(), "loan_approved");
    }

    #[test]
    fn test_serde_matches_storage_text() {
        for kind in NotificationKind::ALL {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_return_condition_sets_equipment_status() {
        assert_eq!(ReturnCondition::Good.resulting_equipment_status(), EquipmentStatus::Available);
        assert_eq!(ReturnCondition::Damaged.resulting_equipment_status(), EquipmentStatus::Maintenance);
        assert_eq!(ReturnCondition::Lost.resulting_equipment_status(), EquipmentStatus::Retired);
    }
}
