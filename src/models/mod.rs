//! Data models

pub mod audit;
pub mod bulk;
pub mod enums;
pub mod equipment;
pub mod loan_request;
pub mod notification;
pub mod report;
pub mod reservation;
pub mod saved_search;
pub mod settings;
pub mod user;

// Re-export commonly used types
pub use enums::{
    ApprovalStatus, EquipmentStatus, LoanStatus, NotificationKind, ReservationStatus,
    ReturnCondition, StaffAction, UserRole, UtilizationClass,
};
pub use equipment::Equipment;
pub use loan_request::LoanRequest;
pub use reservation::Reservation;
pub use user::{User, UserShort};
