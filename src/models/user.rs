//! User model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{ApprovalStatus, UserRole};
use crate::error::AppError;

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub display_name: String,
    pub role: UserRole,
    pub approval_status: ApprovalStatus,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub student_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Short user representation for lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserShort {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub approval_status: ApprovalStatus,
    pub department: Option<String>,
    /// Pending, approved, borrowed or overdue requests
    pub nb_open_loans: i64,
    pub nb_overdue_loans: i64,
}

/// User query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Search in display name and email
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub approval_status: Option<ApprovalStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Self-registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Display name is required"))]
    pub display_name: String,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub student_id: Option<String>,
}

/// Update own profile request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub student_id: Option<String>,
}

/// Change password request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

/// Update role request (admin only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRole {
    pub role: UserRole,
}

/// Approval decision on an account (admin only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateApproval {
    pub approval_status: ApprovalStatus,
    /// Optional note recorded in the audit log
    pub reason: Option<String>,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Require staff or admin role
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Staff privileges required".to_string()))
        }
    }

    /// Require admin role
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Re-check the claims against the current account row: the account must
    /// still be approved and the role comes from the row, not the token.
    pub fn refreshed(mut self, user: &User) -> Result<Self, AppError> {
        if user.id != self.user_id {
            return Err(AppError::Authentication("Invalid or expired token".to_string()));
        }
        user.approval_status.ensure_can_sign_in()?;
        self.role = user.role;
        self.sub = user.email.clone();
        Ok(self)
    }

    /// Users may access their own records, staff may access everyone's
    pub fn require_self_or_staff(&self, user_id: i32) -> Result<(), AppError> {
        if self.user_id == user_id || self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("You can only access your own records".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: UserRole) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "someone@example.org".to_string(),
            user_id: 10,
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let c = claims(UserRole::Staff);
        let token = c.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.user_id, 10);
        assert_eq!(parsed.role, UserRole::Staff);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut c = claims(UserRole::User);
        c.exp = Utc::now().timestamp() - 3600;
        let token = c.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "secret").is_err());
    }

    #[test]
    fn test_role_checks() {
        assert!(claims(UserRole::User).require_staff().is_err());
        assert!(claims(UserRole::Staff).require_staff().is_ok());
        assert!(claims(UserRole::Staff).require_admin().is_err());
        assert!(claims(UserRole::Admin).require_staff().is_ok());

        let user = claims(UserRole::User);
        assert!(user.require_self_or_staff(10).is_ok());
        assert!(user.require_self_or_staff(11).is_err());
        assert!(claims(UserRole::Staff).require_self_or_staff(11).is_ok());
    }

    fn account(role: UserRole, approval_status: ApprovalStatus) -> User {
        let now = Utc::now();
        User {
            id: 10,
            email: "someone@example.org".to_string(),
            password: String::new(),
            display_name: "Someone".to_string(),
            role,
            approval_status,
            department: None,
            phone: None,
            student_id: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn test_refreshed_claims_follow_account_row() {
        let demoted = claims(UserRole::Admin)
            .refreshed(&account(UserRole::User, ApprovalStatus::Approved))
            .unwrap();
        assert_eq!(demoted.role, UserRole::User);
        assert!(demoted.require_admin().is_err());

        let promoted = claims(UserRole::User)
            .refreshed(&account(UserRole::Staff, ApprovalStatus::Approved))
            .unwrap();
        assert!(promoted.require_staff().is_ok());
    }

    #[test]
    fn test_refreshed_claims_refuse_unapproved_accounts() {
        for status in [ApprovalStatus::Suspended, ApprovalStatus::Rejected, ApprovalStatus::Pending] {
            let err = claims(UserRole::Staff)
                .refreshed(&account(UserRole::Staff, status))
                .unwrap_err();
            assert!(matches!(err, AppError::Authentication(_)), "{status} accepted");
        }

        let mut other = account(UserRole::User, ApprovalStatus::Approved);
        other.id = 11;
        assert!(claims(UserRole::User).refreshed(&other).is_err());
    }

    #[test]
    fn test_registration_validation() {
        let bad = RegisterUser {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            display_name: String::new(),
            department: None,
            phone: None,
            student_id: None,
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("display_name"));
    }
}
