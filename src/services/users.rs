//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde_json::json;

use super::audit::AuditService;
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        audit::NewAuditEntry,
        enums::{ApprovalStatus, UserRole},
        user::{ChangePassword, RegisterUser, UpdateApproval, UpdateProfile, User, UserClaims, UserQuery, UserShort},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    audit: AuditService,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig, audit: AuditService) -> Self {
        Self {
            repository,
            config,
            audit,
        }
    }

    /// Self-registration: the account waits for an administrator's approval
    pub async fn register(&self, data: &RegisterUser) -> AppResult<User> {
        if self.repository.users.email_exists(&data.email).await? {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let hash = hash_password(&data.password)?;
        let user = self
            .repository
            .users
            .create(data, &hash, UserRole::User, ApprovalStatus::Pending)
            .await?;

        tracing::info!(user_id = user.id, "User registered, awaiting approval");
        self.audit
            .record(NewAuditEntry::new(Some(user.id), "register", "user", Some(user.id)))
            .await;
        Ok(user)
    }

    /// Create or promote an approved administrator (used by the admin CLI)
    pub async fn ensure_admin(&self, email: &str, password: &str, display_name: &str) -> AppResult<User> {
        let hash = hash_password(password)?;
        if let Some(existing) = self.repository.users.get_by_email(email).await? {
            self.repository.users.update_password(existing.id, &hash).await?;
            self.repository.users.update_role(existing.id, UserRole::Admin).await?;
            return self
                .repository
                .users
                .update_approval(existing.id, ApprovalStatus::Approved)
                .await;
        }

        let data = RegisterUser {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.to_string(),
            department: None,
            phone: None,
            student_id: None,
        };
        self.repository
            .users
            .create(&data, &hash, UserRole::Admin, ApprovalStatus::Approved)
            .await
    }

    /// Authenticate by email and password, returns a JWT and the profile
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(&user.password, password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        user.approval_status.ensure_can_sign_in()?;

        self.repository.users.touch_last_login(user.id).await?;
        let token = self.create_token(&user)?;
        Ok((token, user))
    }

    fn create_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + (self.config.jwt_expiration_hours as i64 * 3600),
            iat: now,
        };
        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Validate a bearer token
    pub fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
    }

    /// Validate a bearer token and re-check it against the account row
    pub async fn authorize(&self, token: &str) -> AppResult<UserClaims> {
        let claims = self.verify_token(token)?;
        let user = match self.repository.users.get_by_id(claims.user_id).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Authentication("Invalid or expired token".to_string()))
            }
            Err(e) => return Err(e),
        };
        claims.refreshed(&user)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        self.repository.users.search(query).await
    }

    pub async fn update_profile(&self, id: i32, data: &UpdateProfile) -> AppResult<User> {
        self.repository.users.update_profile(id, data).await
    }

    pub async fn change_password(&self, id: i32, data: &ChangePassword) -> AppResult<()> {
        let user = self.repository.users.get_by_id(id).await?;
        if !verify_password(&user.password, &data.current_password)? {
            return Err(AppError::Authentication("Current password is incorrect".to_string()));
        }
        let hash = hash_password(&data.new_password)?;
        self.repository.users.update_password(id, &hash).await?;
        self.audit
            .record(NewAuditEntry::new(Some(id), "change_password", "user", Some(id)))
            .await;
        Ok(())
    }

    /// Approve, reject or suspend an account
    pub async fn set_approval(&self, actor: &UserClaims, id: i32, data: &UpdateApproval) -> AppResult<User> {
        if actor.user_id == id && data.approval_status != ApprovalStatus::Approved {
            return Err(AppError::BusinessRule(
                "You cannot reject or suspend your own account".to_string(),
            ));
        }

        let before = self.repository.users.get_by_id(id).await?;
        let user = self
            .repository
            .users
            .update_approval(id, data.approval_status)
            .await?;

        tracing::info!(
            user_id = id,
            from = %before.approval_status,
            to = %user.approval_status,
            "Account approval changed"
        );
        self.audit
            .record(
                NewAuditEntry::new(Some(actor.user_id), "set_approval", "user", Some(id)).with_details(json!({
                    "from": before.approval_status,
                    "to": user.approval_status,
                    "reason": data.reason,
                })),
            )
            .await;
        Ok(user)
    }

    pub async fn set_role(&self, actor: &UserClaims, id: i32, role: UserRole) -> AppResult<User> {
        if actor.user_id == id {
            return Err(AppError::BusinessRule("You cannot change your own role".to_string()));
        }

        let before = self.repository.users.get_by_id(id).await?;
        let user = self.repository.users.update_role(id, role).await?;

        tracing::info!(user_id = id, from = %before.role, to = %role, "Role changed");
        self.audit
            .record(
                NewAuditEntry::new(Some(actor.user_id), "set_role", "user", Some(id))
                    .with_details(json!({ "from": before.role, "to": role })),
            )
            .await;
        Ok(user)
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
