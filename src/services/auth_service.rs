use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{PasswordHasher, TokenPair, TokenPurpose, TokenService};
use crate::database::models::user::{normalize_email, validate_email, validate_name, validate_password};
use crate::database::models::{Role, User, UserResponse};
use crate::database::{DatabaseError, Repository, TenantScope};
use crate::error::{ApiError, AuthFailure};
use crate::middleware::{AuthContext, TenantContext};
use crate::services::FieldErrors;
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const RESET_REQUESTED: &str = "If the account exists, password reset instructions have been issued";

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthSession {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordOutcome {
    pub message: &'static str,
    /// Only populated outside production, where no delivery channel exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

/// Registration, login and credential lifecycle within one tenant
pub struct AuthService {
    users: Repository<User>,
    tokens: Arc<TokenService>,
    passwords: Arc<PasswordHasher>,
    expose_reset_token: bool,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: state.repository(),
            tokens: state.tokens.clone(),
            passwords: state.passwords.clone(),
            expose_reset_token: !state.config.is_production(),
        }
    }

    pub async fn register(&self, context: &TenantContext, input: RegisterInput) -> Result<AuthSession, ApiError> {
        let tenant = context.require_tenant()?;

        let mut errors = FieldErrors::default();
        errors.check("email", validate_email(&input.email));
        errors.check("password", validate_password(&input.password));
        errors.check("name", validate_name(&input.name));
        errors.finish()?;

        let scope = TenantScope::Tenant(tenant.id);
        let email = normalize_email(&input.email);
        if self.users.find_one(json!({ "email": email }), scope).await?.is_some() {
            return Err(ApiError::conflict("Email is already registered"));
        }

        let hash = self.passwords.hash_async(&input.password).await.map_err(|e| ApiError::internal(e.to_string()))?;
        let user = User::new(&email, hash, input.name.trim(), Role::User);
        let user = self.users.create(user, scope).await.map_err(|e| match e {
            // Lost a race with a concurrent registration
            DatabaseError::UniqueViolation(_) => ApiError::conflict("Email is already registered"),
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "user registered");
        self.session(user)
    }

    /// Unknown email, wrong password and inactive account all fail the same way
    pub async fn login(&self, context: &TenantContext, input: LoginInput) -> Result<AuthSession, ApiError> {
        let tenant = context.require_tenant()?;
        let scope = TenantScope::Tenant(tenant.id);

        let user = self
            .users
            .find_one(json!({ "email": normalize_email(&input.email) }), scope)
            .await?;
        // Every path pays for one argon2 verification, known email or not
        let digest = user.as_ref().map(|user| user.password_hash.as_str());
        let matched = self.passwords.verify_async(&input.password, digest).await;
        let user = user.filter(|user| matched && user.active);

        let Some(user) = user else {
            tracing::info!(tenant_id = %tenant.id, reason = AuthFailure::InvalidCredentials.as_str(), "login failed");
            return Err(ApiError::unauthorized(AuthFailure::InvalidCredentials, INVALID_CREDENTIALS));
        };

        let now = Utc::now();
        let user = self.users.update(user.id, scope, |u| u.last_login_at = Some(now)).await?;
        tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "user logged in");
        self.session(user)
    }

    pub async fn refresh(&self, context: &TenantContext, refresh_token: &str) -> Result<AuthSession, ApiError> {
        let tenant = context.require_tenant()?;
        let claims = self.tokens.verify(refresh_token, TokenPurpose::Refresh)?;
        if claims.tenant_id != tenant.id {
            return Err(ApiError::forbidden("Access denied for this tenant"));
        }

        let user = self
            .users
            .find_one(json!({ "id": claims.sub, "active": true }), TenantScope::Tenant(tenant.id))
            .await?
            .ok_or_else(|| ApiError::unauthorized(AuthFailure::UnknownUser, "User not found or inactive"))?;
        self.session(user)
    }

    /// Always reports success so callers cannot probe which emails exist
    pub async fn forgot_password(&self, context: &TenantContext, email: &str) -> Result<ForgotPasswordOutcome, ApiError> {
        let tenant = context.require_tenant()?;
        let mut reset_token = None;

        if validate_email(email).is_ok() {
            let user = self
                .users
                .find_one(json!({ "email": normalize_email(email), "active": true }), TenantScope::Tenant(tenant.id))
                .await?;
            if let Some(user) = user {
                let token = self.tokens.issue_reset(&user)?;
                tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "password reset issued");
                if self.expose_reset_token {
                    tracing::debug!(user_id = %user.id, token = %token, "password reset token");
                    reset_token = Some(token);
                }
            }
        }

        Ok(ForgotPasswordOutcome { message: RESET_REQUESTED, reset_token })
    }

    pub async fn reset_password(&self, context: &TenantContext, token: &str, new_password: &str) -> Result<(), ApiError> {
        let tenant = context.require_tenant()?;
        let claims = self.tokens.verify(token, TokenPurpose::PasswordReset)?;
        if claims.tenant_id != tenant.id {
            return Err(ApiError::forbidden("Access denied for this tenant"));
        }

        let mut errors = FieldErrors::default();
        errors.check("password", validate_password(new_password));
        errors.finish()?;

        let scope = TenantScope::Tenant(tenant.id);
        let user = self
            .users
            .find_one(json!({ "id": claims.sub, "active": true }), scope)
            .await?
            .ok_or_else(|| ApiError::unauthorized(AuthFailure::UnknownUser, "User not found or inactive"))?;

        let hash = self.passwords.hash_async(new_password).await.map_err(|e| ApiError::internal(e.to_string()))?;
        self.users.update(user.id, scope, |u| u.password_hash = hash).await?;
        tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "password reset");
        Ok(())
    }

    pub async fn profile(&self, auth: &AuthContext) -> Result<UserResponse, ApiError> {
        Ok(self.current_user(auth).await?.into())
    }

    pub async fn update_profile(&self, auth: &AuthContext, input: UpdateProfileInput) -> Result<UserResponse, ApiError> {
        let mut errors = FieldErrors::default();
        if let Some(name) = &input.name {
            errors.check("name", validate_name(name));
        }
        if let Some(email) = &input.email {
            errors.check("email", validate_email(email));
        }
        errors.finish()?;

        let email = input.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            let existing = self.users.find_one(json!({ "email": email }), auth.scope()).await?;
            if existing.is_some_and(|u| u.id != auth.user_id) {
                return Err(ApiError::conflict("Email is already registered"));
            }
        }

        let name = input.name.map(|n| n.trim().to_string());
        let user = self
            .users
            .update(auth.user_id, auth.scope(), |u| {
                if let Some(name) = name {
                    u.name = name;
                }
                if let Some(email) = email {
                    u.email = email;
                }
            })
            .await
            .map_err(|e| match e {
                DatabaseError::UniqueViolation(_) => ApiError::conflict("Email is already registered"),
                other => other.into(),
            })?;
        Ok(user.into())
    }

    pub async fn change_password(&self, auth: &AuthContext, input: ChangePasswordInput) -> Result<(), ApiError> {
        let user = self.current_user(auth).await?;
        if !self.passwords.verify_async(&input.current_password, Some(&user.password_hash)).await {
            return Err(ApiError::field("current_password", "Current password is incorrect"));
        }

        let mut errors = FieldErrors::default();
        errors.check("new_password", validate_password(&input.new_password));
        errors.finish()?;

        let hash = self.passwords.hash_async(&input.new_password).await.map_err(|e| ApiError::internal(e.to_string()))?;
        self.users.update(user.id, auth.scope(), |u| u.password_hash = hash).await?;
        tracing::info!(user_id = %user.id, tenant_id = %auth.tenant_id, "password changed");
        Ok(())
    }

    async fn current_user(&self, auth: &AuthContext) -> Result<User, ApiError> {
        self.users
            .find_by_id(auth.user_id, auth.scope())
            .await?
            .ok_or_else(|| ApiError::unauthorized(AuthFailure::UnknownUser, "User not found or inactive"))
    }

    fn session(&self, user: User) -> Result<AuthSession, ApiError> {
        let tokens = self.tokens.issue_pair(&user)?;
        Ok(AuthSession { user: user.into(), tokens })
    }
}
