use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::{TokenPurpose, TokenService};
use crate::database::models::{Role, User};
use crate::database::{Repository, TenantScope};
use crate::error::{ApiError, AuthFailure};
use crate::middleware::tenant::TenantContext;
use crate::services::tenant_directory::TenantDirectory;
use crate::state::AppState;

/// Authenticated caller, attached to request extensions by the guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub email: String,
}

impl AuthContext {
    pub fn scope(&self) -> TenantScope {
        TenantScope::Tenant(self.tenant_id)
    }
}

/// Credential as found on the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    Missing,
    Bearer(&'a str),
    /// Authorization header present but not `Bearer <token>`
    Invalid,
}

pub fn bearer_token(headers: &HeaderMap) -> Credential<'_> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Credential::Missing;
    };
    let Ok(value) = value.to_str() else {
        return Credential::Invalid;
    };
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Credential::Bearer(token.trim())
        }
        _ => Credential::Invalid,
    }
}

/// Composes the resolved tenant with the presented credential into one
/// authorization decision.
pub struct AccessGuard<'a> {
    tokens: &'a TokenService,
    tenants: &'a TenantDirectory,
    users: Repository<User>,
}

impl<'a> AccessGuard<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            tokens: &state.tokens,
            tenants: &state.tenants,
            users: state.repository(),
        }
    }

    pub async fn authenticate(&self, context: &TenantContext, credential: Credential<'_>) -> Result<AuthContext, ApiError> {
        let token = match credential {
            Credential::Bearer(token) => token,
            Credential::Missing => {
                return Err(ApiError::unauthorized(AuthFailure::MissingCredential, "Authentication required"))
            }
            Credential::Invalid => {
                return Err(ApiError::unauthorized(AuthFailure::Malformed, "Authorization header must use the Bearer scheme"))
            }
        };

        let claims = self.tokens.verify(token, TokenPurpose::Access)?;

        let user = self
            .users
            .find_one(json!({ "id": claims.sub, "active": true }), TenantScope::Tenant(claims.tenant_id))
            .await?
            .ok_or_else(|| ApiError::unauthorized(AuthFailure::UnknownUser, "User not found or inactive"))?;

        if context.is_main_domain {
            // No tenant to match against; the user's own tenant must still be live
            if self.tenants.find_active_by_id(user.tenant_id).await?.is_none() {
                tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "rejected user of inactive tenant");
                return Err(ApiError::forbidden("Tenant is inactive"));
            }
        } else {
            match context.tenant_id() {
                Some(tenant_id) if tenant_id == user.tenant_id => {}
                resolved => {
                    tracing::warn!(
                        user_id = %user.id,
                        user_tenant = %user.tenant_id,
                        resolved_tenant = ?resolved,
                        "tenant mismatch"
                    );
                    return Err(ApiError::forbidden("Access denied for this tenant"));
                }
            }
        }

        Ok(AuthContext {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
            email: user.email,
        })
    }
}

fn tenant_context(request: &Request) -> Result<TenantContext, ApiError> {
    request
        .extensions()
        .get::<TenantContext>()
        .cloned()
        .ok_or_else(|| ApiError::internal("authentication ran before tenant resolution"))
}

/// Rejects the request unless the guard authenticates it
pub async fn require_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = tenant_context(&request)?;
    let auth = AccessGuard::new(&state)
        .authenticate(&context, bearer_token(request.headers()))
        .await?;

    tracing::debug!(user_id = %auth.user_id, tenant_id = %auth.tenant_id, "authenticated");
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Attaches the caller when the guard accepts them; never rejects
pub async fn optional_auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Ok(context) = tenant_context(&request) {
        let credential = bearer_token(request.headers());
        if credential != Credential::Missing {
            match AccessGuard::new(&state).authenticate(&context, credential).await {
                Ok(auth) => {
                    request.extensions_mut().insert(auth);
                }
                Err(e) => tracing::debug!(error = %e, "optional authentication skipped"),
            }
        }
    }
    next.run(request).await
}

pub fn require_role(auth: &AuthContext, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&auth.role) {
        Ok(())
    } else {
        tracing::info!(user_id = %auth.user_id, role = %auth.role, "role not permitted");
        Err(ApiError::forbidden("Insufficient permissions"))
    }
}

/// Role gate for `/api/root`; runs after `require_auth_middleware`
pub async fn require_admin_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized(AuthFailure::MissingCredential, "Authentication required"))?;
    require_role(auth, &[Role::Admin])?;
    Ok(next.run(request).await)
}

/// Extractor for handlers behind `require_auth_middleware`
#[derive(Debug, Clone)]
pub struct Auth(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Auth)
            .ok_or_else(|| ApiError::unauthorized(AuthFailure::MissingCredential, "Authentication required"))
    }
}

/// Extractor for handlers behind `optional_auth_middleware`
#[derive(Debug, Clone)]
pub struct MaybeAuth(pub Option<AuthContext>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(parts.extensions.get::<AuthContext>().cloned()))
    }
}
