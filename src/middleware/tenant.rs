use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::models::tenant::validate_subdomain;
use crate::database::models::Tenant;
use crate::error::ApiError;
use crate::services::tenant_directory::TenantDirectory;
use crate::state::AppState;

const FORWARDED_HOST: &str = "x-forwarded-host";

/// Tenant identity derived from the request host
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant: Option<Tenant>,
    pub is_main_domain: bool,
}

impl TenantContext {
    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant.as_ref().map(|t| t.id)
    }

    /// The resolved tenant, or 404 when the main domain has none attached
    pub fn require_tenant(&self) -> Result<&Tenant, ApiError> {
        self.tenant
            .as_ref()
            .ok_or_else(|| ApiError::tenant_not_found("No tenant is associated with this host"))
    }
}

pub struct TenantResolver<'a> {
    config: &'a AppConfig,
    directory: &'a TenantDirectory,
}

impl<'a> TenantResolver<'a> {
    pub fn new(config: &'a AppConfig, directory: &'a TenantDirectory) -> Self {
        Self { config, directory }
    }

    /// Main domain and bypass hosts resolve to the main-domain marker; any
    /// other host must name an active tenant in its leftmost label.
    pub async fn resolve(&self, host: &str) -> Result<TenantContext, ApiError> {
        let host = normalize_host(host);
        let server = &self.config.server;

        if host == server.main_domain || server.dev_bypass_hosts.iter().any(|h| *h == host) {
            let tenant = if self.config.tenant.dev_default_tenant && !self.config.is_production() {
                let tenant = self.directory.first_active().await?;
                if let Some(t) = &tenant {
                    tracing::debug!(tenant_id = %t.id, "attached development default tenant");
                }
                tenant
            } else {
                None
            };
            return Ok(TenantContext { tenant, is_main_domain: true });
        }

        let subdomain = match host.split_once('.') {
            Some((label, rest)) if !rest.is_empty() => label,
            _ => return Err(ApiError::tenant_not_found(format!("No tenant for host '{}'", host))),
        };
        if validate_subdomain(subdomain).is_err() {
            return Err(ApiError::tenant_not_found(format!("No tenant for host '{}'", host)));
        }

        match self.directory.find_active_by_subdomain(subdomain).await? {
            Some(tenant) => Ok(TenantContext { tenant: Some(tenant), is_main_domain: false }),
            None => Err(ApiError::tenant_not_found(format!("Tenant '{}' not found", subdomain))),
        }
    }
}

/// Lowercase, drop the port and any trailing dot
fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    let without_port = if host.starts_with('[') {
        // IPv6 literal
        match host.find(']') {
            Some(end) => host[..=end].to_string(),
            None => host,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
            _ => host,
        }
    };
    without_port.trim_end_matches('.').to_string()
}

fn request_host(headers: &HeaderMap, uri_host: Option<&str>, trust_forwarded: bool) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if trust_forwarded {
        if let Some(host) = header_value(FORWARDED_HOST) {
            return Some(host);
        }
    }
    header_value(header::HOST.as_str()).or_else(|| uri_host.map(str::to_string))
}

/// Resolves the tenant for every request and stores `TenantContext` in the
/// request extensions.
pub async fn resolve_tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let host = request_host(
        request.headers(),
        request.uri().host(),
        state.config.server.trust_forwarded_host,
    )
    .ok_or_else(|| ApiError::tenant_not_found("Missing Host header"))?;

    let context = TenantResolver::new(&state.config, &state.tenants).resolve(&host).await?;
    tracing::debug!(
        host = %host,
        tenant_id = ?context.tenant_id(),
        main_domain = context.is_main_domain,
        "resolved tenant"
    );

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Tenant-wide administration is only reachable on the main domain; a
/// tenant's own host never reaches other tenants.
pub async fn require_main_domain_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_main_domain = request
        .extensions()
        .get::<TenantContext>()
        .map(|context| context.is_main_domain)
        .ok_or_else(|| ApiError::internal("main-domain check ran before tenant resolution"))?;
    if !is_main_domain {
        tracing::info!("tenant administration attempted from a tenant host");
        return Err(ApiError::forbidden("Tenant administration is only available on the main domain"));
    }
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or_else(|| ApiError::internal("tenant resolution middleware not installed on this route"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, Repository, Store, TenantScope};
    use std::sync::Arc;

    async fn setup(config: AppConfig) -> (AppConfig, TenantDirectory, Tenant) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let acme = Repository::<Tenant>::new(store.clone())
            .create(Tenant::new("Acme", "acme"), TenantScope::Unscoped)
            .await
            .unwrap();
        (config, TenantDirectory::new(store, 0), acme)
    }

    #[test]
    fn normalizes_hosts() {
        assert_eq!(normalize_host("Acme.Todo.Test:8080"), "acme.todo.test");
        assert_eq!(normalize_host("acme.todo.test."), "acme.todo.test");
        assert_eq!(normalize_host("[::1]:3000"), "[::1]");
        assert_eq!(normalize_host("localhost"), "localhost");
    }

    #[test]
    fn forwarded_host_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "proxy.internal".parse().unwrap());
        headers.insert(FORWARDED_HOST, "acme.todo.test, proxy".parse().unwrap());
        assert_eq!(request_host(&headers, None, false).unwrap(), "proxy.internal");
        assert_eq!(request_host(&headers, None, true).unwrap(), "acme.todo.test");
        assert!(request_host(&HeaderMap::new(), None, false).is_none());
    }

    #[tokio::test]
    async fn resolves_subdomain_to_active_tenant() {
        let (config, directory, acme) = setup(AppConfig::in_memory()).await;
        let resolver = TenantResolver::new(&config, &directory);

        let context = resolver.resolve("acme.todo.test:443").await.unwrap();
        assert!(!context.is_main_domain);
        assert_eq!(context.tenant_id(), Some(acme.id));

        // Idempotent
        let again = resolver.resolve("acme.todo.test:443").await.unwrap();
        assert_eq!(again.tenant_id(), context.tenant_id());
    }

    #[tokio::test]
    async fn unknown_or_invalid_subdomains_are_tenant_not_found() {
        let (config, directory, _) = setup(AppConfig::in_memory()).await;
        let resolver = TenantResolver::new(&config, &directory);

        for host in ["nope.todo.test", "ac_me.todo.test", "-x-.todo.test", "todo"] {
            let err = resolver.resolve(host).await.unwrap_err();
            assert!(matches!(err, ApiError::TenantNotFound(_)), "{}", host);
        }
    }

    #[tokio::test]
    async fn main_domain_has_no_tenant_unless_dev_default() {
        let (config, directory, acme) = setup(AppConfig::in_memory()).await;
        let context = TenantResolver::new(&config, &directory).resolve("todo.test").await.unwrap();
        assert!(context.is_main_domain);
        assert!(context.tenant.is_none());

        let mut dev = config.clone();
        dev.tenant.dev_default_tenant = true;
        let context = TenantResolver::new(&dev, &directory).resolve("todo.test").await.unwrap();
        assert_eq!(context.tenant_id(), Some(acme.id));
    }

    #[tokio::test]
    async fn dev_default_never_applies_in_production() {
        let (mut config, directory, _) = setup(AppConfig::in_memory()).await;
        config.environment = crate::config::Environment::Production;
        // Even if the flag slipped through
        config.tenant.dev_default_tenant = true;
        let context = TenantResolver::new(&config, &directory).resolve("todo.test").await.unwrap();
        assert!(context.is_main_domain);
        assert!(context.tenant.is_none());
    }
}
