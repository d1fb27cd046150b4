use std::sync::Arc;

use crate::auth::{PasswordError, PasswordHasher, TokenService};
use crate::config::AppConfig;
use crate::database::{Entity, Repository, Store};
use crate::services::tenant_directory::TenantDirectory;

/// Shared application state handed to every handler and middleware.
/// Built once in `main` (or a test) around an explicitly constructed store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tenants: Arc<TenantDirectory>,
    pub tokens: Arc<TokenService>,
    pub passwords: Arc<PasswordHasher>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self, PasswordError> {
        let tenants = TenantDirectory::new(store.clone(), config.tenant.cache_ttl_secs);
        let tokens = TokenService::new(&config.security);
        let passwords = PasswordHasher::new(config.security.password_cost)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            tenants: Arc::new(tenants),
            tokens: Arc::new(tokens),
            passwords: Arc::new(passwords),
        })
    }

    pub fn repository<T: Entity>(&self) -> Repository<T> {
        Repository::new(self.store.clone()).max_page_size(self.config.pagination.max_page_size)
    }
}
