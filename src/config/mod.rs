use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Secret shipped in the development preset. Rejected in production.
pub const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing configuration: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub tenant: TenantConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Root hostname used for tenant administration, e.g. `todo.example.com`
    pub main_domain: String,
    /// Hosts treated like the main domain (local development)
    pub dev_bypass_hosts: Vec<String>,
    pub trust_forwarded_host: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub access_token_ttl_mins: i64,
    pub refresh_token_ttl_days: i64,
    pub reset_token_ttl_mins: i64,
    /// Argon2 iteration count
    pub password_cost: u32,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Subdomain lookup cache lifetime; 0 disables caching
    pub cache_ttl_secs: u64,
    /// Attach the oldest active tenant to main-domain requests.
    /// Known sharp edge: development convenience only, forced off in production.
    pub dev_default_tenant: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides();

        config.validate()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("APP_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("SERVER_MAIN_DOMAIN") {
            self.server.main_domain = v.trim().to_ascii_lowercase();
        }
        if let Ok(v) = env::var("SERVER_DEV_BYPASS_HOSTS") {
            self.server.dev_bypass_hosts = split_list(&v);
        }
        if let Ok(v) = env::var("SERVER_TRUST_FORWARDED_HOST") {
            self.server.trust_forwarded_host = v.parse().unwrap_or(self.server.trust_forwarded_host);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_BACKEND") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" | "postgresql" => StoreBackend::Postgres,
                _ => self.database.backend,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_AUTO_MIGRATE") {
            self.database.auto_migrate = v.parse().unwrap_or(self.database.auto_migrate);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_ACCESS_TOKEN_TTL_MINS") {
            self.security.access_token_ttl_mins = v.parse().unwrap_or(self.security.access_token_ttl_mins);
        }
        if let Ok(v) = env::var("SECURITY_REFRESH_TOKEN_TTL_DAYS") {
            self.security.refresh_token_ttl_days = v.parse().unwrap_or(self.security.refresh_token_ttl_days);
        }
        if let Ok(v) = env::var("SECURITY_RESET_TOKEN_TTL_MINS") {
            self.security.reset_token_ttl_mins = v.parse().unwrap_or(self.security.reset_token_ttl_mins);
        }
        if let Ok(v) = env::var("SECURITY_PASSWORD_COST") {
            self.security.password_cost = v.parse().unwrap_or(self.security.password_cost);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }

        // Tenant overrides
        if let Ok(v) = env::var("TENANT_CACHE_TTL_SECS") {
            self.tenant.cache_ttl_secs = v.parse().unwrap_or(self.tenant.cache_ttl_secs);
        }
        if let Ok(v) = env::var("TENANT_DEV_DEFAULT_TENANT") {
            self.tenant.dev_default_tenant = v.parse().unwrap_or(self.tenant.dev_default_tenant);
        }

        // Pagination overrides
        if let Ok(v) = env::var("PAGINATION_DEFAULT_PAGE_SIZE") {
            self.pagination.default_page_size = v.parse().unwrap_or(self.pagination.default_page_size);
        }
        if let Ok(v) = env::var("PAGINATION_MAX_PAGE_SIZE") {
            self.pagination.max_page_size = v.parse().unwrap_or(self.pagination.max_page_size);
        }

        self
    }

    /// Enforces the production invariants. The development default tenant is
    /// switched off here rather than rejected so that a stray env var cannot
    /// keep a production deployment from booting.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.is_production() {
            if self.tenant.dev_default_tenant {
                tracing::warn!("TENANT_DEV_DEFAULT_TENANT ignored in production");
                self.tenant.dev_default_tenant = false;
            }
            if self.security.jwt_secret.is_empty() || self.security.jwt_secret == DEV_JWT_SECRET {
                return Err(ConfigError::Missing("JWT_SECRET"));
            }
            if self.database.backend != StoreBackend::Postgres {
                return Err(ConfigError::Invalid(
                    "the in-memory store is not available in production".to_string(),
                ));
            }
        }

        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.pagination.default_page_size < 1 || self.pagination.max_page_size < self.pagination.default_page_size {
            return Err(ConfigError::Invalid(format!(
                "pagination sizes out of range (default {}, max {})",
                self.pagination.default_page_size, self.pagination.max_page_size
            )));
        }
        if self.server.main_domain.is_empty() {
            return Err(ConfigError::Missing("SERVER_MAIN_DOMAIN"));
        }

        Ok(self)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                main_domain: "localhost".to_string(),
                dev_bypass_hosts: vec!["127.0.0.1".to_string(), "0.0.0.0".to_string()],
                trust_forwarded_host: false,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                auto_migrate: true,
            },
            security: SecurityConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                access_token_ttl_mins: 60 * 24,
                refresh_token_ttl_days: 30,
                reset_token_ttl_mins: 60,
                password_cost: 2,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            tenant: TenantConfig {
                cache_ttl_secs: 0,
                dev_default_tenant: true,
            },
            pagination: PaginationConfig {
                default_page_size: 20,
                max_page_size: 100,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                port: 3000,
                main_domain: "staging.example.com".to_string(),
                dev_bypass_hosts: vec![],
                trust_forwarded_host: true,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                auto_migrate: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                access_token_ttl_mins: 60,
                refresh_token_ttl_days: 7,
                reset_token_ttl_mins: 30,
                password_cost: 3,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            tenant: TenantConfig {
                cache_ttl_secs: 30,
                dev_default_tenant: false,
            },
            pagination: PaginationConfig {
                default_page_size: 20,
                max_page_size: 100,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 3000,
                main_domain: "example.com".to_string(),
                dev_bypass_hosts: vec![],
                trust_forwarded_host: true,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                auto_migrate: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                access_token_ttl_mins: 15,
                refresh_token_ttl_days: 7,
                reset_token_ttl_mins: 15,
                password_cost: 3,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            tenant: TenantConfig {
                cache_ttl_secs: 30,
                dev_default_tenant: false,
            },
            pagination: PaginationConfig {
                default_page_size: 20,
                max_page_size: 100,
            },
        }
    }

    /// Development preset on the in-memory store, used by tests.
    pub fn in_memory() -> Self {
        let mut config = Self::development();
        config.database.backend = StoreBackend::Memory;
        config.database.auto_migrate = false;
        config.server.main_domain = "todo.test".to_string();
        config.server.dev_bypass_hosts = vec![];
        config.tenant.dev_default_tenant = false;
        config.security.password_cost = 1;
        config
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
