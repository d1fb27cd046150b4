use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::{DatabaseError, FindOptions, Repository, Store, TenantScope};
use crate::database::models::Tenant;

/// Upper bound on cached subdomains. Only hits are cached, so this is only
/// reached with more live tenants than slots.
const CACHE_CAPACITY: usize = 1024;

struct CacheEntry {
    tenant: Tenant,
    expires_at: Instant,
}

/// Read side of the tenants table used on every request. Subdomain lookups
/// may be cached for a bounded TTL; tenant writes invalidate immediately.
pub struct TenantDirectory {
    tenants: Repository<Tenant>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl TenantDirectory {
    pub fn new(store: Arc<dyn Store>, cache_ttl_secs: u64) -> Self {
        Self {
            tenants: Repository::new(store),
            ttl: Duration::from_secs(cache_ttl_secs),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn find_active_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, DatabaseError> {
        if !self.ttl.is_zero() {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(subdomain) {
                if entry.expires_at > Instant::now() {
                    return Ok(Some(entry.tenant.clone()));
                }
            }
        }

        let tenant = self
            .tenants
            .find_one(json!({ "subdomain": subdomain, "active": true }), TenantScope::Unscoped)
            .await?;

        // Misses are never cached; arbitrary hostnames must not grow the map
        if let (Some(found), false) = (&tenant, self.ttl.is_zero()) {
            let now = Instant::now();
            let mut cache = self.cache.write().await;
            if cache.len() >= CACHE_CAPACITY && !cache.contains_key(subdomain) {
                cache.retain(|_, entry| entry.expires_at > now);
                if cache.len() >= CACHE_CAPACITY {
                    cache.clear();
                }
            }
            cache.insert(
                subdomain.to_string(),
                CacheEntry {
                    tenant: found.clone(),
                    expires_at: now + self.ttl,
                },
            );
        }
        Ok(tenant)
    }

    pub async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DatabaseError> {
        self.tenants
            .find_one(json!({ "id": id, "active": true }), TenantScope::Unscoped)
            .await
    }

    /// Oldest active tenant; backs the development default on the main domain
    pub async fn first_active(&self) -> Result<Option<Tenant>, DatabaseError> {
        let options = FindOptions {
            order: Some(json!("created_at asc")),
            limit: Some(1),
            offset: None,
        };
        let tenants = self
            .tenants
            .find_many(json!({ "active": true }), TenantScope::Unscoped, options)
            .await?;
        Ok(tenants.into_iter().next())
    }

    pub async fn invalidate(&self, subdomain: &str) {
        self.cache.write().await.remove(subdomain);
    }

    pub async fn invalidate_all(&self) {
        self.cache.write().await.clear();
    }

    #[cfg(test)]
    async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }
}
