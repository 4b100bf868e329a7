//! Time-boxed cache for the WordPress category list.
//!
//! A stale list is still served when a refresh fails; the cache only errors
//! when no list was ever fetched successfully.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Category, GatewayError, PublishingGateway};

struct CachedList {
    categories: Vec<Category>,
    fetched_at: Instant,
}

/// Cached view of the remote category list
pub struct CategoryCache {
    gateway: Arc<dyn PublishingGateway>,
    ttl: Duration,
    slot: RwLock<Option<CachedList>>,
}

impl CategoryCache {
    /// Create a cache over the given gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn PublishingGateway>, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Return the category list, refreshing when forced or past the TTL.
    ///
    /// # Errors
    ///
    /// Returns the fetch error only when there is no previous list to fall
    /// back on.
    pub async fn get(&self, force_refresh: bool) -> Result<Vec<Category>, GatewayError> {
        if !force_refresh {
            let slot = self.slot.read().await;
            if let Some(cached) = slot.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    debug!("Returning cached categories");
                    return Ok(cached.categories.clone());
                }
            }
        }

        match self.gateway.categories().await {
            Ok(categories) => {
                let mut slot = self.slot.write().await;
                *slot = Some(CachedList {
                    categories: categories.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(categories)
            }
            Err(e) => {
                let slot = self.slot.read().await;
                if let Some(cached) = slot.as_ref() {
                    warn!("Category refresh failed, serving stale list: {e}");
                    return Ok(cached.categories.clone());
                }
                Err(e)
            }
        }
    }

    /// Name of a category by ID, from the cached list.
    pub async fn name_of(&self, category_id: u64) -> Option<String> {
        let categories = self.get(false).await.ok()?;
        categories
            .into_iter()
            .find(|c| c.id == category_id)
            .map(|c| c.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockPublishingGateway;

    fn sample() -> Vec<Category> {
        vec![Category {
            id: 3,
            name: "News".to_string(),
            slug: "news".to_string(),
        }]
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let mut gateway = MockPublishingGateway::new();
        gateway
            .expect_categories()
            .times(1)
            .returning(|| Ok(sample()));

        let cache = CategoryCache::new(Arc::new(gateway), Duration::from_secs(600));
        assert_eq!(cache.get(false).await.expect("first"), sample());
        assert_eq!(cache.get(false).await.expect("second"), sample());
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache() {
        let mut gateway = MockPublishingGateway::new();
        gateway
            .expect_categories()
            .times(2)
            .returning(|| Ok(sample()));

        let cache = CategoryCache::new(Arc::new(gateway), Duration::from_secs(600));
        cache.get(false).await.expect("first");
        cache.get(true).await.expect("forced");
    }

    #[tokio::test]
    async fn stale_list_survives_fetch_failure() {
        let mut gateway = MockPublishingGateway::new();
        let mut calls = 0;
        gateway.expect_categories().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(sample())
            } else {
                Err(GatewayError::Status {
                    status: 500,
                    body: "boom".to_string(),
                })
            }
        });

        let cache = CategoryCache::new(Arc::new(gateway), Duration::ZERO);
        assert_eq!(cache.get(false).await.expect("first"), sample());
        // TTL of zero forces a refetch, which fails; the stale list is kept
        assert_eq!(cache.get(false).await.expect("stale"), sample());
    }

    #[tokio::test]
    async fn error_with_no_cache_is_surfaced() {
        let mut gateway = MockPublishingGateway::new();
        gateway.expect_categories().times(1).returning(|| {
            Err(GatewayError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        });

        let cache = CategoryCache::new(Arc::new(gateway), Duration::from_secs(600));
        assert!(cache.get(false).await.is_err());
    }

    #[tokio::test]
    async fn name_lookup() {
        let mut gateway = MockPublishingGateway::new();
        gateway
            .expect_categories()
            .times(1)
            .returning(|| Ok(sample()));

        let cache = CategoryCache::new(Arc::new(gateway), Duration::from_secs(600));
        assert_eq!(cache.name_of(3).await.as_deref(), Some("News"));
        assert_eq!(cache.name_of(99).await, None);
    }
}
