//! Policy retrieval point with event-invalidated caching.
//!
//! Results are cached per key: the whole URL-policy set under
//! [`URL_POLICIES_CACHE_KEY`], method policies under the literal method
//! identifier. There is no time-based expiry; entries leave the cache only
//! through the eviction calls driven by domain events, synchronously with
//! the mutation that changed policy data.

use std::sync::Arc;

use dashmap::DashMap;
use policy_engine_sdk::models::Policy;
use policy_engine_sdk::ports::PolicyStore;
use policy_engine_sdk::PolicyEngineError;

/// Cache key of the URL-policy set. The key shape is load-bearing for
/// interoperability with existing cache infrastructure.
pub const URL_POLICIES_CACHE_KEY: &str = "allUrlPolicies";

/// Caching façade over the policy store.
///
/// Shared across workers; reads and evictions are atomic per key. Two
/// workers racing on a cold key may both query the store; the results are
/// equivalent and the last insert wins.
pub struct PolicyRetrievalPoint {
    store: Arc<dyn PolicyStore>,
    cache: DashMap<String, Arc<[Policy]>>,
}

impl PolicyRetrievalPoint {
    #[must_use]
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Policies applicable to URL resources.
    ///
    /// # Errors
    ///
    /// - `Internal` when the store is unreachable on a cache miss
    pub async fn find_url_policies(&self) -> Result<Arc<[Policy]>, PolicyEngineError> {
        if let Some(hit) = self.cache.get(URL_POLICIES_CACHE_KEY) {
            return Ok(Arc::clone(hit.value()));
        }
        let loaded: Arc<[Policy]> = self.store.url_policies().await?.into();
        self.cache
            .insert(URL_POLICIES_CACHE_KEY.to_owned(), Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Policies applicable to one method identifier.
    ///
    /// # Errors
    ///
    /// - `Internal` when the store is unreachable on a cache miss
    pub async fn find_method_policies(
        &self,
        identifier: &str,
    ) -> Result<Arc<[Policy]>, PolicyEngineError> {
        if let Some(hit) = self.cache.get(identifier) {
            return Ok(Arc::clone(hit.value()));
        }
        let loaded: Arc<[Policy]> = self.store.method_policies(identifier).await?.into();
        self.cache.insert(identifier.to_owned(), Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Drop the URL-policy entry.
    pub fn evict_url_policies(&self) {
        self.cache.remove(URL_POLICIES_CACHE_KEY);
    }

    /// Drop one method-policy entry.
    pub fn evict_method_policies(&self, identifier: &str) {
        self.cache.remove(identifier);
    }

    /// Drop every cached entry.
    pub fn evict_all(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::RwLock;
    use policy_engine_sdk::models::{Effect, PolicyTarget, ResourceKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn policy(name: &str) -> Policy {
        Policy {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            effect: Effect::Allow,
            priority: 0,
            targets: vec![PolicyTarget {
                kind: ResourceKind::Url,
                pattern: "/admin/**".to_owned(),
            }],
            rules: vec![],
        }
    }

    #[derive(Default)]
    struct CountingStore {
        url_queries: AtomicUsize,
        method_queries: AtomicUsize,
        url_policies: RwLock<Vec<Policy>>,
    }

    #[async_trait]
    impl PolicyStore for CountingStore {
        async fn url_policies(&self) -> Result<Vec<Policy>, PolicyEngineError> {
            self.url_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.url_policies.read().clone())
        }

        async fn method_policies(
            &self,
            _identifier: &str,
        ) -> Result<Vec<Policy>, PolicyEngineError> {
            self.method_queries.fetch_add(1, Ordering::SeqCst);
            Ok(vec![policy("method-policy")])
        }

        async fn all_policies(&self) -> Result<Vec<Policy>, PolicyEngineError> {
            Ok(self.url_policies.read().clone())
        }
    }

    #[tokio::test]
    async fn url_hit_skips_the_store() {
        let store = Arc::new(CountingStore::default());
        store.url_policies.write().push(policy("first"));
        let prp = PolicyRetrievalPoint::new(store.clone());

        let first = prp.find_url_policies().await.unwrap();
        let second = prp.find_url_policies().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(store.url_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eviction_causes_reload_with_fresh_state() {
        let store = Arc::new(CountingStore::default());
        store.url_policies.write().push(policy("first"));
        let prp = PolicyRetrievalPoint::new(store.clone());

        assert_eq!(prp.find_url_policies().await.unwrap().len(), 1);

        store.url_policies.write().push(policy("second"));
        // Still cached: the store change is not visible yet.
        assert_eq!(prp.find_url_policies().await.unwrap().len(), 1);

        prp.evict_url_policies();
        assert_eq!(prp.find_url_policies().await.unwrap().len(), 2);
        assert_eq!(store.url_queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn method_policies_cache_per_identifier() {
        let store = Arc::new(CountingStore::default());
        let prp = PolicyRetrievalPoint::new(store.clone());

        prp.find_method_policies("PolicyService.deletePolicy")
            .await
            .unwrap();
        prp.find_method_policies("PolicyService.deletePolicy")
            .await
            .unwrap();
        prp.find_method_policies("PolicyService.createPolicy")
            .await
            .unwrap();

        assert_eq!(store.method_queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn evict_all_clears_both_families() {
        let store = Arc::new(CountingStore::default());
        let prp = PolicyRetrievalPoint::new(store.clone());

        prp.find_url_policies().await.unwrap();
        prp.find_method_policies("Svc.method").await.unwrap();
        prp.evict_all();
        prp.find_url_policies().await.unwrap();
        prp.find_method_policies("Svc.method").await.unwrap();

        assert_eq!(store.url_queries.load(Ordering::SeqCst), 2);
        assert_eq!(store.method_queries.load(Ordering::SeqCst), 2);
    }
}
