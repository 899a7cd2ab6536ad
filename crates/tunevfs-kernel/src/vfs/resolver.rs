//! URI resolution and the bounded resolution cache.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use lru::LruCache;

use super::traits::{ProgressCallback, VfsNode};
use crate::error::VfsResult;
use crate::uri::VfsUri;

/// Turns a URI into a live object.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        uri: &VfsUri,
        progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<VfsNode>;
}

/// Default number of resolved objects kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// LRU cache of resolved objects in front of another resolver.
///
/// A hit never reaches the inner resolver.
pub struct CachingResolver {
    inner: Arc<dyn Resolver>,
    cache: Mutex<LruCache<String, VfsNode>>,
    evictions: AtomicU64,
}

impl CachingResolver {
    pub fn new(inner: Arc<dyn Resolver>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            evictions: AtomicU64::new(0),
        }
    }

    /// Best effort: a cached object, or a fresh resolution, or `None` on any failure.
    pub async fn resolve(&self, uri: &VfsUri) -> Option<VfsNode> {
        if let Some(node) = self.cached(uri) {
            return Some(node);
        }
        match self.inner.resolve(uri, None).await {
            Ok(node) => {
                self.store(uri, node.clone());
                Some(node)
            }
            Err(e) => {
                tracing::debug!(uri = %uri, error = %e, "resolution failed");
                None
            }
        }
    }

    /// Resolve reporting progress. `progress` is only called on a cache miss.
    pub async fn resolve_forced(
        &self,
        uri: &VfsUri,
        progress: &dyn ProgressCallback,
    ) -> VfsResult<VfsNode> {
        if let Some(node) = self.cached(uri) {
            return Ok(node);
        }
        let node = self.inner.resolve(uri, Some(progress)).await?;
        self.store(uri, node.clone());
        Ok(node)
    }

    /// Number of entries pushed out so far.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, uri: &VfsUri) -> Option<VfsNode> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&uri.to_string()).cloned()
    }

    fn store(&self, uri: &VfsUri, node: VfsNode) {
        let key = uri.to_string();
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((evicted, _)) = cache.push(key.clone(), node) {
            if evicted != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(uri = %evicted, "evicted from resolution cache");
            }
        }
    }
}

#[async_trait]
impl Resolver for CachingResolver {
    async fn resolve(
        &self,
        uri: &VfsUri,
        progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<VfsNode> {
        match progress {
            Some(progress) => self.resolve_forced(uri, progress).await,
            None => {
                if let Some(node) = self.cached(uri) {
                    return Ok(node);
                }
                let node = self.inner.resolve(uri, None).await?;
                self.store(uri, node.clone());
                Ok(node)
            }
        }
    }
}
