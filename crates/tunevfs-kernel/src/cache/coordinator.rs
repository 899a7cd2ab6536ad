//! Cache-or-refresh coordination.
//!
//! Three shapes of access, all going through one [`CacheStore`]:
//!
//! - [`CacheOrRefresh::query`]: bulk listings. Refresh when the lifetime has
//!   expired; a failed refresh is logged and the cached rows are served.
//! - [`CacheOrRefresh::fetch`]: point lookups. Cache hit or remote fetch; a
//!   failed fetch is returned to the caller.
//! - [`CacheOrRefresh::query_random`]: random picks. Always fetched while the
//!   network is reachable, otherwise drawn from the cache.
//!
//! Remote data is staged in memory first, then persisted together with the
//! lifetime update in a single transaction. Concurrent refreshes of the same
//! key are serialized, and a waiter re-checks the lifetime before fetching.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;

use super::flight::KeyedLocks;
use super::store::{CacheStore, CacheTx, StoreResult};
use crate::error::VfsResult;

/// A cached collection with a lifetime.
#[async_trait]
pub trait QueryCommand: Send + Sync {
    /// Remote data staged before it is written.
    type Staged: Send;
    /// What readers see.
    type Item: Send;

    fn lifetime_key(&self) -> String;

    fn ttl(&self) -> TimeDelta;

    async fn refresh(&self) -> VfsResult<Self::Staged>;

    /// Write staged data. Runs in the same transaction as the lifetime update.
    fn persist(&self, tx: &CacheTx<'_>, staged: &Self::Staged) -> StoreResult<()>;

    fn read_from_cache(&self, store: &CacheStore) -> StoreResult<Vec<Self::Item>>;
}

/// A single object looked up by id.
#[async_trait]
pub trait FetchCommand: Send + Sync {
    type Item: Send;

    fn key(&self) -> String;

    fn read_cached(&self, store: &CacheStore) -> StoreResult<Option<Self::Item>>;

    async fn fetch_one(&self) -> VfsResult<Self::Item>;

    fn persist(&self, tx: &CacheTx<'_>, item: &Self::Item) -> StoreResult<()>;
}

/// A random pick whose freshness depends on network reachability.
#[async_trait]
pub trait RandomCommand: Send + Sync {
    type Item: Send;

    fn key(&self) -> String;

    async fn is_network_available(&self) -> bool;

    async fn fetch_random(&self) -> VfsResult<Self::Item>;

    fn persist(&self, tx: &CacheTx<'_>, item: &Self::Item) -> StoreResult<()>;

    fn read_random_cached(&self, store: &CacheStore) -> StoreResult<Option<Self::Item>>;
}

pub struct CacheOrRefresh {
    store: Arc<CacheStore>,
    flights: KeyedLocks,
}

impl CacheOrRefresh {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            flights: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Refresh if expired, then visit whatever the cache holds.
    ///
    /// Returns whether any rows were visited. Only cancellation and store
    /// failures are errors; a failing remote leaves the old data and lifetime
    /// in place.
    pub async fn query<C, V>(&self, cmd: &C, mut visitor: V) -> VfsResult<bool>
    where
        C: QueryCommand,
        V: FnMut(C::Item) + Send,
    {
        let key = cmd.lifetime_key();
        {
            let _flight = self.flights.lock(&key).await;
            let mut lifetime = self.store.lifetime(&key, cmd.ttl())?;
            if lifetime.is_expired() {
                tracing::debug!(key = %key, "cache expired, refreshing");
                match cmd.refresh().await {
                    Ok(staged) => {
                        let persisted = self.store.run_in_transaction(|tx| {
                            cmd.persist(tx, &staged)?;
                            tx.update_lifetime(&mut lifetime)
                        });
                        if let Err(e) = persisted {
                            tracing::warn!(key = %key, error = %e, "failed to persist refresh");
                        }
                    }
                    Err(e) if e.is_canceled() => return Err(e),
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "refresh failed, serving cached data");
                    }
                }
            }
        }

        let items = cmd.read_from_cache(&self.store)?;
        let had_data = !items.is_empty();
        for item in items {
            visitor(item);
        }
        Ok(had_data)
    }

    /// Cached object, or a remote fetch whose failure propagates.
    pub async fn fetch<C: FetchCommand>(&self, cmd: &C) -> VfsResult<C::Item> {
        if let Some(item) = cmd.read_cached(&self.store)? {
            return Ok(item);
        }
        let key = cmd.key();
        let _flight = self.flights.lock(&key).await;
        if let Some(item) = cmd.read_cached(&self.store)? {
            return Ok(item);
        }

        let item = cmd.fetch_one().await?;
        if let Err(e) = self.store.run_in_transaction(|tx| cmd.persist(tx, &item)) {
            tracing::warn!(key = %key, error = %e, "failed to cache fetched object");
        }
        Ok(item)
    }

    /// Fresh random pick when online, cached random pick otherwise.
    ///
    /// The cache is only consulted while the network is unreachable. A failed
    /// remote pick while online yields `None`.
    pub async fn query_random<C: RandomCommand>(&self, cmd: &C) -> VfsResult<Option<C::Item>> {
        if !cmd.is_network_available().await {
            return Ok(cmd.read_random_cached(&self.store)?);
        }
        match cmd.fetch_random().await {
            Ok(item) => {
                if let Err(e) = self.store.run_in_transaction(|tx| cmd.persist(tx, &item)) {
                    tracing::warn!(key = %cmd.key(), error = %e, "failed to cache random pick");
                }
                Ok(Some(item))
            }
            Err(e) if e.is_canceled() => Err(e),
            Err(e) => {
                tracing::warn!(key = %cmd.key(), error = %e, "random pick failed");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VfsError;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Numbers {
        calls: AtomicU32,
        fail: bool,
        values: Vec<u32>,
    }

    impl Numbers {
        fn new(values: Vec<u32>, fail: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail,
                values,
            }
        }
    }

    #[async_trait]
    impl QueryCommand for Numbers {
        type Staged = Vec<u32>;
        type Item = u32;

        fn lifetime_key(&self) -> String {
            "numbers".into()
        }

        fn ttl(&self) -> TimeDelta {
            TimeDelta::hours(1)
        }

        async fn refresh(&self) -> VfsResult<Vec<u32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if self.fail {
                Err(VfsError::remote("unreachable"))
            } else {
                Ok(self.values.clone())
            }
        }

        fn persist(&self, tx: &CacheTx<'_>, staged: &Vec<u32>) -> StoreResult<()> {
            tx.cleanup_scope("numbers", "all")?;
            for (pos, n) in staged.iter().enumerate() {
                tx.add_object("numbers", &n.to_string(), "", n)?;
                tx.add_to_scope("numbers", "all", &n.to_string(), pos)?;
            }
            Ok(())
        }

        fn read_from_cache(&self, store: &CacheStore) -> StoreResult<Vec<u32>> {
            store.query_scope("numbers", "all")
        }
    }

    #[tokio::test]
    async fn concurrent_refreshes_coalesce() {
        let coordinator = Arc::new(CacheOrRefresh::new(Arc::new(CacheStore::in_memory().unwrap())));
        let cmd = Arc::new(Numbers::new(vec![1, 2, 3], false));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = coordinator.clone();
                let cmd = cmd.clone();
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    coordinator.query(cmd.as_ref(), |n| seen.push(n)).await.unwrap();
                    seen
                })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), vec![1, 2, 3]);
        }
        assert_eq!(cmd.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_cache_and_failing_remote_yields_nothing() {
        let coordinator = CacheOrRefresh::new(Arc::new(CacheStore::in_memory().unwrap()));
        let cmd = Numbers::new(vec![], true);
        let had = coordinator.query(&cmd, |_| {}).await.unwrap();
        assert!(!had);
        let lifetime = coordinator.store().lifetime("numbers", cmd.ttl()).unwrap();
        assert!(lifetime.is_expired());
    }
}
