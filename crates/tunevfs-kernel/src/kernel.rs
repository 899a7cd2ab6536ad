//! The kernel: wires configuration, cache store, catalogs, resolver,
//! scheduler and client together.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::CacheStore;
use crate::catalog::{ArchiveRoot, CachingCatalog, Catalog, ManifestCatalog};
use crate::config::VfsConfig;
use crate::scheduler::{AsyncQueryScheduler, VfsClient};
use crate::vfs::{CachingResolver, MemoryRoot, MountInfo, VfsRouter};

/// Owns every long-lived piece of a tunevfs instance.
///
/// Mounts a `mem:` scratch root always, and an `archive:` root when a
/// catalog manifest is configured.
pub struct VfsKernel {
    config: VfsConfig,
    store: Arc<CacheStore>,
    router: Arc<VfsRouter>,
    scratch: MemoryRoot,
    resolver: Arc<CachingResolver>,
    scheduler: Arc<AsyncQueryScheduler>,
    client: VfsClient,
}

impl VfsKernel {
    /// Create a kernel with an on-disk catalog cache.
    pub fn new(config: VfsConfig) -> Result<Self> {
        let db_path = config.cache.database_path();
        let store = CacheStore::open(&db_path)
            .with_context(|| format!("Failed to open catalog cache at {}", db_path.display()))?;
        Self::with_store(config, Arc::new(store))
    }

    /// Create a kernel whose cache lives in memory only.
    pub fn transient(config: VfsConfig) -> Result<Self> {
        let store = CacheStore::in_memory().context("Failed to create in-memory catalog cache")?;
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: VfsConfig, store: Arc<CacheStore>) -> Result<Self> {
        let router = Arc::new(VfsRouter::new());
        let scratch = MemoryRoot::new();
        router.mount(Arc::new(scratch.clone()));

        let resolver = Arc::new(CachingResolver::new(
            router.clone(),
            config.resolver.cache_capacity,
        ));
        let scheduler = Arc::new(AsyncQueryScheduler::new(
            resolver.clone(),
            &config.scheduler,
        ));
        let client = VfsClient::new(scheduler.clone(), config.client.poll_interval());

        let kernel = Self {
            config,
            store,
            router,
            scratch,
            resolver,
            scheduler,
            client,
        };
        if let Some(manifest) = kernel.config.catalog.manifest.clone() {
            kernel.mount_manifest(&manifest);
        }
        Ok(kernel)
    }

    /// Mount a JSON manifest catalog as the `archive:` root.
    pub fn mount_manifest(&self, path: &Path) {
        let catalog: Arc<dyn Catalog> = Arc::new(CachingCatalog::new(
            ManifestCatalog::new(path),
            self.store.clone(),
            self.config.cache.ttls(),
        ));
        self.router.mount(Arc::new(ArchiveRoot::new(catalog)));
        tracing::info!(manifest = %path.display(), "archive catalog mounted");
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn router(&self) -> &Arc<VfsRouter> {
        &self.router
    }

    /// The `mem:` root, writable by the embedding application.
    pub fn scratch(&self) -> &MemoryRoot {
        &self.scratch
    }

    pub fn resolver(&self) -> &Arc<CachingResolver> {
        &self.resolver
    }

    pub fn scheduler(&self) -> &Arc<AsyncQueryScheduler> {
        &self.scheduler
    }

    pub fn client(&self) -> &VfsClient {
        &self.client
    }

    pub fn mounts(&self) -> Vec<MountInfo> {
        self.router.list_mounts()
    }

    /// Cancel every running operation.
    pub fn shutdown(&self) {
        self.client.cancel_token().cancel();
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ARCHIVE_SCHEME;
    use crate::scheduler::RowCollector;
    use crate::vfs::MEMORY_SCHEME;
    use tunevfs_types::ResultRow;

    #[tokio::test]
    async fn transient_kernel_serves_scratch_root() {
        let kernel = VfsKernel::transient(VfsConfig::default()).unwrap();
        kernel.scratch().add_file("demo/hello.mp3", "greeting", "0:05");

        let mut rows = RowCollector::default();
        kernel.client().list("mem:/demo", &mut rows).await.unwrap();
        assert_eq!(rows.rows.len(), 1);
        assert!(matches!(&rows.rows[0], ResultRow::File(f) if f.name == "hello.mp3"));

        let schemes: Vec<String> = kernel.mounts().into_iter().map(|m| m.scheme).collect();
        assert_eq!(schemes, [MEMORY_SCHEME]);
    }

    #[tokio::test]
    async fn manifest_from_config_is_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("manifest.json");
        std::fs::write(&manifest, r#"{ "albums": [] }"#).unwrap();

        let mut config = VfsConfig::default();
        config.catalog.manifest = Some(manifest);
        config.cache.database = Some(dir.path().join("cache.db"));
        let kernel = VfsKernel::new(config).unwrap();

        assert!(kernel.mounts().iter().any(|m| m.scheme == ARCHIVE_SCHEME));
        let root = kernel.client().resolve("archive:/").await.unwrap();
        assert!(matches!(root, ResultRow::Directory(d) if d.name == "Archive"));
    }
}
