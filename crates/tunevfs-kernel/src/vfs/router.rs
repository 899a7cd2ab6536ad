//! Routes URIs to mounted roots by scheme.
//!
//! ```text
//! vfs:/                 # router root, lists every mount
//! ├── archive:/         # ArchiveRoot over a caching catalog
//! └── mem:/             # MemoryRoot
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::compare::natural_cmp;
use super::resolver::Resolver;
use super::traits::{DirVisitor, ProgressCallback, VfsDir, VfsNode, VfsObject, VfsRoot};
use crate::error::{VfsError, VfsResult};
use crate::uri::{ROOT_SCHEME, VfsUri};

#[derive(Clone)]
struct Mount {
    root: Arc<dyn VfsRoot>,
    dir: Arc<dyn VfsDir>,
}

type MountTable = Arc<RwLock<BTreeMap<String, Mount>>>;

/// Information about a mounted root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub scheme: String,
    pub name: String,
}

#[derive(Default)]
pub struct VfsRouter {
    mounts: MountTable,
}

impl VfsRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `root` under its own URI scheme, replacing any previous mount.
    pub fn mount<R: VfsRoot + 'static>(&self, root: Arc<R>) {
        let scheme = root.uri().scheme().to_string();
        tracing::debug!(scheme = %scheme, "mounting root");
        let mount = Mount {
            root: root.clone(),
            dir: root,
        };
        self.mounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scheme, mount);
    }

    pub fn unmount(&self, scheme: &str) -> bool {
        self.mounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(scheme)
            .is_some()
    }

    pub fn list_mounts(&self) -> Vec<MountInfo> {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(scheme, mount)| MountInfo {
                scheme: scheme.clone(),
                name: mount.dir.name(),
            })
            .collect()
    }

    /// The `vfs:/` directory.
    pub fn root_dir(&self) -> Arc<dyn VfsDir> {
        Arc::new(RouterDir {
            mounts: self.mounts.clone(),
        })
    }

    fn lookup(&self, scheme: &str) -> Option<Mount> {
        self.mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scheme)
            .cloned()
    }
}

#[async_trait]
impl Resolver for VfsRouter {
    async fn resolve(
        &self,
        uri: &VfsUri,
        progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<VfsNode> {
        if uri.scheme() == ROOT_SCHEME {
            return if uri.is_scheme_root() {
                Ok(VfsNode::Dir(self.root_dir()))
            } else {
                Err(VfsError::NotFound(uri.to_string()))
            };
        }
        let mount = self
            .lookup(uri.scheme())
            .ok_or_else(|| VfsError::NotFound(uri.to_string()))?;
        if uri.is_scheme_root() {
            return Ok(VfsNode::Dir(mount.dir));
        }
        mount.root.resolve(uri, progress).await
    }
}

struct RouterDir {
    mounts: MountTable,
}

impl VfsObject for RouterDir {
    fn uri(&self) -> VfsUri {
        VfsUri::root()
    }

    fn name(&self) -> String {
        "Root".to_string()
    }

    fn parent(&self) -> Option<VfsNode> {
        None
    }
}

#[async_trait]
impl VfsDir for RouterDir {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        let mut dirs: Vec<Arc<dyn VfsDir>> = self
            .mounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|mount| mount.dir.clone())
            .collect();
        dirs.sort_by(|a, b| natural_cmp(&a.name(), &b.name()));
        visitor.on_items_count(dirs.len() as u32);
        for dir in dirs {
            visitor.on_dir(dir);
        }
        Ok(())
    }
}
