//! In-memory tree.
//!
//! Used for the `mem:` demo root and for tests. All data is ephemeral.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::traits::{DirVisitor, ProgressCallback, VfsDir, VfsFile, VfsNode, VfsObject, VfsRoot};
use crate::error::{VfsError, VfsResult};
use crate::uri::VfsUri;

pub const MEMORY_SCHEME: &str = "mem";

#[derive(Debug, Clone)]
enum Entry {
    Dir { description: String },
    File { description: String, size: String },
}

#[derive(Debug)]
struct Tree {
    scheme: String,
    entries: RwLock<BTreeMap<Vec<String>, Entry>>,
}

impl Tree {
    fn get(&self, path: &[String]) -> Option<Entry> {
        if path.is_empty() {
            return Some(Entry::Dir {
                description: String::new(),
            });
        }
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    fn node(self: &Arc<Self>, path: Vec<String>) -> Option<VfsNode> {
        match self.get(&path)? {
            Entry::Dir { .. } => Some(VfsNode::Dir(Arc::new(MemDir {
                tree: self.clone(),
                path,
            }))),
            Entry::File { .. } => Some(VfsNode::File(Arc::new(MemFile {
                tree: self.clone(),
                path,
            }))),
        }
    }

    fn uri(&self, path: &[String]) -> VfsUri {
        path.iter()
            .fold(VfsUri::new(self.scheme.clone()), |uri, seg| uri.with_segment(seg.clone()))
    }
}

fn split(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// In-memory root directory.
///
/// Thread-safe via an internal `RwLock`. Intermediate directories are
/// created on demand.
#[derive(Debug, Clone)]
pub struct MemoryRoot {
    tree: Arc<Tree>,
}

impl Default for MemoryRoot {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRoot {
    pub fn new() -> Self {
        Self::with_scheme(MEMORY_SCHEME)
    }

    pub fn with_scheme(scheme: impl Into<String>) -> Self {
        Self {
            tree: Arc::new(Tree {
                scheme: scheme.into(),
                entries: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    pub fn add_dir(&self, path: &str, description: &str) {
        self.insert(
            split(path),
            Entry::Dir {
                description: description.to_string(),
            },
        );
    }

    pub fn add_file(&self, path: &str, description: &str, size: &str) {
        self.insert(
            split(path),
            Entry::File {
                description: description.to_string(),
                size: size.to_string(),
            },
        );
    }

    fn insert(&self, path: Vec<String>, entry: Entry) {
        if path.is_empty() {
            return;
        }
        let mut entries = self
            .tree
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for depth in 1..path.len() {
            entries
                .entry(path[..depth].to_vec())
                .or_insert_with(|| Entry::Dir {
                    description: String::new(),
                });
        }
        entries.insert(path, entry);
    }

    fn root_dir(&self) -> MemDir {
        MemDir {
            tree: self.tree.clone(),
            path: Vec::new(),
        }
    }
}

impl VfsObject for MemoryRoot {
    fn uri(&self) -> VfsUri {
        VfsUri::new(self.tree.scheme.clone())
    }

    fn name(&self) -> String {
        self.tree.scheme.clone()
    }

    fn description(&self) -> String {
        "In-memory tree".to_string()
    }

    fn parent(&self) -> Option<VfsNode> {
        None
    }
}

#[async_trait]
impl VfsDir for MemoryRoot {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        self.root_dir().enumerate(visitor).await
    }
}

#[async_trait]
impl VfsRoot for MemoryRoot {
    async fn resolve(
        &self,
        uri: &VfsUri,
        _progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<VfsNode> {
        if uri.scheme() != self.tree.scheme {
            return Err(VfsError::NotFound(uri.to_string()));
        }
        self.tree
            .node(uri.segments().to_vec())
            .ok_or_else(|| VfsError::NotFound(uri.to_string()))
    }
}

struct MemDir {
    tree: Arc<Tree>,
    path: Vec<String>,
}

impl VfsObject for MemDir {
    fn uri(&self) -> VfsUri {
        self.tree.uri(&self.path)
    }

    fn name(&self) -> String {
        self.path.last().cloned().unwrap_or_else(|| self.tree.scheme.clone())
    }

    fn description(&self) -> String {
        match self.tree.get(&self.path) {
            Some(Entry::Dir { description }) => description,
            _ => String::new(),
        }
    }

    fn parent(&self) -> Option<VfsNode> {
        let (_, parent) = self.path.split_last()?;
        self.tree.node(parent.to_vec())
    }
}

#[async_trait]
impl VfsDir for MemDir {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        let children: Vec<(Vec<String>, Entry)> = {
            let entries = self
                .tree
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if !self.path.is_empty() && !entries.contains_key(&self.path) {
                return Err(VfsError::NotFound(self.uri().to_string()));
            }
            entries
                .iter()
                .filter(|(path, _)| {
                    path.len() == self.path.len() + 1 && path.starts_with(&self.path)
                })
                .map(|(path, entry)| (path.clone(), entry.clone()))
                .collect()
        };

        visitor.on_items_count(children.len() as u32);
        for (path, entry) in children {
            if visitor.is_canceled() {
                return Err(VfsError::Canceled);
            }
            match entry {
                Entry::Dir { .. } => visitor.on_dir(Arc::new(MemDir {
                    tree: self.tree.clone(),
                    path,
                })),
                Entry::File { .. } => visitor.on_file(Arc::new(MemFile {
                    tree: self.tree.clone(),
                    path,
                })),
            }
        }
        Ok(())
    }
}

struct MemFile {
    tree: Arc<Tree>,
    path: Vec<String>,
}

impl VfsObject for MemFile {
    fn uri(&self) -> VfsUri {
        self.tree.uri(&self.path)
    }

    fn name(&self) -> String {
        self.path.last().cloned().unwrap_or_default()
    }

    fn description(&self) -> String {
        match self.tree.get(&self.path) {
            Some(Entry::File { description, .. }) => description,
            _ => String::new(),
        }
    }

    fn parent(&self) -> Option<VfsNode> {
        let (_, parent) = self.path.split_last()?;
        self.tree.node(parent.to_vec())
    }
}

impl VfsFile for MemFile {
    fn size(&self) -> String {
        match self.tree.get(&self.path) {
            Some(Entry::File { size, .. }) => size,
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::list_dir;

    fn sample() -> MemoryRoot {
        let root = MemoryRoot::new();
        root.add_file("albums/ost/01 Intro.mp3", "opening", "1:02");
        root.add_file("albums/ost/02 Theme.mp3", "", "3:40");
        root.add_dir("playlists", "saved");
        root
    }

    #[tokio::test]
    async fn creates_intermediate_dirs() {
        let root = sample();
        let names: Vec<String> = list_dir(&root).await.unwrap().iter().map(|n| n.name()).collect();
        assert_eq!(names, ["albums", "playlists"]);

        let ost = root.resolve(&VfsUri::parse("mem:/albums/ost").unwrap(), None).await.unwrap();
        assert!(ost.is_dir());
        let tracks = list_dir(ost.as_dir().unwrap().as_ref()).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].as_file().unwrap().size(), "1:02");
        assert_eq!(tracks[0].description(), "opening");
    }

    #[tokio::test]
    async fn parent_is_rederived_from_uri() {
        let root = sample();
        let track = root
            .resolve(&VfsUri::parse("mem:/albums/ost/01%20Intro.mp3").unwrap(), None)
            .await
            .unwrap();
        let ost = track.parent().unwrap();
        assert_eq!(ost.uri().to_string(), "mem:/albums/ost");
        let albums = ost.parent().unwrap();
        let top = albums.parent().unwrap();
        assert!(top.uri().is_scheme_root());
        assert!(top.parent().is_none());
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let root = sample();
        let err = root.resolve(&VfsUri::parse("mem:/nope").unwrap(), None).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
        let err = root.resolve(&VfsUri::parse("other:/albums").unwrap(), None).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }
}
