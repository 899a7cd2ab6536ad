//! Core VFS traits and types.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::extension::{Extension, ExtensionId};
use crate::error::VfsResult;
use crate::uri::VfsUri;

/// Anything addressable in the tree.
///
/// `parent()` is re-derived from the object's own identity on every call.
/// Objects never hold a link to their parent.
pub trait VfsObject: Send + Sync {
    fn uri(&self) -> VfsUri;

    fn name(&self) -> String;

    fn description(&self) -> String {
        String::new()
    }

    /// The enclosing directory, or `None` at the top of a catalog.
    fn parent(&self) -> Option<VfsNode>;

    /// Optional capability lookup. Everything is absent unless overridden.
    fn extension(&self, _id: ExtensionId) -> Option<Extension> {
        None
    }
}

/// A directory: pushes its children into a visitor.
#[async_trait]
pub trait VfsDir: VfsObject {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()>;
}

/// A file: carries a display size.
pub trait VfsFile: VfsObject {
    /// Display size (duration or byte count, whatever the catalog knows).
    fn size(&self) -> String {
        String::new()
    }
}

/// A directory that owns a URI scheme and can resolve any URI under it.
#[async_trait]
pub trait VfsRoot: VfsDir {
    /// Resolve `uri`, reporting progress for slow lookups if a callback is given.
    async fn resolve(
        &self,
        uri: &VfsUri,
        progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<VfsNode>;
}

/// Receives the children of a directory.
pub trait DirVisitor: Send {
    fn on_dir(&mut self, dir: Arc<dyn VfsDir>);

    fn on_file(&mut self, file: Arc<dyn VfsFile>);

    /// Total number of children, if the directory knows it up front.
    fn on_items_count(&mut self, _count: u32) {}

    fn on_progress(&mut self, _done: u32, _total: u32) {}

    /// Checked by enumerators between items.
    fn is_canceled(&self) -> bool {
        false
    }
}

/// Progress sink for slow resolution and remote queries.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, done: u32, total: u32);

    fn is_canceled(&self) -> bool {
        false
    }
}

/// A resolved object: either a directory or a file.
#[derive(Clone)]
pub enum VfsNode {
    Dir(Arc<dyn VfsDir>),
    File(Arc<dyn VfsFile>),
}

impl VfsNode {
    pub fn uri(&self) -> VfsUri {
        match self {
            VfsNode::Dir(dir) => dir.uri(),
            VfsNode::File(file) => file.uri(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            VfsNode::Dir(dir) => dir.name(),
            VfsNode::File(file) => file.name(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            VfsNode::Dir(dir) => dir.description(),
            VfsNode::File(file) => file.description(),
        }
    }

    pub fn parent(&self) -> Option<VfsNode> {
        match self {
            VfsNode::Dir(dir) => dir.parent(),
            VfsNode::File(file) => file.parent(),
        }
    }

    pub fn extension(&self, id: ExtensionId) -> Option<Extension> {
        match self {
            VfsNode::Dir(dir) => dir.extension(id),
            VfsNode::File(file) => file.extension(id),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, VfsNode::Dir(_))
    }

    pub fn as_dir(&self) -> Option<&Arc<dyn VfsDir>> {
        match self {
            VfsNode::Dir(dir) => Some(dir),
            VfsNode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&Arc<dyn VfsFile>> {
        match self {
            VfsNode::File(file) => Some(file),
            VfsNode::Dir(_) => None,
        }
    }
}

impl fmt::Debug for VfsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() { "Dir" } else { "File" };
        f.debug_tuple(kind).field(&self.uri().to_string()).finish()
    }
}

/// Visitor that collects children into a vector.
#[derive(Default)]
pub struct CollectVisitor {
    pub nodes: Vec<VfsNode>,
}

impl DirVisitor for CollectVisitor {
    fn on_dir(&mut self, dir: Arc<dyn VfsDir>) {
        self.nodes.push(VfsNode::Dir(dir));
    }

    fn on_file(&mut self, file: Arc<dyn VfsFile>) {
        self.nodes.push(VfsNode::File(file));
    }
}

/// Enumerate a directory into a vector.
pub async fn list_dir(dir: &dyn VfsDir) -> VfsResult<Vec<VfsNode>> {
    let mut visitor = CollectVisitor::default();
    dir.enumerate(&mut visitor).await?;
    Ok(visitor.nodes)
}
