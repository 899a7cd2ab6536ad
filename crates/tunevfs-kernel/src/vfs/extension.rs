//! Optional capabilities of VFS objects.
//!
//! An object answers [`VfsObject::extension`](super::VfsObject::extension)
//! with the capability for a given [`ExtensionId`], or `None`. The returned
//! [`Extension`] variant always matches the requested id.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::traits::{DirVisitor, VfsFile, VfsNode};
use crate::error::VfsResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionId {
    /// Custom ordering of a directory's children.
    Comparator,
    /// Catalog-side search, faster than walking the tree.
    SearchEngine,
    /// Endless stream of files (random picks).
    Feed,
    /// Icon resource name.
    Icon,
    /// Relative path used to cache a file's content locally.
    CachePath,
    /// Where a file's content can be downloaded from.
    DownloadUris,
    /// Intent asking the user for a permission before the object is usable.
    PermissionQuery,
}

/// Ordering of two siblings.
pub type Comparator = Arc<dyn Fn(&VfsNode, &VfsNode) -> Ordering + Send + Sync>;

/// Catalog-provided search below a directory.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Push every file matching `query` into `visitor`.
    async fn find(&self, query: &str, visitor: &mut dyn DirVisitor) -> VfsResult<()>;
}

/// Source of an endless stream of files.
#[async_trait]
pub trait FeedIterator: Send + Sync {
    /// Next file, or `None` once the feed gives up.
    async fn next_file(&self) -> VfsResult<Option<Arc<dyn VfsFile>>>;
}

#[derive(Clone)]
pub enum Extension {
    Comparator(Comparator),
    SearchEngine(Arc<dyn SearchEngine>),
    Feed(Arc<dyn FeedIterator>),
    Icon(String),
    CachePath(String),
    /// Absolute URLs, best first.
    DownloadUris(Vec<String>),
    PermissionQuery(String),
}

impl Extension {
    pub fn id(&self) -> ExtensionId {
        match self {
            Extension::Comparator(_) => ExtensionId::Comparator,
            Extension::SearchEngine(_) => ExtensionId::SearchEngine,
            Extension::Feed(_) => ExtensionId::Feed,
            Extension::Icon(_) => ExtensionId::Icon,
            Extension::CachePath(_) => ExtensionId::CachePath,
            Extension::DownloadUris(_) => ExtensionId::DownloadUris,
            Extension::PermissionQuery(_) => ExtensionId::PermissionQuery,
        }
    }

    pub fn into_comparator(self) -> Option<Comparator> {
        match self {
            Extension::Comparator(cmp) => Some(cmp),
            _ => None,
        }
    }

    pub fn into_search_engine(self) -> Option<Arc<dyn SearchEngine>> {
        match self {
            Extension::SearchEngine(engine) => Some(engine),
            _ => None,
        }
    }

    pub fn into_feed(self) -> Option<Arc<dyn FeedIterator>> {
        match self {
            Extension::Feed(feed) => Some(feed),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Extension::Icon(s) | Extension::CachePath(s) | Extension::PermissionQuery(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    pub fn into_download_uris(self) -> Option<Vec<String>> {
        match self {
            Extension::DownloadUris(uris) => Some(uris),
            _ => None,
        }
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extension::Icon(s) => f.debug_tuple("Icon").field(s).finish(),
            Extension::CachePath(s) => f.debug_tuple("CachePath").field(s).finish(),
            Extension::PermissionQuery(s) => f.debug_tuple("PermissionQuery").field(s).finish(),
            Extension::DownloadUris(uris) => f.debug_tuple("DownloadUris").field(uris).finish(),
            other => write!(f, "{:?}", other.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_matches_id() {
        let icon = Extension::Icon("ic_album".into());
        assert_eq!(icon.id(), ExtensionId::Icon);
        assert_eq!(icon.clone().into_string().as_deref(), Some("ic_album"));
        assert!(icon.into_comparator().is_none());

        let uris = Extension::DownloadUris(vec!["https://example.com/a.mp3".into()]);
        assert_eq!(uris.id(), ExtensionId::DownloadUris);
        assert_eq!(uris.into_download_uris().map(|u| u.len()), Some(1));
    }
}
