//! Virtual filesystem object model.
//!
//! Every catalog is exposed as a tree of [`VfsDir`] and [`VfsFile`] objects
//! addressed by [`VfsUri`](crate::uri::VfsUri):
//!
//! - **VfsRouter**: mounts roots by scheme, owns `vfs:/`
//! - **MemoryRoot**: in-memory tree (`mem:`), for demos and tests
//! - **CachingResolver**: bounded LRU of resolved objects
//!
//! Optional behaviour (sort order, search, feeds, icons, download locations)
//! is discovered through [`VfsObject::extension`].

mod compare;
mod extension;
mod memory;
mod resolver;
mod router;
pub mod schema;
mod traits;

pub use compare::{comparator_for, natural_cmp, natural_comparator, sort_nodes};
pub use extension::{Comparator, Extension, ExtensionId, FeedIterator, SearchEngine};
pub use memory::{MEMORY_SCHEME, MemoryRoot};
pub use resolver::{CachingResolver, DEFAULT_CACHE_CAPACITY, Resolver};
pub use router::{MountInfo, VfsRouter};
pub use traits::{
    CollectVisitor, DirVisitor, ProgressCallback, VfsDir, VfsFile, VfsNode, VfsObject, VfsRoot,
    list_dir,
};
