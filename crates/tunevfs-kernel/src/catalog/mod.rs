//! Album-archive catalog.
//!
//! ```text
//! archive:/
//! ├── series/<scope>/<album>/<track>
//! ├── platforms/<scope>/<album>/<track>
//! ├── types/<scope>/<album>/<track>
//! ├── years/<scope>/<album>/<track>
//! └── random                 (feed of random tracks)
//! ```
//!
//! A [`RemoteCatalog`] talks to the source. [`CachingCatalog`] puts the
//! cache-or-refresh coordinator in front of it, and [`ArchiveRoot`] exposes
//! the result as a VFS tree.

mod caching;
mod identifier;
mod manifest;
mod root;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VfsResult;
use crate::vfs::ProgressCallback;

pub use caching::{CachingCatalog, CatalogTtls};
pub use identifier::{ARCHIVE_SCHEME, Category, Identifier};
pub use manifest::{Manifest, ManifestCatalog};
pub use root::ArchiveRoot;

/// Grouping axes of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Series,
    Platforms,
    Types,
    Years,
}

impl ScopeType {
    pub const ALL: [ScopeType; 4] = [
        ScopeType::Series,
        ScopeType::Platforms,
        ScopeType::Types,
        ScopeType::Years,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Series => "series",
            ScopeType::Platforms => "platforms",
            ScopeType::Types => "types",
            ScopeType::Years => "years",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
}

/// An album as listed in a scope, with what the listing page tells about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumDetails {
    pub album: Album,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDetails {
    pub album: Album,
    pub track: Track,
    /// Position within the album, starting at 1.
    pub index: u32,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub size: String,
    /// Direct download location, when known.
    #[serde(default)]
    pub location: Option<String>,
}

impl TrackDetails {
    /// Key of the track in the cache: `album/track`.
    pub fn cache_key(&self) -> String {
        track_key(&self.album.id, &self.track.id)
    }
}

pub(crate) fn track_key(album: &str, track: &str) -> String {
    format!("{}/{}", album, track)
}

/// An album's details together with its tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumContent {
    pub details: AlbumDetails,
    pub tracks: Vec<TrackDetails>,
}

/// Access to the remote source.
///
/// Bulk queries push results into a visitor and may fail half way; point
/// lookups return the item or `None` when the source does not know it.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn query_scopes(
        &self,
        kind: ScopeType,
        visitor: &mut (dyn FnMut(Scope) + Send),
    ) -> VfsResult<()>;

    async fn query_albums(
        &self,
        scope: &str,
        visitor: &mut (dyn FnMut(AlbumDetails) + Send),
        progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<()>;

    /// Tracks of an album. The returned details may name a different
    /// (canonical) album id when the source redirected.
    async fn query_album_details(
        &self,
        album: &str,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<Option<AlbumDetails>>;

    async fn query_random_album(
        &self,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<Option<AlbumDetails>>;

    async fn query_track(&self, album: &str, track: &str) -> VfsResult<Option<TrackDetails>>;

    async fn find_tracks(
        &self,
        query: &str,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<()>;

    fn search_supported(&self) -> bool;

    async fn is_network_available(&self) -> bool;
}

/// What the VFS tree needs from a catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns whether anything was visited.
    async fn query_scopes(
        &self,
        kind: ScopeType,
        visitor: &mut (dyn FnMut(Scope) + Send),
    ) -> VfsResult<bool>;

    async fn query_albums(
        &self,
        scope: &str,
        visitor: &mut (dyn FnMut(AlbumDetails) + Send),
        progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<bool>;

    async fn query_album_details(
        &self,
        album: &str,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<Option<AlbumDetails>>;

    async fn query_random_album(
        &self,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<Option<AlbumDetails>>;

    /// Fails with [`VfsError::NotFound`](crate::error::VfsError::NotFound)
    /// when the track is unknown.
    async fn query_track(&self, album: &str, track: &str) -> VfsResult<TrackDetails>;

    async fn find_tracks(
        &self,
        query: &str,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<()>;
}
