//! `archive:` VFS root over a [`Catalog`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::seq::IndexedRandom;

use super::identifier::{Category, Identifier};
use super::{AlbumDetails, Catalog, TrackDetails};
use crate::error::{VfsError, VfsResult};
use crate::uri::VfsUri;
use crate::vfs::{
    DirVisitor, Extension, ExtensionId, FeedIterator, ProgressCallback, SearchEngine, VfsDir,
    VfsFile, VfsNode, VfsObject, VfsRoot, natural_cmp,
};

/// Attempts the random feed makes before giving up.
const FEED_ATTEMPTS: usize = 5;

/// Root of the archive tree.
#[derive(Clone)]
pub struct ArchiveRoot {
    catalog: Arc<dyn Catalog>,
}

impl ArchiveRoot {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }
}

/// Build the object for `id` without touching the catalog.
fn node_for(catalog: &Arc<dyn Catalog>, id: Identifier) -> VfsNode {
    if id.category.is_none() {
        return VfsNode::Dir(Arc::new(ArchiveRoot::new(catalog.clone())));
    }
    let depth = (id.scope.is_some(), id.album.is_some(), id.track.is_some());
    let base = Base {
        catalog: catalog.clone(),
        id,
    };
    match depth {
        (_, true, true) => VfsNode::File(Arc::new(TrackFile {
            base,
            details: None,
        })),
        (_, true, false) => VfsNode::Dir(Arc::new(AlbumDir::new(base, None))),
        (true, false, _) => VfsNode::Dir(Arc::new(ScopeDir { base })),
        _ => VfsNode::Dir(Arc::new(CategoryDir { base })),
    }
}

impl VfsObject for ArchiveRoot {
    fn uri(&self) -> VfsUri {
        Identifier::default().to_uri()
    }

    fn name(&self) -> String {
        "Archive".to_string()
    }

    fn description(&self) -> String {
        "Game and anime soundtrack archive".to_string()
    }

    fn parent(&self) -> Option<VfsNode> {
        None
    }

    fn extension(&self, id: ExtensionId) -> Option<Extension> {
        match id {
            ExtensionId::Icon => Some(Extension::Icon("ic_archive".to_string())),
            ExtensionId::SearchEngine => Some(Extension::SearchEngine(Arc::new(TrackSearch {
                catalog: self.catalog.clone(),
            }))),
            _ => None,
        }
    }
}

#[async_trait]
impl VfsDir for ArchiveRoot {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        for category in Category::BROWSABLE {
            visitor.on_dir(Arc::new(CategoryDir {
                base: Base {
                    catalog: self.catalog.clone(),
                    id: Identifier::category(category),
                },
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl VfsRoot for ArchiveRoot {
    async fn resolve(
        &self,
        uri: &VfsUri,
        _progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<VfsNode> {
        let id = Identifier::find(uri).ok_or_else(|| VfsError::NotFound(uri.to_string()))?;
        if let (Some(album), Some(track)) = (&id.album, &id.track) {
            let details = self.catalog.query_track(&album.id, &track.id).await?;
            return Ok(VfsNode::File(Arc::new(TrackFile {
                base: Base {
                    catalog: self.catalog.clone(),
                    id,
                },
                details: Some(details),
            })));
        }
        Ok(node_for(&self.catalog, id))
    }
}

struct Base {
    catalog: Arc<dyn Catalog>,
    id: Identifier,
}

impl Base {
    fn uri(&self) -> VfsUri {
        self.id.to_uri()
    }

    fn name(&self) -> String {
        let id = &self.id;
        id.track
            .as_ref()
            .map(|t| t.title.clone())
            .or_else(|| id.album.as_ref().map(|a| a.title.clone()))
            .or_else(|| id.scope.as_ref().map(|s| s.title.clone()))
            .or_else(|| id.category.map(|c| c.title().to_string()))
            .unwrap_or_default()
    }

    fn parent(&self) -> Option<VfsNode> {
        self.id.parent().map(|id| node_for(&self.catalog, id))
    }

    fn child(&self, id: Identifier) -> Base {
        Base {
            catalog: self.catalog.clone(),
            id,
        }
    }
}

struct CategoryDir {
    base: Base,
}

impl CategoryDir {
    fn is_random(&self) -> bool {
        self.base.id.category == Some(Category::Random)
    }
}

impl VfsObject for CategoryDir {
    fn uri(&self) -> VfsUri {
        self.base.uri()
    }

    fn name(&self) -> String {
        self.base.name()
    }

    fn parent(&self) -> Option<VfsNode> {
        self.base.parent()
    }

    fn extension(&self, id: ExtensionId) -> Option<Extension> {
        if !self.is_random() {
            return None;
        }
        match id {
            ExtensionId::Feed => Some(Extension::Feed(Arc::new(RandomFeed {
                base: self.base.child(self.base.id.clone()),
            }))),
            ExtensionId::Icon => Some(Extension::Icon("ic_radio".to_string())),
            _ => None,
        }
    }
}

#[async_trait]
impl VfsDir for CategoryDir {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        let Some(kind) = self.base.id.category.and_then(|c| c.scope_type()) else {
            return Ok(());
        };
        self.base
            .catalog
            .query_scopes(kind, &mut |scope| {
                visitor.on_dir(Arc::new(ScopeDir {
                    base: self.base.child(self.base.id.clone().with_scope(scope)),
                }));
            })
            .await?;
        Ok(())
    }
}

struct ScopeDir {
    base: Base,
}

impl VfsObject for ScopeDir {
    fn uri(&self) -> VfsUri {
        self.base.uri()
    }

    fn name(&self) -> String {
        self.base.name()
    }

    fn parent(&self) -> Option<VfsNode> {
        self.base.parent()
    }
}

/// Forwards catalog progress to a directory visitor shared with the item callback.
struct VisitorProgress<'a, 'b> {
    visitor: &'a Mutex<&'b mut dyn DirVisitor>,
}

impl ProgressCallback for VisitorProgress<'_, '_> {
    fn on_progress(&self, done: u32, total: u32) {
        self.visitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_progress(done, total);
    }

    fn is_canceled(&self) -> bool {
        self.visitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_canceled()
    }
}

#[async_trait]
impl VfsDir for ScopeDir {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        let Some(scope) = &self.base.id.scope else {
            return Ok(());
        };
        let shared = Mutex::new(visitor);
        let progress = VisitorProgress { visitor: &shared };
        self.base
            .catalog
            .query_albums(
                &scope.id,
                &mut |album: AlbumDetails| {
                    let id = self.base.id.clone().with_album(album.album.clone());
                    let dir = AlbumDir::new(self.base.child(id), Some(album));
                    shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .on_dir(Arc::new(dir));
                },
                Some(&progress),
            )
            .await?;
        Ok(())
    }
}

struct AlbumDir {
    base: Base,
    details: Option<AlbumDetails>,
    /// Track URI to position, filled while enumerating.
    positions: Arc<Mutex<HashMap<String, u32>>>,
}

impl AlbumDir {
    fn new(base: Base, details: Option<AlbumDetails>) -> Self {
        Self {
            base,
            details,
            positions: Arc::default(),
        }
    }
}

impl VfsObject for AlbumDir {
    fn uri(&self) -> VfsUri {
        self.base.uri()
    }

    fn name(&self) -> String {
        self.base.name()
    }

    fn description(&self) -> String {
        self.details
            .as_ref()
            .map(|d| d.details.clone())
            .unwrap_or_default()
    }

    fn parent(&self) -> Option<VfsNode> {
        self.base.parent()
    }

    fn extension(&self, id: ExtensionId) -> Option<Extension> {
        match id {
            ExtensionId::Comparator => {
                let positions = self.positions.clone();
                Some(Extension::Comparator(Arc::new(move |a: &VfsNode, b: &VfsNode| {
                    let positions = positions.lock().unwrap_or_else(PoisonError::into_inner);
                    match (
                        positions.get(&a.uri().to_string()),
                        positions.get(&b.uri().to_string()),
                    ) {
                        (Some(x), Some(y)) => x.cmp(y),
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => natural_cmp(&a.name(), &b.name()),
                    }
                })))
            }
            ExtensionId::Icon => self
                .details
                .as_ref()
                .and_then(|d| d.image.clone())
                .map(Extension::Icon),
            _ => None,
        }
    }
}

#[async_trait]
impl VfsDir for AlbumDir {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        let Some(album) = &self.base.id.album else {
            return Ok(());
        };
        let mut tracks = Vec::new();
        let details = self
            .base
            .catalog
            .query_album_details(&album.id, &mut |track| tracks.push(track))
            .await?;
        if let Some(details) = details.filter(|d| d.album.id != album.id) {
            tracing::debug!(alias = %album.id, canonical = %details.album.id, "album alias detected");
        }

        visitor.on_items_count(tracks.len() as u32);
        let mut positions = self.positions.lock().unwrap_or_else(PoisonError::into_inner);
        for track in tracks {
            let file = TrackFile::from_details(&self.base, track);
            positions.insert(file.uri().to_string(), file.index());
            visitor.on_file(Arc::new(file));
        }
        Ok(())
    }
}

struct TrackFile {
    base: Base,
    details: Option<TrackDetails>,
}

impl TrackFile {
    /// A track listed under `parent`, re-keyed to the album the catalog reported.
    fn from_details(parent: &Base, details: TrackDetails) -> Self {
        let id = Identifier {
            album: Some(details.album.clone()),
            track: Some(details.track.clone()),
            ..parent.id.clone()
        };
        Self {
            base: parent.child(id),
            details: Some(details),
        }
    }

    fn index(&self) -> u32 {
        self.details.as_ref().map(|d| d.index).unwrap_or(u32::MAX)
    }
}

impl VfsObject for TrackFile {
    fn uri(&self) -> VfsUri {
        self.base.uri()
    }

    fn name(&self) -> String {
        self.base.name()
    }

    fn description(&self) -> String {
        self.details
            .as_ref()
            .map(|d| d.size.clone())
            .unwrap_or_default()
    }

    fn parent(&self) -> Option<VfsNode> {
        self.base.parent()
    }

    fn extension(&self, id: ExtensionId) -> Option<Extension> {
        let (album, track) = (self.base.id.album.as_ref()?, self.base.id.track.as_ref()?);
        match id {
            ExtensionId::CachePath => Some(Extension::CachePath(format!(
                "{}/{}",
                album.id, track.id
            ))),
            ExtensionId::DownloadUris => {
                let location = self.details.as_ref()?.location.clone()?;
                Some(Extension::DownloadUris(vec![location]))
            }
            _ => None,
        }
    }
}

impl VfsFile for TrackFile {
    fn size(&self) -> String {
        self.details
            .as_ref()
            .map(|d| d.duration.clone())
            .unwrap_or_default()
    }
}

/// Random tracks from random albums.
struct RandomFeed {
    base: Base,
}

#[async_trait]
impl FeedIterator for RandomFeed {
    async fn next_file(&self) -> VfsResult<Option<Arc<dyn VfsFile>>> {
        for attempt in 1..=FEED_ATTEMPTS {
            let mut tracks = Vec::new();
            match self
                .base
                .catalog
                .query_random_album(&mut |track| tracks.push(track))
                .await
            {
                Ok(_) => {
                    let picked = tracks.choose(&mut rand::rng()).cloned();
                    if let Some(track) = picked {
                        return Ok(Some(Arc::new(TrackFile::from_details(&self.base, track))));
                    }
                }
                Err(e) if e.is_canceled() => return Err(e),
                Err(e) => tracing::warn!(attempt, error = %e, "failed to get next random track"),
            }
        }
        tracing::debug!("no random track after {} tries", FEED_ATTEMPTS);
        Ok(None)
    }
}

/// Catalog-side track search.
struct TrackSearch {
    catalog: Arc<dyn Catalog>,
}

#[async_trait]
impl SearchEngine for TrackSearch {
    async fn find(&self, query: &str, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        let parent = Base {
            catalog: self.catalog.clone(),
            id: Identifier::category(Category::Albums),
        };
        self.catalog
            .find_tracks(query, &mut |track| {
                visitor.on_file(Arc::new(TrackFile::from_details(&parent, track)));
            })
            .await
    }
}
