//! Cache-backed catalog.
//!
//! Listings (scopes, albums, album tracks) refresh on expiry and fall back to
//! stale rows when the remote fails. Single tracks are point lookups whose
//! failures propagate. The random album ignores lifetimes and is fetched
//! whenever the network is reachable.
//!
//! Cache layout:
//!
//! | Category | Object id | Scope |
//! |----------|-----------|-------|
//! | `scopes/<type>` | scope id | scope type |
//! | `albums` | album id | scope id |
//! | `tracks` | `album/track` | canonical album id |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;

use super::{
    AlbumContent, AlbumDetails, Catalog, RemoteCatalog, Scope, ScopeType, TrackDetails, track_key,
};
use crate::cache::{
    CacheOrRefresh, CacheStore, CacheTx, FetchCommand, QueryCommand, RandomCommand, StoreResult,
};
use crate::error::{VfsError, VfsResult};
use crate::vfs::ProgressCallback;

const ALBUMS: &str = "albums";
const TRACKS: &str = "tracks";

fn scopes_category(kind: ScopeType) -> String {
    format!("scopes/{}", kind.as_str())
}

fn album_lifetime_key(album: &str) -> String {
    format!("album:{}", album)
}

/// How long each kind of listing stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogTtls {
    pub scopes: TimeDelta,
    pub albums: TimeDelta,
    pub details: TimeDelta,
}

impl Default for CatalogTtls {
    fn default() -> Self {
        Self {
            scopes: TimeDelta::days(7),
            albums: TimeDelta::days(1),
            details: TimeDelta::days(7),
        }
    }
}

pub struct CachingCatalog<R> {
    remote: R,
    cache: CacheOrRefresh,
    ttls: CatalogTtls,
}

impl<R: RemoteCatalog> CachingCatalog<R> {
    pub fn new(remote: R, store: Arc<CacheStore>, ttls: CatalogTtls) -> Self {
        Self {
            remote,
            cache: CacheOrRefresh::new(store),
            ttls,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        self.cache.store()
    }
}

#[async_trait]
impl<R: RemoteCatalog> Catalog for CachingCatalog<R> {
    async fn query_scopes(
        &self,
        kind: ScopeType,
        visitor: &mut (dyn FnMut(Scope) + Send),
    ) -> VfsResult<bool> {
        let cmd = ScopesQuery {
            remote: &self.remote,
            kind,
            ttl: self.ttls.scopes,
        };
        self.cache.query(&cmd, |scope| visitor(scope)).await
    }

    async fn query_albums(
        &self,
        scope: &str,
        visitor: &mut (dyn FnMut(AlbumDetails) + Send),
        progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<bool> {
        let cmd = AlbumsQuery {
            remote: &self.remote,
            scope,
            progress,
            ttl: self.ttls.albums,
        };
        self.cache.query(&cmd, |album| visitor(album)).await
    }

    async fn query_album_details(
        &self,
        album: &str,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<Option<AlbumDetails>> {
        let cmd = AlbumDetailsQuery {
            remote: &self.remote,
            album,
            ttl: self.ttls.details,
        };
        let mut found = None;
        self.cache
            .query(&cmd, |content| found = Some(content))
            .await?;
        Ok(found.map(|content| visit_content(content, visitor)))
    }

    async fn query_random_album(
        &self,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<Option<AlbumDetails>> {
        let cmd = RandomAlbum {
            remote: &self.remote,
        };
        let content = self.cache.query_random(&cmd).await?;
        Ok(content.map(|content| visit_content(content, visitor)))
    }

    async fn query_track(&self, album: &str, track: &str) -> VfsResult<TrackDetails> {
        let cmd = TrackLookup {
            remote: &self.remote,
            album,
            track,
        };
        self.cache.fetch(&cmd).await
    }

    async fn find_tracks(
        &self,
        query: &str,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<()> {
        if self.remote.search_supported() {
            return self.remote.find_tracks(query, visitor).await;
        }
        for track in self.store().find_objects::<TrackDetails>(TRACKS, query)? {
            visitor(track);
        }
        Ok(())
    }
}

fn visit_content(
    content: AlbumContent,
    visitor: &mut (dyn FnMut(TrackDetails) + Send),
) -> AlbumDetails {
    for track in content.tracks {
        visitor(track);
    }
    content.details
}

fn persist_album(tx: &CacheTx<'_>, details: &AlbumDetails, tracks: &[TrackDetails]) -> StoreResult<()> {
    let canonical = &details.album.id;
    for track in tracks {
        let key = track.cache_key();
        tx.add_object(TRACKS, &key, &track.track.title, track)?;
        tx.add_to_scope(TRACKS, canonical, &key, track.index as usize)?;
    }
    tx.add_object(ALBUMS, canonical, &details.album.title, details)
}

fn read_album(store: &CacheStore, album: &str) -> StoreResult<Option<AlbumContent>> {
    let Some(details) = store.query_object::<AlbumDetails>(ALBUMS, album)? else {
        return Ok(None);
    };
    let tracks = store.query_scope(TRACKS, &details.album.id)?;
    Ok(Some(AlbumContent { details, tracks }))
}

struct ScopesQuery<'a, R> {
    remote: &'a R,
    kind: ScopeType,
    ttl: TimeDelta,
}

#[async_trait]
impl<'a, R: RemoteCatalog> QueryCommand for ScopesQuery<'a, R> {
    type Staged = Vec<Scope>;
    type Item = Scope;

    fn lifetime_key(&self) -> String {
        format!("scopes:{}", self.kind.as_str())
    }

    fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    async fn refresh(&self) -> VfsResult<Vec<Scope>> {
        let mut scopes = Vec::new();
        self.remote
            .query_scopes(self.kind, &mut |scope| scopes.push(scope))
            .await?;
        Ok(scopes)
    }

    fn persist(&self, tx: &CacheTx<'_>, scopes: &Vec<Scope>) -> StoreResult<()> {
        let category = scopes_category(self.kind);
        tx.cleanup_scope(&category, self.kind.as_str())?;
        for (pos, scope) in scopes.iter().enumerate() {
            tx.add_object(&category, &scope.id, &scope.title, scope)?;
            tx.add_to_scope(&category, self.kind.as_str(), &scope.id, pos)?;
        }
        Ok(())
    }

    fn read_from_cache(&self, store: &CacheStore) -> StoreResult<Vec<Scope>> {
        store.query_scope(&scopes_category(self.kind), self.kind.as_str())
    }
}

struct AlbumsQuery<'a, R> {
    remote: &'a R,
    scope: &'a str,
    progress: Option<&'a dyn ProgressCallback>,
    ttl: TimeDelta,
}

#[async_trait]
impl<'a, R: RemoteCatalog> QueryCommand for AlbumsQuery<'a, R> {
    type Staged = Vec<AlbumDetails>;
    type Item = AlbumDetails;

    fn lifetime_key(&self) -> String {
        format!("albums:{}", self.scope)
    }

    fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    async fn refresh(&self) -> VfsResult<Vec<AlbumDetails>> {
        let mut albums = Vec::new();
        self.remote
            .query_albums(self.scope, &mut |album| albums.push(album), self.progress)
            .await?;
        Ok(albums)
    }

    fn persist(&self, tx: &CacheTx<'_>, albums: &Vec<AlbumDetails>) -> StoreResult<()> {
        tx.cleanup_scope(ALBUMS, self.scope)?;
        for (pos, album) in albums.iter().enumerate() {
            tx.add_object(ALBUMS, &album.album.id, &album.album.title, album)?;
            tx.add_to_scope(ALBUMS, self.scope, &album.album.id, pos)?;
        }
        Ok(())
    }

    fn read_from_cache(&self, store: &CacheStore) -> StoreResult<Vec<AlbumDetails>> {
        store.query_scope(ALBUMS, self.scope)
    }
}

struct AlbumDetailsQuery<'a, R> {
    remote: &'a R,
    album: &'a str,
    ttl: TimeDelta,
}

#[async_trait]
impl<'a, R: RemoteCatalog> QueryCommand for AlbumDetailsQuery<'a, R> {
    type Staged = (AlbumDetails, Vec<TrackDetails>);
    type Item = AlbumContent;

    fn lifetime_key(&self) -> String {
        album_lifetime_key(self.album)
    }

    fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    async fn refresh(&self) -> VfsResult<Self::Staged> {
        let mut tracks = Vec::new();
        let details = self
            .remote
            .query_album_details(self.album, &mut |track| tracks.push(track))
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("album {}", self.album)))?;
        Ok((details, tracks))
    }

    fn persist(&self, tx: &CacheTx<'_>, staged: &Self::Staged) -> StoreResult<()> {
        let (details, tracks) = staged;
        let canonical = details.album.id.as_str();
        tx.cleanup_scope(TRACKS, self.album)?;
        if canonical != self.album {
            tracing::debug!(alias = %self.album, canonical = %canonical, "album alias detected");
            tx.cleanup_scope(TRACKS, canonical)?;
            tx.cleanup_object(ALBUMS, self.album)?;
            tx.rekey_memberships(ALBUMS, self.album, canonical)?;
            tx.add_alias(ALBUMS, self.album, canonical)?;
        }
        persist_album(tx, details, tracks)?;
        if canonical != self.album {
            tx.touch(&album_lifetime_key(canonical))?;
        }
        Ok(())
    }

    fn read_from_cache(&self, store: &CacheStore) -> StoreResult<Vec<AlbumContent>> {
        Ok(read_album(store, self.album)?.into_iter().collect())
    }
}

struct RandomAlbum<'a, R> {
    remote: &'a R,
}

#[async_trait]
impl<'a, R: RemoteCatalog> RandomCommand for RandomAlbum<'a, R> {
    type Item = AlbumContent;

    fn key(&self) -> String {
        album_lifetime_key("random")
    }

    async fn is_network_available(&self) -> bool {
        self.remote.is_network_available().await
    }

    async fn fetch_random(&self) -> VfsResult<AlbumContent> {
        let mut tracks = Vec::new();
        let details = self
            .remote
            .query_random_album(&mut |track| tracks.push(track))
            .await?
            .ok_or_else(|| VfsError::NotFound("random album".to_string()))?;
        Ok(AlbumContent { details, tracks })
    }

    fn persist(&self, tx: &CacheTx<'_>, content: &AlbumContent) -> StoreResult<()> {
        let canonical = &content.details.album.id;
        tx.cleanup_scope(TRACKS, canonical)?;
        persist_album(tx, &content.details, &content.tracks)?;
        tx.touch(&album_lifetime_key(canonical))
    }

    fn read_random_cached(&self, store: &CacheStore) -> StoreResult<Option<AlbumContent>> {
        let Some(details) = store.query_random_object::<AlbumDetails>(ALBUMS)? else {
            return Ok(None);
        };
        read_album(store, &details.album.id)
    }
}

struct TrackLookup<'a, R> {
    remote: &'a R,
    album: &'a str,
    track: &'a str,
}

#[async_trait]
impl<'a, R: RemoteCatalog> FetchCommand for TrackLookup<'a, R> {
    type Item = TrackDetails;

    fn key(&self) -> String {
        format!("track:{}", track_key(self.album, self.track))
    }

    fn read_cached(&self, store: &CacheStore) -> StoreResult<Option<TrackDetails>> {
        let album = store.resolve_alias(ALBUMS, self.album)?;
        store.query_object(TRACKS, &track_key(&album, self.track))
    }

    async fn fetch_one(&self) -> VfsResult<TrackDetails> {
        self.remote
            .query_track(self.album, self.track)
            .await?
            .ok_or_else(|| VfsError::NotFound(format!("track {}", track_key(self.album, self.track))))
    }

    fn persist(&self, tx: &CacheTx<'_>, track: &TrackDetails) -> StoreResult<()> {
        tx.add_object(TRACKS, &track.cache_key(), &track.track.title, track)
    }
}
