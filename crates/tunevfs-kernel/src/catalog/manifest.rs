//! A remote catalog backed by a JSON manifest file.
//!
//! The file is re-read on every query, so editing it behaves like the remote
//! changing. A missing or unreadable file counts as the network being down.
//!
//! ```json
//! {
//!   "scopes": { "series": [{ "id": "zelda", "title": "The Legend of Zelda" }] },
//!   "albums": [{
//!     "id": "oot", "title": "Ocarina of Time", "scopes": ["zelda"],
//!     "tracks": [{ "id": "01.mp3", "title": "Title Theme", "duration": "1:52" }]
//!   }],
//!   "aliases": { "ocarina": "oot" }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::{Album, AlbumDetails, RemoteCatalog, Scope, ScopeType, Track, TrackDetails};
use crate::error::{VfsError, VfsResult};
use crate::vfs::ProgressCallback;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub scopes: HashMap<ScopeType, Vec<Scope>>,
    #[serde(default)]
    pub albums: Vec<ManifestAlbum>,
    /// Old album id to current album id.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAlbum {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub tracks: Vec<ManifestTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTrack {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl ManifestAlbum {
    fn album(&self) -> Album {
        Album {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }

    fn details(&self) -> AlbumDetails {
        AlbumDetails {
            album: self.album(),
            details: self.details.clone(),
            image: self.image.clone(),
        }
    }

    fn tracks(&self) -> impl Iterator<Item = TrackDetails> + '_ {
        self.tracks.iter().enumerate().map(|(idx, track)| TrackDetails {
            album: self.album(),
            track: Track {
                id: track.id.clone(),
                title: track.title.clone(),
            },
            index: idx as u32 + 1,
            duration: track.duration.clone(),
            size: track.size.clone(),
            location: track.location.clone(),
        })
    }
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn album(&self, id: &str) -> Option<&ManifestAlbum> {
        let id = self.aliases.get(id).map(String::as_str).unwrap_or(id);
        self.albums.iter().find(|album| album.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct ManifestCatalog {
    path: PathBuf,
}

impl ManifestCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> VfsResult<Manifest> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| VfsError::remote(format!("{}: {}", self.path.display(), e)))?;
        Manifest::parse(&text)
            .map_err(|e| VfsError::remote(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl RemoteCatalog for ManifestCatalog {
    async fn query_scopes(
        &self,
        kind: ScopeType,
        visitor: &mut (dyn FnMut(Scope) + Send),
    ) -> VfsResult<()> {
        let manifest = self.load().await?;
        for scope in manifest.scopes.get(&kind).into_iter().flatten() {
            visitor(scope.clone());
        }
        Ok(())
    }

    async fn query_albums(
        &self,
        scope: &str,
        visitor: &mut (dyn FnMut(AlbumDetails) + Send),
        progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<()> {
        let manifest = self.load().await?;
        let albums: Vec<&ManifestAlbum> = manifest
            .albums
            .iter()
            .filter(|album| album.scopes.iter().any(|s| s == scope))
            .collect();
        let total = albums.len() as u32;
        for (idx, album) in albums.into_iter().enumerate() {
            if progress.is_some_and(|p| p.is_canceled()) {
                return Err(VfsError::Canceled);
            }
            visitor(album.details());
            if let Some(progress) = progress {
                progress.on_progress(idx as u32 + 1, total);
            }
        }
        Ok(())
    }

    async fn query_album_details(
        &self,
        album: &str,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<Option<AlbumDetails>> {
        let manifest = self.load().await?;
        let Some(album) = manifest.album(album) else {
            return Ok(None);
        };
        album.tracks().for_each(|track| visitor(track));
        Ok(Some(album.details()))
    }

    async fn query_random_album(
        &self,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<Option<AlbumDetails>> {
        let manifest = self.load().await?;
        let Some(album) = manifest.albums.choose(&mut rand::rng()) else {
            return Ok(None);
        };
        album.tracks().for_each(|track| visitor(track));
        Ok(Some(album.details()))
    }

    async fn query_track(&self, album: &str, track: &str) -> VfsResult<Option<TrackDetails>> {
        let manifest = self.load().await?;
        Ok(manifest
            .album(album)
            .and_then(|album| album.tracks().find(|t| t.track.id == track)))
    }

    async fn find_tracks(
        &self,
        query: &str,
        visitor: &mut (dyn FnMut(TrackDetails) + Send),
    ) -> VfsResult<()> {
        let manifest = self.load().await?;
        let needle = query.to_lowercase();
        manifest
            .albums
            .iter()
            .flat_map(ManifestAlbum::tracks)
            .filter(|t| t.track.title.to_lowercase().contains(&needle))
            .for_each(|track| visitor(track));
        Ok(())
    }

    fn search_supported(&self) -> bool {
        true
    }

    async fn is_network_available(&self) -> bool {
        tokio::fs::metadata(&self.path).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "scopes": { "series": [{ "id": "zelda", "title": "The Legend of Zelda" }] },
        "albums": [
            {
                "id": "oot", "title": "Ocarina of Time", "scopes": ["zelda"],
                "tracks": [
                    { "id": "01.mp3", "title": "Title Theme", "duration": "1:52" },
                    { "id": "02.mp3", "title": "Kokiri Forest", "duration": "2:30" }
                ]
            },
            { "id": "mm", "title": "Majora's Mask", "scopes": ["zelda"] }
        ],
        "aliases": { "ocarina": "oot" }
    }"#;

    fn catalog() -> (tempfile::TempDir, ManifestCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, ManifestCatalog::new(path))
    }

    #[tokio::test]
    async fn albums_of_scope() {
        let (_dir, catalog) = catalog();
        let mut albums = Vec::new();
        catalog
            .query_albums("zelda", &mut |a| albums.push(a.album.id), None)
            .await
            .unwrap();
        assert_eq!(albums, ["oot", "mm"]);
    }

    #[tokio::test]
    async fn alias_reports_canonical_album() {
        let (_dir, catalog) = catalog();
        let mut tracks = Vec::new();
        let details = catalog
            .query_album_details("ocarina", &mut |t| tracks.push(t))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.album.id, "oot");
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].index, 2);
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let (_dir, catalog) = catalog();
        let mut found = Vec::new();
        catalog
            .find_tracks("FOREST", &mut |t| found.push(t.cache_key()))
            .await
            .unwrap();
        assert_eq!(found, ["oot/02.mp3"]);
    }

    #[tokio::test]
    async fn missing_file_is_offline() {
        let catalog = ManifestCatalog::new("/nonexistent/manifest.json");
        assert!(!catalog.is_network_available().await);
        let err = catalog.query_scopes(ScopeType::Series, &mut |_| {}).await.unwrap_err();
        assert!(matches!(err, VfsError::Remote(_)));
    }
}
