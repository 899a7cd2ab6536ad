//! Archive object identity.
//!
//! `archive:/<category>[/<scope>][/<album>[/<track>]]?scope=..&album=..&track=..`
//!
//! Path segments carry ids, query parameters carry the display titles so an
//! object can be rebuilt from its URI alone. Categories without scopes
//! (`random`, `albums`) go straight to the album.

use super::{Album, Scope, ScopeType, Track};
use crate::uri::VfsUri;

pub const ARCHIVE_SCHEME: &str = "archive";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Series,
    Platforms,
    Types,
    Years,
    /// Endless feed of random tracks.
    Random,
    /// Albums reached without a scope, e.g. from search results.
    Albums,
}

impl Category {
    /// Categories listed in the archive root.
    pub const BROWSABLE: [Category; 5] = [
        Category::Series,
        Category::Platforms,
        Category::Types,
        Category::Years,
        Category::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Series => "series",
            Category::Platforms => "platforms",
            Category::Types => "types",
            Category::Years => "years",
            Category::Random => "random",
            Category::Albums => "albums",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Category::Series => "Series",
            Category::Platforms => "Platforms",
            Category::Types => "Types",
            Category::Years => "Years",
            Category::Random => "Random",
            Category::Albums => "Albums",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "series" => Some(Category::Series),
            "platforms" => Some(Category::Platforms),
            "types" => Some(Category::Types),
            "years" => Some(Category::Years),
            "random" => Some(Category::Random),
            "albums" => Some(Category::Albums),
            _ => None,
        }
    }

    pub fn scope_type(&self) -> Option<ScopeType> {
        match self {
            Category::Series => Some(ScopeType::Series),
            Category::Platforms => Some(ScopeType::Platforms),
            Category::Types => Some(ScopeType::Types),
            Category::Years => Some(ScopeType::Years),
            Category::Random | Category::Albums => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifier {
    pub category: Option<Category>,
    pub scope: Option<Scope>,
    pub album: Option<Album>,
    pub track: Option<Track>,
}

impl Identifier {
    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn with_scope(self, scope: Scope) -> Self {
        Self {
            scope: Some(scope),
            ..self
        }
    }

    pub fn with_album(self, album: Album) -> Self {
        Self {
            album: Some(album),
            ..self
        }
    }

    pub fn with_track(self, track: Track) -> Self {
        Self {
            track: Some(track),
            ..self
        }
    }

    /// Drop the most specific component. `None` at the archive root.
    pub fn parent(&self) -> Option<Self> {
        let mut parent = self.clone();
        if parent.track.take().is_some()
            || parent.album.take().is_some()
            || parent.scope.take().is_some()
            || parent.category.take().is_some()
        {
            Some(parent)
        } else {
            None
        }
    }

    pub fn to_uri(&self) -> VfsUri {
        let mut uri = VfsUri::new(ARCHIVE_SCHEME);
        let Some(category) = self.category else {
            return uri;
        };
        uri = uri.with_segment(category.as_str());
        if let Some(scope) = &self.scope {
            uri = uri.with_segment(scope.id.clone());
        }
        if let Some(album) = &self.album {
            uri = uri.with_segment(album.id.clone());
        }
        if let Some(track) = &self.track {
            uri = uri.with_segment(track.id.clone());
        }
        for (key, title) in [
            ("scope", self.scope.as_ref().map(|s| &s.title)),
            ("album", self.album.as_ref().map(|a| &a.title)),
            ("track", self.track.as_ref().map(|t| &t.title)),
        ] {
            if let Some(title) = title {
                uri = uri.with_query(key, title.clone());
            }
        }
        uri
    }

    pub fn find(uri: &VfsUri) -> Option<Self> {
        if uri.scheme() != ARCHIVE_SCHEME {
            return None;
        }
        let mut segments = uri.segments().iter();
        let Some(category) = segments.next() else {
            return Some(Self::default());
        };
        let category = Category::parse(category)?;
        let title = |key: &str, id: &str| uri.query(key).unwrap_or(id).to_string();

        let mut id = Self::category(category);
        if category.scope_type().is_some() {
            if let Some(scope) = segments.next() {
                id.scope = Some(Scope {
                    id: scope.clone(),
                    title: title("scope", scope),
                });
            }
        }
        if let Some(album) = segments.next() {
            id.album = Some(Album {
                id: album.clone(),
                title: title("album", album),
            });
        }
        if let Some(track) = segments.next() {
            id.track = Some(Track {
                id: track.clone(),
                title: title("track", track),
            });
        }
        if segments.next().is_some() {
            return None;
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Identifier {
        Identifier::category(Category::Series)
            .with_scope(Scope {
                id: "zelda".into(),
                title: "The Legend of Zelda".into(),
            })
            .with_album(Album {
                id: "ocarina-of-time".into(),
                title: "Ocarina of Time".into(),
            })
            .with_track(Track {
                id: "01 Title.mp3".into(),
                title: "Title Theme".into(),
            })
    }

    #[test]
    fn uri_round_trip() {
        let id = full();
        let uri = id.to_uri();
        assert_eq!(uri.segments().len(), 4);
        assert_eq!(Identifier::find(&uri), Some(id));
        assert_eq!(
            Identifier::find(&VfsUri::parse(&uri.to_string()).unwrap()),
            Some(full())
        );
    }

    #[test]
    fn parent_drops_most_specific() {
        let id = full();
        let album = id.parent().unwrap();
        assert!(album.track.is_none() && album.album.is_some());
        let scope = album.parent().unwrap();
        assert!(scope.album.is_none() && scope.scope.is_some());
        let category = scope.parent().unwrap();
        assert_eq!(category, Identifier::category(Category::Series));
        let root = category.parent().unwrap();
        assert_eq!(root, Identifier::default());
        assert!(root.parent().is_none());
    }

    #[test]
    fn scopeless_categories_go_straight_to_album() {
        let uri = VfsUri::parse("archive:/random/album-1/track.mp3").unwrap();
        let id = Identifier::find(&uri).unwrap();
        assert!(id.scope.is_none());
        assert_eq!(id.album.unwrap().title, "album-1");
        assert_eq!(id.track.unwrap().id, "track.mp3");
    }

    #[test]
    fn rejects_foreign_uris() {
        assert!(Identifier::find(&VfsUri::parse("mem:/series").unwrap()).is_none());
        assert!(Identifier::find(&VfsUri::parse("archive:/nope").unwrap()).is_none());
        assert!(Identifier::find(&VfsUri::parse("archive:/random/a/b/c").unwrap()).is_none());
    }
}
