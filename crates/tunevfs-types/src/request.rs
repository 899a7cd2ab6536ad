//! Request identification for the polling protocol.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a polled request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Resolve a URI to a single object row.
    Resolve,
    /// Enumerate a directory.
    Listing,
    /// The chain of ancestors, root first, ending with the object itself.
    Parents,
    /// Recursive search below a directory.
    Search,
    /// Details of a single file, including where to download it from.
    File,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Resolve,
        OperationKind::Listing,
        OperationKind::Parents,
        OperationKind::Search,
        OperationKind::File,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Resolve => "resolve",
            OperationKind::Listing => "listing",
            OperationKind::Parents => "parents",
            OperationKind::Search => "search",
            OperationKind::File => "file",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown operation name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for OperationKind {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// A single logical request: an operation against a URI.
///
/// Two requests with the same [`Request::key`] are the same logical request;
/// repeated polls of one key observe one running operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    pub kind: OperationKind,
    pub uri: String,
    /// Search text, only meaningful for [`OperationKind::Search`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Request {
    pub fn new(kind: OperationKind, uri: impl Into<String>) -> Self {
        Self {
            kind,
            uri: uri.into(),
            query: None,
        }
    }

    pub fn resolve(uri: impl Into<String>) -> Self {
        Self::new(OperationKind::Resolve, uri)
    }

    pub fn listing(uri: impl Into<String>) -> Self {
        Self::new(OperationKind::Listing, uri)
    }

    pub fn parents(uri: impl Into<String>) -> Self {
        Self::new(OperationKind::Parents, uri)
    }

    pub fn file(uri: impl Into<String>) -> Self {
        Self::new(OperationKind::File, uri)
    }

    pub fn search(uri: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Search,
            uri: uri.into(),
            query: Some(query.into()),
        }
    }

    /// Registry key identifying this logical request.
    pub fn key(&self) -> String {
        match &self.query {
            Some(query) => format!("{}:{}#{}", self.kind, self.uri, query),
            None => format!("{}:{}", self.kind, self.uri),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in OperationKind::ALL {
            assert_eq!(kind.as_str().parse::<OperationKind>(), Ok(kind));
        }
        assert!("delete".parse::<OperationKind>().is_err());
    }

    #[test]
    fn key_distinguishes_kind_and_query() {
        let listing = Request::listing("archive:/series");
        let parents = Request::parents("archive:/series");
        assert_ne!(listing.key(), parents.key());

        let a = Request::search("archive:/", "zelda");
        let b = Request::search("archive:/", "mario");
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), Request::search("archive:/", "zelda").key());
    }
}
