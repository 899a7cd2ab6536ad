//! Object identity: `scheme:/segment/segment?key=value`.
//!
//! Segments and query values are percent-encoded on output, so an identifier
//! containing `/` (e.g. `album/12`) stays a single segment.

use std::fmt;
use std::str::FromStr;

use crate::error::VfsError;

/// Scheme of the top-level directory that lists every mounted catalog.
pub const ROOT_SCHEME: &str = "vfs";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsUri {
    scheme: String,
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl VfsUri {
    /// `scheme:/` with no path.
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            segments: Vec::new(),
            query: Vec::new(),
        }
    }

    /// `vfs:/`
    pub fn root() -> Self {
        Self::new(ROOT_SCHEME)
    }

    pub fn parse(text: &str) -> Result<Self, VfsError> {
        let (scheme, rest) = text
            .split_once(':')
            .ok_or_else(|| VfsError::InvalidUri(text.to_string()))?;
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(VfsError::InvalidUri(text.to_string()));
        }

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| decode(s, text))
            .collect::<Result<Vec<_>, _>>()?;

        let query = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                Ok((decode(key, text)?, decode(value, text)?))
            })
            .collect::<Result<Vec<_>, VfsError>>()?;

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            segments,
            query,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn segment(&self, idx: usize) -> Option<&str> {
        self.segments.get(idx).map(String::as_str)
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True for `scheme:/` without any path.
    pub fn is_scheme_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Set a query parameter, replacing any previous value for `key`.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.query.retain(|(k, _)| *k != key);
        self.query.push((key, value.into()));
        self
    }

    pub fn without_query(mut self, key: &str) -> Self {
        self.query.retain(|(k, _)| k != key);
        self
    }

    /// Drop the last path segment; `None` at the scheme root.
    pub fn without_last_segment(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }
}

fn decode(raw: &str, whole: &str) -> Result<String, VfsError> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|_| VfsError::InvalidUri(whole.to_string()))
}

impl fmt::Display for VfsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/", self.scheme)?;
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                f.write_str("/")?;
            }
            f.write_str(&urlencoding::encode(segment))?;
        }
        for (idx, (key, value)) in self.query.iter().enumerate() {
            f.write_str(if idx == 0 { "?" } else { "&" })?;
            write!(
                f,
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )?;
        }
        Ok(())
    }
}

impl FromStr for VfsUri {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format() {
        let uri = VfsUri::parse("archive:/series/album%2F12?album=Some%20Title").unwrap();
        assert_eq!(uri.scheme(), "archive");
        assert_eq!(uri.segments(), &["series".to_string(), "album/12".to_string()]);
        assert_eq!(uri.query("album"), Some("Some Title"));
        assert_eq!(uri.to_string(), "archive:/series/album%2F12?album=Some%20Title");
    }

    #[test]
    fn root_forms() {
        assert_eq!(VfsUri::root().to_string(), "vfs:/");
        assert!(VfsUri::parse("mem:").unwrap().is_scheme_root());
        assert!(VfsUri::parse("mem:/").unwrap().is_scheme_root());
        assert_eq!(VfsUri::parse("mem:/").unwrap(), VfsUri::new("mem"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(VfsUri::parse("no scheme here").is_err());
        assert!(VfsUri::parse(":/path").is_err());
        assert!(VfsUri::parse("sp ace:/x").is_err());
    }

    #[test]
    fn parent_drops_last_segment() {
        let uri = VfsUri::new("mem").with_segment("a").with_segment("b");
        let parent = uri.without_last_segment().unwrap();
        assert_eq!(parent.to_string(), "mem:/a");
        let root = parent.without_last_segment().unwrap();
        assert!(root.is_scheme_root());
        assert!(root.without_last_segment().is_none());
    }

    #[test]
    fn with_query_replaces() {
        let uri = VfsUri::new("x").with_query("k", "1").with_query("k", "2");
        assert_eq!(uri.query("k"), Some("2"));
        assert_eq!(uri.to_string(), "x:/?k=2");
        assert_eq!(uri.without_query("k").to_string(), "x:/");
    }
}
