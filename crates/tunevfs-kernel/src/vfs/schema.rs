//! Conversion of live objects into result rows.

use tunevfs_types::{FileRow, ObjectRow, ResultRow};

use super::extension::ExtensionId;
use super::traits::{VfsDir, VfsFile, VfsNode};

pub fn dir_row(dir: &dyn VfsDir) -> ObjectRow {
    ObjectRow {
        uri: dir.uri().to_string(),
        name: dir.name(),
        description: dir.description(),
        icon: dir.extension(ExtensionId::Icon).and_then(|e| e.into_string()),
        has_feed: dir.extension(ExtensionId::Feed).is_some(),
    }
}

pub fn file_row(file: &dyn VfsFile) -> FileRow {
    FileRow {
        uri: file.uri().to_string(),
        name: file.name(),
        description: file.description(),
        size: file.size(),
        cache_path: file
            .extension(ExtensionId::CachePath)
            .and_then(|e| e.into_string()),
        download_uris: file
            .extension(ExtensionId::DownloadUris)
            .and_then(|e| e.into_download_uris())
            .unwrap_or_default(),
    }
}

pub fn node_row(node: &VfsNode) -> ResultRow {
    match node {
        VfsNode::Dir(dir) => ResultRow::Directory(dir_row(dir.as_ref())),
        VfsNode::File(file) => ResultRow::File(file_row(file.as_ref())),
    }
}

/// Directories, then a delimiter if both kinds are present, then files.
///
/// Both groups keep the order they were given in.
pub fn listing_rows(nodes: &[VfsNode]) -> Vec<ResultRow> {
    let (dirs, files): (Vec<&VfsNode>, Vec<&VfsNode>) = nodes.iter().partition(|n| n.is_dir());
    let mut rows = Vec::with_capacity(nodes.len() + 1);
    rows.extend(dirs.iter().map(|n| node_row(n)));
    if !dirs.is_empty() && !files.is_empty() {
        rows.push(ResultRow::Delimiter);
    }
    rows.extend(files.iter().map(|n| node_row(n)));
    rows
}
