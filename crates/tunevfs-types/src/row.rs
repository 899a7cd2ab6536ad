//! Result rows: the wire schema of the polling protocol.
//!
//! A poll returns a batch of rows. The batch is exactly one of:
//!
//! - pure data rows (`Directory` / `File` / `Delimiter`): the request is done;
//! - data rows followed by one `Progress` row: still working, poll again;
//! - a single `Error` row: the request failed.
//!
//! A `Progress` or `Error` row, if present, is always the last row.

use serde::{Deserialize, Serialize};

use crate::progress::Progress;

/// A directory as shown to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRow {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Whether the directory can act as an endless feed of files.
    #[serde(default)]
    pub has_feed: bool,
}

/// A file as shown to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRow {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Display size (duration or byte count, whatever the catalog knows).
    #[serde(default)]
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub download_uris: Vec<String>,
}

/// One row of a poll response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultRow {
    Directory(ObjectRow),
    File(FileRow),
    /// Separates groups of data rows (directories from files in a listing).
    Delimiter,
    Progress(Progress),
    Error { message: String },
}

impl ResultRow {
    pub fn error(message: impl Into<String>) -> Self {
        ResultRow::Error {
            message: message.into(),
        }
    }

    pub fn progress(done: u32, total: u32) -> Self {
        ResultRow::Progress(Progress::new(done, total))
    }

    /// True for rows that carry data rather than status.
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            ResultRow::Directory(_) | ResultRow::File(_) | ResultRow::Delimiter
        )
    }
}

/// How a batch ends, which tells the poller what to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchStatus {
    /// No status row: the request is finished.
    Complete,
    /// Ends with a progress row: poll again.
    InProgress(Progress),
    /// An error row: raise.
    Failed(String),
}

/// Classify a batch by its terminating row.
pub fn batch_status(rows: &[ResultRow]) -> BatchStatus {
    match rows.last() {
        Some(ResultRow::Progress(progress)) => BatchStatus::InProgress(*progress),
        Some(ResultRow::Error { message }) => BatchStatus::Failed(message.clone()),
        _ => BatchStatus::Complete,
    }
}

/// Check the batch shape: at most one status row, and only in last position.
pub fn is_well_formed(rows: &[ResultRow]) -> bool {
    let status_rows = rows.iter().filter(|row| !row.is_data()).count();
    match status_rows {
        0 => true,
        1 => rows.last().is_some_and(|row| !row.is_data()),
        _ => false,
    }
}
