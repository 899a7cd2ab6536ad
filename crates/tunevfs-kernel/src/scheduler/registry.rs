//! Registry of operations still running after their first poll.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tunevfs_types::ResultRow;

use super::operation::Operation;
use crate::error::VfsResult;

/// Output of an operation's worker task.
pub type TaskOutput = Result<VfsResult<Vec<ResultRow>>, JoinError>;

/// Status of a registered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Running,
    /// Finished, waiting for the next poll to collect the rows.
    Finished,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Running => write!(f, "Running"),
            OperationState::Finished => write!(f, "Finished"),
        }
    }
}

/// Information about a registered operation.
#[derive(Debug, Clone)]
pub struct OperationInfo {
    pub key: String,
    pub state: OperationState,
    pub started: Instant,
}

/// A running operation, its worker and its notification timer.
pub struct Registered {
    pub op: Arc<dyn Operation>,
    pub handle: JoinHandle<VfsResult<Vec<ResultRow>>>,
    pub token: CancellationToken,
    pub ticker: JoinHandle<()>,
    pub started: Instant,
}

impl Registered {
    pub fn state(&self) -> OperationState {
        if self.handle.is_finished() {
            OperationState::Finished
        } else {
            OperationState::Running
        }
    }

    /// Stop the worker and the timer.
    pub fn cancel(&self) {
        self.token.cancel();
        self.handle.abort();
        self.ticker.abort();
    }
}

/// What a poll found for a key.
pub enum Lookup {
    Absent,
    /// Still running: the live status snapshot.
    Running(Vec<ResultRow>),
    /// Finished and removed from the registry.
    Finished(Registered),
}

/// Key to running operation.
#[derive(Default)]
pub struct OperationRegistry {
    entries: Mutex<HashMap<String, Registered>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: String, entry: Registered) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = entries.insert(key, entry) {
            previous.cancel();
        }
    }

    /// Status of a running operation, or the finished entry taken out.
    pub fn lookup(&self, key: &str) -> Lookup {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            None => Lookup::Absent,
            Some(entry) if entry.handle.is_finished() => match entries.remove(key) {
                Some(entry) => Lookup::Finished(entry),
                None => Lookup::Absent,
            },
            Some(entry) => Lookup::Running(entry.op.status()),
        }
    }

    pub fn remove(&self, key: &str) -> Option<Registered> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn list(&self) -> Vec<OperationInfo> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(key, entry)| OperationInfo {
                key: key.clone(),
                state: entry.state(),
                started: entry.started,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel everything, e.g. on shutdown.
    pub fn cancel_all(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let count = entries.len();
        for (_, entry) in entries.drain() {
            entry.cancel();
        }
        count
    }
}
