//! Progress snapshots reported by long-running operations.

use serde::{Deserialize, Serialize};

/// Work done so far out of an expected total.
///
/// A total of zero means "nothing reported yet": the operation is running but
/// has no measurable progress. Use [`Progress::intermediate`] for that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Progress {
    pub done: u32,
    pub total: u32,
}

impl Progress {
    pub fn new(done: u32, total: u32) -> Self {
        Self { done, total }
    }

    /// The "still working, no numbers yet" sentinel.
    pub fn intermediate() -> Self {
        Self { done: 0, total: 0 }
    }

    pub fn is_intermediate(&self) -> bool {
        self.total == 0
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_intermediate() {
            write!(f, "…")
        } else {
            write!(f, "{}/{}", self.done, self.total)
        }
    }
}
