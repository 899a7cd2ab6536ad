//! Progress tracking shared between a running operation and its pollers.

use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tunevfs_types::Progress;

use crate::vfs::ProgressCallback;

/// Last reported progress of one operation, plus its cancellation token.
///
/// `done` never goes backwards: a report with a smaller `done` than the last
/// one is ignored, so pollers observe a non-decreasing sequence.
#[derive(Debug)]
pub struct ProgressTracker {
    latest: Mutex<Option<Progress>>,
    token: CancellationToken,
}

impl ProgressTracker {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            latest: Mutex::new(None),
            token,
        }
    }

    /// Last progress, or the intermediate sentinel if nothing was reported.
    pub fn status(&self) -> Progress {
        let latest = *self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.unwrap_or_else(Progress::intermediate)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn record(&self, done: u32, total: u32) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.is_some_and(|last| done < last.done) {
            return;
        }
        *latest = Some(Progress::new(done, total.max(done)));
    }
}

impl ProgressCallback for ProgressTracker {
    fn on_progress(&self, done: u32, total: u32) {
        self.record(done, total);
    }

    fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_intermediate() {
        let tracker = ProgressTracker::new(CancellationToken::new());
        assert!(tracker.status().is_intermediate());
    }

    #[test]
    fn never_goes_backwards() {
        let tracker = ProgressTracker::new(CancellationToken::new());
        tracker.record(3, 10);
        tracker.record(2, 10);
        assert_eq!(tracker.status(), Progress::new(3, 10));
        tracker.record(5, 12);
        assert_eq!(tracker.status(), Progress::new(5, 12));
    }

    #[test]
    fn cancellation_follows_token() {
        let token = CancellationToken::new();
        let tracker = ProgressTracker::new(token.clone());
        assert!(!tracker.is_canceled());
        token.cancel();
        assert!(tracker.is_canceled());
    }
}
