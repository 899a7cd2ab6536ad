//! Client side of the polling protocol.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tunevfs_types::{BatchStatus, FileRow, Progress, Request, ResultRow, batch_status};

use super::query::AsyncQueryScheduler;
use crate::error::{VfsError, VfsResult};

/// Receives the rows of one request as they arrive.
pub trait RowCallback: Send {
    fn on_row(&mut self, row: ResultRow);

    fn on_progress(&mut self, _progress: Progress) {}

    /// Asked between polls. Returning true cancels the request.
    fn is_canceled(&self) -> bool {
        false
    }
}

/// Collects every data row.
#[derive(Debug, Default)]
pub struct RowCollector {
    pub rows: Vec<ResultRow>,
    pub progress: Vec<Progress>,
}

impl RowCallback for RowCollector {
    fn on_row(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    fn on_progress(&mut self, progress: Progress) {
        self.progress.push(progress);
    }
}

/// Pull loop over an [`AsyncQueryScheduler`].
///
/// Re-polls every `poll_interval` while the batch ends with a progress row.
/// An error row becomes [`VfsError::Operation`]; cancellation, through the
/// client's token or the callback, cancels the request on the scheduler and
/// returns [`VfsError::Canceled`].
#[derive(Clone)]
pub struct VfsClient {
    scheduler: Arc<AsyncQueryScheduler>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl VfsClient {
    pub fn new(scheduler: Arc<AsyncQueryScheduler>, poll_interval: Duration) -> Self {
        Self {
            scheduler,
            poll_interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to cancel in-flight requests from outside.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn scheduler(&self) -> &Arc<AsyncQueryScheduler> {
        &self.scheduler
    }

    pub async fn list(&self, uri: &str, callback: &mut dyn RowCallback) -> VfsResult<()> {
        self.pull(&Request::listing(uri), callback).await
    }

    pub async fn parents(&self, uri: &str, callback: &mut dyn RowCallback) -> VfsResult<()> {
        self.pull(&Request::parents(uri), callback).await
    }

    pub async fn search(
        &self,
        uri: &str,
        query: &str,
        callback: &mut dyn RowCallback,
    ) -> VfsResult<()> {
        self.pull(&Request::search(uri, query), callback).await
    }

    /// The row of a single object.
    pub async fn resolve(&self, uri: &str) -> VfsResult<ResultRow> {
        let mut rows = RowCollector::default();
        self.pull(&Request::resolve(uri), &mut rows).await?;
        rows.rows
            .into_iter()
            .find(ResultRow::is_data)
            .ok_or_else(|| VfsError::NotFound(uri.to_string()))
    }

    pub async fn file(&self, uri: &str) -> VfsResult<FileRow> {
        let mut rows = RowCollector::default();
        self.pull(&Request::file(uri), &mut rows).await?;
        rows.rows
            .into_iter()
            .find_map(|row| match row {
                ResultRow::File(file) => Some(file),
                _ => None,
            })
            .ok_or_else(|| VfsError::NotAFile(uri.to_string()))
    }

    async fn pull(&self, request: &Request, callback: &mut dyn RowCallback) -> VfsResult<()> {
        loop {
            if self.cancel.is_cancelled() || callback.is_canceled() {
                return Err(self.abandon(request));
            }

            let rows = self.scheduler.poll(request).await;
            let status = batch_status(&rows);
            if let BatchStatus::Failed(message) = &status {
                return Err(VfsError::Operation(message.clone()));
            }
            rows.into_iter()
                .filter(ResultRow::is_data)
                .for_each(|row| callback.on_row(row));

            match status {
                BatchStatus::InProgress(progress) => callback.on_progress(progress),
                _ => return Ok(()),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.cancel.cancelled() => return Err(self.abandon(request)),
            }
        }
    }

    fn abandon(&self, request: &Request) -> VfsError {
        self.scheduler.cancel(request);
        tracing::debug!(key = %request.key(), "request abandoned by client");
        VfsError::Canceled
    }
}
