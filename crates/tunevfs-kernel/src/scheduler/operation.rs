//! The unit of work behind one polled request.

use async_trait::async_trait;
use tunevfs_types::ResultRow;

use crate::error::VfsResult;

/// One async unit of work backing a single polled request.
///
/// `call` runs once, on a worker task. `status` may be called concurrently
/// from any number of pollers while `call` is running and must end with a
/// progress row.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Run to completion and return the final data rows.
    async fn call(&self) -> VfsResult<Vec<ResultRow>>;

    /// Snapshot for a poller: any rows ready so far, then a progress row.
    fn status(&self) -> Vec<ResultRow>;
}
