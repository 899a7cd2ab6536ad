//! Concrete operations: resolve, listing, parents, file and search.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tunevfs_types::{OperationKind, Request, ResultRow};

use super::operation::Operation;
use super::progress::ProgressTracker;
use crate::error::{VfsError, VfsResult};
use crate::uri::VfsUri;
use crate::vfs::schema::{dir_row, file_row, listing_rows, node_row};
use crate::vfs::{
    CachingResolver, DirVisitor, ExtensionId, ProgressCallback, VfsDir, VfsFile, VfsNode,
    comparator_for, sort_nodes,
};

/// Build the operation serving `request`.
pub fn build_operation(
    request: &Request,
    resolver: Arc<CachingResolver>,
    token: CancellationToken,
) -> VfsResult<Arc<dyn Operation>> {
    let target = Target {
        resolver,
        uri: VfsUri::parse(&request.uri)?,
        tracker: ProgressTracker::new(token),
    };
    let op: Arc<dyn Operation> = match request.kind {
        OperationKind::Resolve => Arc::new(ResolveOp { target }),
        OperationKind::Listing => Arc::new(ListingOp { target }),
        OperationKind::Parents => Arc::new(ParentsOp { target }),
        OperationKind::File => Arc::new(FileOp { target }),
        OperationKind::Search => Arc::new(SearchOp {
            target,
            query: request.query.clone().unwrap_or_default(),
            found: Mutex::new(Vec::new()),
        }),
    };
    Ok(op)
}

/// What every operation starts from: a URI to resolve and somewhere to
/// report progress.
struct Target {
    resolver: Arc<CachingResolver>,
    uri: VfsUri,
    tracker: ProgressTracker,
}

impl Target {
    async fn resolve(&self) -> VfsResult<VfsNode> {
        if self.tracker.token().is_cancelled() {
            return Err(VfsError::Canceled);
        }
        self.resolver.resolve_forced(&self.uri, &self.tracker).await
    }

    async fn resolve_dir(&self) -> VfsResult<(VfsNode, Arc<dyn VfsDir>)> {
        let node = self.resolve().await?;
        let dir = node
            .as_dir()
            .cloned()
            .ok_or_else(|| VfsError::NotADirectory(self.uri.to_string()))?;
        Ok((node, dir))
    }

    fn status(&self) -> Vec<ResultRow> {
        vec![ResultRow::Progress(self.tracker.status())]
    }
}

/// Collects children, forwarding progress and cancellation to a tracker.
struct NodeSink<'a> {
    nodes: Vec<VfsNode>,
    expected: Option<u32>,
    tracker: &'a ProgressTracker,
    report: bool,
}

impl<'a> NodeSink<'a> {
    fn new(tracker: &'a ProgressTracker, report: bool) -> Self {
        Self {
            nodes: Vec::new(),
            expected: None,
            tracker,
            report,
        }
    }

    fn pushed(&self) {
        if let (true, Some(total)) = (self.report, self.expected) {
            self.tracker.record(self.nodes.len() as u32, total);
        }
    }
}

impl DirVisitor for NodeSink<'_> {
    fn on_dir(&mut self, dir: Arc<dyn VfsDir>) {
        self.nodes.push(VfsNode::Dir(dir));
        self.pushed();
    }

    fn on_file(&mut self, file: Arc<dyn VfsFile>) {
        self.nodes.push(VfsNode::File(file));
        self.pushed();
    }

    fn on_items_count(&mut self, count: u32) {
        self.expected = Some(count);
        self.pushed();
    }

    fn on_progress(&mut self, done: u32, total: u32) {
        if self.report {
            self.tracker.record(done, total);
        }
    }

    fn is_canceled(&self) -> bool {
        self.tracker.token().is_cancelled()
    }
}

struct ResolveOp {
    target: Target,
}

#[async_trait]
impl Operation for ResolveOp {
    async fn call(&self) -> VfsResult<Vec<ResultRow>> {
        let node = self.target.resolve().await?;
        Ok(vec![node_row(&node)])
    }

    fn status(&self) -> Vec<ResultRow> {
        self.target.status()
    }
}

struct ListingOp {
    target: Target,
}

#[async_trait]
impl Operation for ListingOp {
    async fn call(&self) -> VfsResult<Vec<ResultRow>> {
        let (node, dir) = self.target.resolve_dir().await?;
        let mut sink = NodeSink::new(&self.target.tracker, true);
        dir.enumerate(&mut sink).await?;
        let mut children = sink.nodes;
        sort_nodes(&mut children, &comparator_for(&node));
        debug!(uri = %self.target.uri, count = children.len(), "listed");
        Ok(listing_rows(&children))
    }

    fn status(&self) -> Vec<ResultRow> {
        self.target.status()
    }
}

struct ParentsOp {
    target: Target,
}

#[async_trait]
impl Operation for ParentsOp {
    async fn call(&self) -> VfsResult<Vec<ResultRow>> {
        let node = self.target.resolve().await?;
        let mut chain = vec![node_row(&node)];
        let mut current = node.parent();
        while let Some(parent) = current {
            chain.push(node_row(&parent));
            current = parent.parent();
        }
        chain.reverse();
        Ok(chain)
    }

    fn status(&self) -> Vec<ResultRow> {
        self.target.status()
    }
}

struct FileOp {
    target: Target,
}

#[async_trait]
impl Operation for FileOp {
    async fn call(&self) -> VfsResult<Vec<ResultRow>> {
        let node = self.target.resolve().await?;
        let file = node
            .as_file()
            .ok_or_else(|| VfsError::NotAFile(self.target.uri.to_string()))?;
        Ok(vec![ResultRow::File(file_row(file.as_ref()))])
    }

    fn status(&self) -> Vec<ResultRow> {
        self.target.status()
    }
}

/// Recursive search that streams matches.
///
/// Matches land in `found`; each `status()` swaps the buffer out, so a poller
/// sees every match exactly once.
struct SearchOp {
    target: Target,
    query: String,
    found: Mutex<Vec<ResultRow>>,
}

impl SearchOp {
    fn push(&self, row: ResultRow) {
        self.found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row);
    }

    fn take(&self) -> Vec<ResultRow> {
        std::mem::take(&mut *self.found.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn matches(file: &dyn VfsFile, needle: &str) -> bool {
        file.name().to_lowercase().contains(needle)
            || file.description().to_lowercase().contains(needle)
    }

    async fn walk(&self, start: Arc<dyn VfsDir>) -> VfsResult<()> {
        let tracker = &self.target.tracker;
        let needle = self.query.to_lowercase();
        let mut stack = vec![start];
        let mut visited = 0u32;
        while let Some(dir) = stack.pop() {
            if tracker.is_canceled() {
                return Err(VfsError::Canceled);
            }
            visited += 1;
            let mut sink = NodeSink::new(tracker, false);
            match dir.enumerate(&mut sink).await {
                Ok(()) => {}
                Err(e) if e.is_canceled() => return Err(e),
                Err(e) => {
                    warn!(uri = %dir.uri(), error = %e, "search skipped subtree");
                    continue;
                }
            }
            let mut subdirs = Vec::new();
            for node in sink.nodes {
                if tracker.is_canceled() {
                    return Err(VfsError::Canceled);
                }
                match node {
                    VfsNode::Dir(sub) => subdirs.push(sub),
                    VfsNode::File(file) => {
                        if Self::matches(file.as_ref(), &needle) {
                            self.push(ResultRow::File(file_row(file.as_ref())));
                        }
                    }
                }
            }
            // Reversed so siblings are visited in enumeration order.
            stack.extend(subdirs.into_iter().rev());
            tracker.record(visited, visited + stack.len() as u32);
        }
        Ok(())
    }
}

/// Pushes catalog search results straight into the shared buffer.
struct FoundSink<'a> {
    op: &'a SearchOp,
}

impl DirVisitor for FoundSink<'_> {
    fn on_dir(&mut self, dir: Arc<dyn VfsDir>) {
        self.op.push(ResultRow::Directory(dir_row(dir.as_ref())));
    }

    fn on_file(&mut self, file: Arc<dyn VfsFile>) {
        self.op.push(ResultRow::File(file_row(file.as_ref())));
    }

    fn on_progress(&mut self, done: u32, total: u32) {
        self.op.target.tracker.record(done, total);
    }

    fn is_canceled(&self) -> bool {
        self.op.target.tracker.is_canceled()
    }
}

#[async_trait]
impl Operation for SearchOp {
    async fn call(&self) -> VfsResult<Vec<ResultRow>> {
        let (node, dir) = self.target.resolve_dir().await?;
        match node
            .extension(ExtensionId::SearchEngine)
            .and_then(|ext| ext.into_search_engine())
        {
            Some(engine) => {
                debug!(uri = %self.target.uri, query = %self.query, "catalog search");
                engine.find(&self.query, &mut FoundSink { op: self }).await?;
            }
            None => self.walk(dir).await?,
        }
        Ok(self.take())
    }

    fn status(&self) -> Vec<ResultRow> {
        let mut rows = self.take();
        rows.push(ResultRow::Progress(self.target.tracker.status()));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{MemoryRoot, VfsRouter};
    use tunevfs_types::{FileRow, ObjectRow};

    fn resolver() -> Arc<CachingResolver> {
        let root = MemoryRoot::new();
        root.add_dir("music/b-side", "");
        root.add_file("music/track10.mp3", "Ending", "3:00");
        root.add_file("music/track2.mp3", "Opening", "1:00");
        root.add_file("music/b-side/secret.mp3", "hidden opening", "0:30");
        let router = VfsRouter::new();
        router.mount(Arc::new(root));
        Arc::new(CachingResolver::new(Arc::new(router), 10))
    }

    async fn run(request: Request) -> VfsResult<Vec<ResultRow>> {
        build_operation(&request, resolver(), CancellationToken::new())?
            .call()
            .await
    }

    fn names(rows: &[ResultRow]) -> Vec<String> {
        rows.iter()
            .map(|row| match row {
                ResultRow::Directory(ObjectRow { name, .. }) => name.clone(),
                ResultRow::File(FileRow { name, .. }) => name.clone(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn listing_is_sorted_and_grouped() {
        let rows = run(Request::listing("mem:/music")).await.unwrap();
        assert_eq!(
            names(&rows),
            ["b-side", "Delimiter", "track2.mp3", "track10.mp3"]
        );
    }

    #[tokio::test]
    async fn parents_are_root_first() {
        let rows = run(Request::parents("mem:/music/b-side/secret.mp3"))
            .await
            .unwrap();
        assert_eq!(names(&rows), ["mem", "music", "b-side", "secret.mp3"]);
    }

    #[tokio::test]
    async fn file_rejects_directories() {
        let err = run(Request::file("mem:/music")).await.unwrap_err();
        assert!(matches!(err, VfsError::NotAFile(_)));
        let rows = run(Request::file("mem:/music/track2.mp3")).await.unwrap();
        assert_eq!(names(&rows), ["track2.mp3"]);
    }

    #[tokio::test]
    async fn listing_a_file_fails() {
        let err = run(Request::listing("mem:/music/track2.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn walk_matches_name_or_description() {
        let rows = run(Request::search("mem:/", "OPENING")).await.unwrap();
        assert_eq!(names(&rows), ["track2.mp3", "secret.mp3"]);
    }

    #[tokio::test]
    async fn status_swaps_out_found_rows() {
        let op = build_operation(
            &Request::search("mem:/", "mp3"),
            resolver(),
            CancellationToken::new(),
        )
        .unwrap();
        let finished = op.call().await.unwrap();
        assert_eq!(finished.len(), 3);
        // Everything was returned by call, nothing left for the next poll.
        let status = op.status();
        assert_eq!(status.len(), 1);
        assert!(matches!(status[0], ResultRow::Progress(_)));
    }

    #[tokio::test]
    async fn canceled_token_stops_before_work() {
        let token = CancellationToken::new();
        token.cancel();
        let op = build_operation(&Request::search("mem:/", "x"), resolver(), token).unwrap();
        assert!(op.call().await.unwrap_err().is_canceled());
    }
}
