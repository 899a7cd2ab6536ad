//! Polling protocol: registration, reuse, cancellation, errors, streaming.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tunevfs_types::{BatchStatus, Progress, Request, ResultRow, batch_status, is_well_formed};

use tunevfs_kernel::scheduler::{AsyncQueryScheduler, RowCallback, RowCollector, VfsClient};
use tunevfs_kernel::vfs::{
    CachingResolver, DirVisitor, MemoryRoot, ProgressCallback, VfsDir, VfsFile, VfsNode,
    VfsObject, VfsRoot, VfsRouter,
};
use tunevfs_kernel::{VfsError, VfsResult, VfsUri};

const SLOW: &str = "slow";

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// A tree whose every enumeration step takes `delay`.
///
/// `slow:/` holds `dirs` directories and `files` files; each directory holds
/// `files` files. `slow:/broken` fails after a while.
#[derive(Clone)]
struct SlowTree {
    delay: Duration,
    dirs: u32,
    files: u32,
    emitted: Arc<AtomicUsize>,
}

impl SlowTree {
    fn new(delay: Duration, dirs: u32, files: u32) -> Self {
        Self {
            delay,
            dirs,
            files,
            emitted: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    async fn emit(
        &self,
        dir: Option<u32>,
        visitor: &mut dyn DirVisitor,
    ) -> VfsResult<()> {
        let dirs = if dir.is_none() { self.dirs } else { 0 };
        visitor.on_items_count(dirs + self.files);
        for idx in 0..dirs {
            self.step(visitor).await?;
            visitor.on_dir(Arc::new(SlowDir {
                tree: self.clone(),
                idx,
            }));
        }
        for idx in 0..self.files {
            self.step(visitor).await?;
            let mut uri = VfsUri::new(SLOW);
            let prefix = match dir {
                Some(d) => {
                    uri = uri.with_segment(format!("d{d}"));
                    format!("d{d}-")
                }
                None => String::new(),
            };
            let name = format!("{prefix}f{idx}.mp3");
            visitor.on_file(Arc::new(SlowFile {
                uri: uri.with_segment(name.clone()),
                name,
            }));
        }
        Ok(())
    }

    async fn step(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        tokio::time::sleep(self.delay).await;
        if visitor.is_canceled() {
            return Err(VfsError::Canceled);
        }
        self.emitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct SlowRoot(SlowTree);

impl VfsObject for SlowRoot {
    fn uri(&self) -> VfsUri {
        VfsUri::new(SLOW)
    }

    fn name(&self) -> String {
        "Slow".into()
    }

    fn parent(&self) -> Option<VfsNode> {
        None
    }
}

#[async_trait]
impl VfsDir for SlowRoot {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        self.0.emit(None, visitor).await
    }
}

#[async_trait]
impl VfsRoot for SlowRoot {
    async fn resolve(
        &self,
        uri: &VfsUri,
        _progress: Option<&dyn ProgressCallback>,
    ) -> VfsResult<VfsNode> {
        match uri.segments() {
            [] => Ok(VfsNode::Dir(Arc::new(SlowRoot(self.0.clone())))),
            [name] if name == "broken" => {
                tokio::time::sleep(self.0.delay * 3).await;
                Err(VfsError::remote("catalog went away"))
            }
            [name] => name
                .strip_prefix('d')
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|idx| *idx < self.0.dirs)
                .map(|idx| {
                    VfsNode::Dir(Arc::new(SlowDir {
                        tree: self.0.clone(),
                        idx,
                    }))
                })
                .ok_or_else(|| VfsError::NotFound(uri.to_string())),
            _ => Err(VfsError::NotFound(uri.to_string())),
        }
    }
}

struct SlowDir {
    tree: SlowTree,
    idx: u32,
}

impl VfsObject for SlowDir {
    fn uri(&self) -> VfsUri {
        VfsUri::new(SLOW).with_segment(format!("d{}", self.idx))
    }

    fn name(&self) -> String {
        format!("d{}", self.idx)
    }

    fn parent(&self) -> Option<VfsNode> {
        Some(VfsNode::Dir(Arc::new(SlowRoot(self.tree.clone()))))
    }
}

#[async_trait]
impl VfsDir for SlowDir {
    async fn enumerate(&self, visitor: &mut dyn DirVisitor) -> VfsResult<()> {
        self.tree.emit(Some(self.idx), visitor).await
    }
}

struct SlowFile {
    uri: VfsUri,
    name: String,
}

impl VfsObject for SlowFile {
    fn uri(&self) -> VfsUri {
        self.uri.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn parent(&self) -> Option<VfsNode> {
        None
    }
}

impl VfsFile for SlowFile {}

fn scheduler_with(tree: &SlowTree, sync_wait: Duration) -> Arc<AsyncQueryScheduler> {
    let memory = MemoryRoot::new();
    memory.add_dir("music/ost", "");
    memory.add_file("music/intro.mp3", "", "0:30");

    let router = VfsRouter::new();
    router.mount(Arc::new(SlowRoot(tree.clone())));
    router.mount(Arc::new(memory));
    let resolver = Arc::new(CachingResolver::new(Arc::new(router), 10));
    Arc::new(AsyncQueryScheduler::with_timing(resolver, sync_wait, ms(20)))
}

/// Poll until the batch is final. Returns every batch seen.
async fn poll_to_end(scheduler: &AsyncQueryScheduler, request: &Request) -> Vec<Vec<ResultRow>> {
    let mut batches = Vec::new();
    for _ in 0..200 {
        let rows = scheduler.poll(request).await;
        assert!(is_well_formed(&rows), "malformed batch {rows:?}");
        let done = !matches!(batch_status(&rows), BatchStatus::InProgress(_));
        batches.push(rows);
        if done {
            return batches;
        }
        tokio::time::sleep(ms(25)).await;
    }
    panic!("request never finished");
}

fn progress_of(rows: &[ResultRow]) -> Option<Progress> {
    match batch_status(rows) {
        BatchStatus::InProgress(progress) => Some(progress),
        _ => None,
    }
}

#[tokio::test]
async fn fast_request_is_never_registered() {
    let tree = SlowTree::new(ms(1), 0, 0);
    let scheduler = scheduler_with(&tree, ms(1_000));
    let request = Request::listing("mem:/music");

    let rows = scheduler.poll(&request).await;
    assert_eq!(batch_status(&rows), BatchStatus::Complete);
    assert_eq!(rows.len(), 3, "dir, delimiter, file: {rows:?}");
    assert!(!scheduler.is_registered(&request));
    assert!(scheduler.list().is_empty());
    assert_eq!(scheduler.jobs_spawned(), 1);
}

#[tokio::test]
async fn slow_request_registers_once_and_delivers_final_rows() {
    let tree = SlowTree::new(ms(40), 0, 5);
    let scheduler = scheduler_with(&tree, ms(20));
    let request = Request::listing("slow:/");

    let first = scheduler.poll(&request).await;
    assert!(progress_of(&first).is_some(), "expected a status batch: {first:?}");
    assert!(scheduler.is_registered(&request));

    let mut batches = vec![first];
    batches.extend(poll_to_end(&scheduler, &request).await);
    assert_eq!(scheduler.jobs_spawned(), 1);
    assert!(!scheduler.is_registered(&request));

    let last = batches.last().unwrap();
    assert_eq!(batch_status(last), BatchStatus::Complete);
    assert_eq!(last.len(), 5);

    let done: Vec<u32> = batches.iter().filter_map(|b| progress_of(b)).map(|p| p.done).collect();
    assert!(done.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {done:?}");
}

#[tokio::test]
async fn concurrent_polls_share_one_job() {
    let tree = SlowTree::new(ms(30), 0, 4);
    let scheduler = scheduler_with(&tree, ms(20));
    let request = Request::listing("slow:/");

    let polls: Vec<_> = (0..4)
        .map(|_| {
            let scheduler = scheduler.clone();
            let request = request.clone();
            tokio::spawn(async move { scheduler.poll(&request).await })
        })
        .collect();
    for poll in polls {
        poll.await.unwrap();
    }
    assert_eq!(scheduler.jobs_spawned(), 1);
    poll_to_end(&scheduler, &request).await;
    assert_eq!(scheduler.jobs_spawned(), 1);
}

#[tokio::test]
async fn cancel_interrupts_worker_and_next_poll_starts_fresh() {
    let tree = SlowTree::new(ms(50), 0, 40);
    let scheduler = scheduler_with(&tree, ms(20));
    let request = Request::listing("slow:/");

    scheduler.poll(&request).await;
    assert!(scheduler.is_registered(&request));
    tokio::time::sleep(ms(120)).await;

    assert!(scheduler.cancel(&request));
    assert!(!scheduler.is_registered(&request));
    assert!(!scheduler.cancel(&request));

    let at_cancel = tree.emitted();
    tokio::time::sleep(ms(200)).await;
    assert_eq!(tree.emitted(), at_cancel, "worker kept running after cancel");

    let rows = scheduler.poll(&request).await;
    assert!(progress_of(&rows).is_some());
    assert_eq!(scheduler.jobs_spawned(), 2);
    scheduler.cancel(&request);
}

#[tokio::test]
async fn dropped_poll_stops_its_worker() {
    let tree = SlowTree::new(ms(30), 0, 40);
    let scheduler = scheduler_with(&tree, ms(2_000));
    let request = Request::listing("slow:/");

    let gave_up = tokio::time::timeout(ms(100), scheduler.poll(&request)).await;
    assert!(gave_up.is_err());
    assert!(!scheduler.is_registered(&request));
    assert!(!scheduler.cancel(&request), "nothing should be left to cancel");

    let at_drop = tree.emitted();
    tokio::time::sleep(ms(150)).await;
    assert_eq!(tree.emitted(), at_drop, "worker outlived its poll");
}

#[tokio::test]
async fn cancel_reaches_worker_inside_first_poll() {
    let tree = SlowTree::new(ms(30), 0, 40);
    let scheduler = scheduler_with(&tree, ms(2_000));
    let request = Request::listing("slow:/");

    let started = std::time::Instant::now();
    let poll = {
        let scheduler = scheduler.clone();
        let request = request.clone();
        tokio::spawn(async move { scheduler.poll(&request).await })
    };
    tokio::time::sleep(ms(80)).await;
    assert!(scheduler.cancel(&request));

    let rows = poll.await.unwrap();
    assert!(rows.is_empty(), "canceled poll returned {rows:?}");
    assert!(started.elapsed() < ms(1_000));
    assert!(!scheduler.is_registered(&request));

    let at_cancel = tree.emitted();
    tokio::time::sleep(ms(150)).await;
    assert_eq!(tree.emitted(), at_cancel);
}

#[tokio::test]
async fn failures_become_a_single_error_row() {
    let tree = SlowTree::new(ms(1), 0, 0);
    let scheduler = scheduler_with(&tree, ms(500));

    let rows = scheduler.poll(&Request::listing("mem:/missing")).await;
    assert!(matches!(batch_status(&rows), BatchStatus::Failed(m) if m.contains("not found")));
    assert_eq!(rows.len(), 1);

    let rows = scheduler.poll(&Request::listing("no scheme here")).await;
    assert!(matches!(batch_status(&rows), BatchStatus::Failed(_)));

    let rows = scheduler.poll(&Request::listing("mem:/music/intro.mp3")).await;
    assert!(matches!(batch_status(&rows), BatchStatus::Failed(m) if m.contains("not a directory")));
}

#[tokio::test]
async fn failure_after_registration_is_delivered_and_deregistered() {
    let tree = SlowTree::new(ms(40), 0, 0);
    let scheduler = scheduler_with(&tree, ms(10));
    let request = Request::resolve("slow:/broken");

    let first = scheduler.poll(&request).await;
    assert!(progress_of(&first).is_some());

    let batches = poll_to_end(&scheduler, &request).await;
    let last = batches.last().unwrap();
    assert_eq!(
        batch_status(last),
        BatchStatus::Failed("remote catalog: catalog went away".into())
    );
    assert!(!scheduler.is_registered(&request));
}

#[tokio::test]
async fn registered_operation_notifies_observers() {
    let tree = SlowTree::new(ms(50), 0, 20);
    let scheduler = scheduler_with(&tree, ms(10));
    let request = Request::listing("slow:/");
    let mut changes = scheduler.notifier().subscribe();

    scheduler.poll(&request).await;
    let key = tokio::time::timeout(ms(1_000), changes.recv())
        .await
        .expect("no notification")
        .unwrap();
    assert_eq!(key, request.key());
    scheduler.cancel(&request);
}

#[tokio::test]
async fn search_streams_matches_across_polls() {
    let tree = SlowTree::new(ms(30), 3, 2);
    let scheduler = scheduler_with(&tree, ms(20));
    let request = Request::search("slow:/", "MP3");

    let mut first = vec![scheduler.poll(&request).await];
    first.extend(poll_to_end(&scheduler, &request).await);

    let streamed = first
        .iter()
        .any(|batch| progress_of(batch).is_some() && batch.iter().any(ResultRow::is_data));
    assert!(streamed, "no matches arrived before the walk finished");

    let uris: Vec<String> = first
        .iter()
        .flatten()
        .filter_map(|row| match row {
            ResultRow::File(file) => Some(file.uri.clone()),
            _ => None,
        })
        .collect();
    let unique: HashSet<&String> = uris.iter().collect();
    assert_eq!(uris.len(), 2 + 3 * 2);
    assert_eq!(unique.len(), uris.len(), "a match was delivered twice");
}

struct StopAfterProgress {
    rows: RowCollector,
}

impl RowCallback for StopAfterProgress {
    fn on_row(&mut self, row: ResultRow) {
        self.rows.on_row(row);
    }

    fn on_progress(&mut self, progress: Progress) {
        self.rows.on_progress(progress);
    }

    fn is_canceled(&self) -> bool {
        !self.rows.progress.is_empty()
    }
}

#[tokio::test]
async fn client_pulls_until_complete() {
    let tree = SlowTree::new(ms(30), 0, 4);
    let scheduler = scheduler_with(&tree, ms(10));
    let client = VfsClient::new(scheduler.clone(), ms(20));

    let mut rows = RowCollector::default();
    client.list("slow:/", &mut rows).await.unwrap();
    assert_eq!(rows.rows.len(), 4);
    assert!(!rows.progress.is_empty());
    assert!(!scheduler.is_registered(&Request::listing("slow:/")));
}

#[tokio::test]
async fn client_raises_error_rows() {
    let tree = SlowTree::new(ms(1), 0, 0);
    let client = VfsClient::new(scheduler_with(&tree, ms(500)), ms(20));

    let err = client
        .list("mem:/missing", &mut RowCollector::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Operation(m) if m.contains("not found")));

    let err = client.file("mem:/music").await.unwrap_err();
    assert!(matches!(err, VfsError::Operation(m) if m.contains("not a file")));

    let file = client.file("mem:/music/intro.mp3").await.unwrap();
    assert_eq!(file.size, "0:30");
}

#[tokio::test]
async fn client_callback_cancels_request() {
    let tree = SlowTree::new(ms(50), 0, 20);
    let scheduler = scheduler_with(&tree, ms(10));
    let client = VfsClient::new(scheduler.clone(), ms(20));

    let mut callback = StopAfterProgress {
        rows: RowCollector::default(),
    };
    let err = client.list("slow:/", &mut callback).await.unwrap_err();
    assert!(err.is_canceled());
    assert!(!scheduler.is_registered(&Request::listing("slow:/")));
}

#[tokio::test]
async fn client_token_cancels_request() {
    let tree = SlowTree::new(ms(50), 0, 20);
    let scheduler = scheduler_with(&tree, ms(10));
    let client = VfsClient::new(scheduler.clone(), ms(500));
    let token = client.cancel_token().clone();

    let task = tokio::spawn({
        let client = client.clone();
        async move { client.list("slow:/", &mut RowCollector::default()).await }
    });
    tokio::time::sleep(ms(60)).await;
    token.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(err.is_canceled());
    assert!(!scheduler.is_registered(&Request::listing("slow:/")));
}
