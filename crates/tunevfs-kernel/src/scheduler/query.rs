//! The polling protocol server side.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tunevfs_types::{Request, ResultRow};

use super::notify::ChangeNotifier;
use super::ops::build_operation;
use super::registry::{Lookup, OperationInfo, OperationRegistry, Registered, TaskOutput};
use crate::cache::KeyedLocks;
use crate::config::SchedulerConfig;
use crate::error::VfsError;
use crate::vfs::CachingResolver;

/// Runs operations for polled requests.
///
/// A request that finishes within `sync_wait` is answered directly and never
/// registered. A slower one is registered under its key; later polls of the
/// same key observe that one operation until a poll collects its final rows.
pub struct AsyncQueryScheduler {
    resolver: Arc<CachingResolver>,
    registry: OperationRegistry,
    /// Tokens of workers still inside a poll's bounded wait.
    pending: Mutex<HashMap<String, CancellationToken>>,
    gates: KeyedLocks,
    notifier: ChangeNotifier,
    sync_wait: Duration,
    notify_interval: Duration,
    spawned: AtomicU64,
}

impl AsyncQueryScheduler {
    pub fn new(resolver: Arc<CachingResolver>, config: &SchedulerConfig) -> Self {
        Self::with_timing(resolver, config.sync_wait(), config.notify_interval())
    }

    pub fn with_timing(
        resolver: Arc<CachingResolver>,
        sync_wait: Duration,
        notify_interval: Duration,
    ) -> Self {
        Self {
            resolver,
            registry: OperationRegistry::new(),
            pending: Mutex::default(),
            gates: KeyedLocks::new(),
            notifier: ChangeNotifier::default(),
            sync_wait,
            notify_interval,
            spawned: AtomicU64::new(0),
        }
    }

    pub fn resolver(&self) -> &Arc<CachingResolver> {
        &self.resolver
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Answer one poll of `request`.
    ///
    /// Never fails: errors come back as a single error row, and a canceled
    /// operation yields an empty batch.
    pub async fn poll(&self, request: &Request) -> Vec<ResultRow> {
        let key = request.key();
        let _gate = self.gates.lock(&key).await;

        match self.registry.lookup(&key) {
            Lookup::Running(status) => return status,
            Lookup::Finished(entry) => {
                entry.ticker.abort();
                debug!(key = %key, elapsed = ?entry.started.elapsed(), "operation collected");
                let output = entry.handle.await;
                return finish(&key, output);
            }
            Lookup::Absent => {}
        }

        let token = CancellationToken::new();
        let op = match build_operation(request, self.resolver.clone(), token.clone()) {
            Ok(op) => op,
            Err(e) => return vec![ResultRow::error(e.to_string())],
        };

        self.spawned.fetch_add(1, Ordering::Relaxed);
        let worker_op = op.clone();
        let worker_token = token.clone();
        let mut handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = worker_token.cancelled() => Err(VfsError::Canceled),
                result = worker_op.call() => result,
            }
        });

        // Until the worker is registered, dropping this poll or canceling the
        // request stops it.
        let pending = PendingWorker::new(self, key.clone(), token.clone());
        if let Ok(output) = tokio::time::timeout(self.sync_wait, &mut handle).await {
            pending.disarm();
            return finish(&key, output);
        }
        if token.is_cancelled() {
            pending.disarm();
            handle.abort();
            debug!(key = %key, "operation canceled before registration");
            return Vec::new();
        }

        let status = op.status();
        let ticker = self.spawn_ticker(key.clone());
        debug!(key = %key, "operation registered");
        self.registry.insert(
            key.clone(),
            Registered {
                op,
                handle,
                token: token.clone(),
                ticker,
                started: Instant::now(),
            },
        );
        pending.disarm();
        if token.is_cancelled() {
            // Canceled between the wait and the insert.
            if let Some(entry) = self.registry.remove(&key) {
                entry.cancel();
            }
            return Vec::new();
        }
        status
    }

    /// Cancel the operation running for `request`, registered or still
    /// inside its first poll.
    ///
    /// Returns false if nothing was running. A later poll starts afresh.
    pub fn cancel(&self, request: &Request) -> bool {
        let key = request.key();
        if let Some(entry) = self.registry.remove(&key) {
            entry.cancel();
            debug!(key = %key, "operation canceled");
            return true;
        }
        match self.pending_tokens().get(&key) {
            Some(token) => {
                token.cancel();
                debug!(key = %key, "unregistered operation canceled");
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, request: &Request) -> bool {
        self.registry.contains(&request.key())
    }

    pub fn list(&self) -> Vec<OperationInfo> {
        self.registry.list()
    }

    /// Number of worker tasks started so far.
    pub fn jobs_spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Cancel every running operation.
    pub fn shutdown(&self) {
        for info in self.list() {
            debug!(key = %info.key, state = %info.state, "canceling at shutdown");
        }
        let count = self.registry.cancel_all();
        self.pending_tokens().values().for_each(CancellationToken::cancel);
        if count > 0 {
            debug!(count, "canceled running operations");
        }
    }

    fn pending_tokens(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_ticker(&self, key: String) -> tokio::task::JoinHandle<()> {
        let notifier = self.notifier.clone();
        let period = self.notify_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                notifier.notify(&key);
            }
        })
    }
}

impl Drop for AsyncQueryScheduler {
    fn drop(&mut self) {
        self.registry.cancel_all();
        self.pending_tokens().values().for_each(CancellationToken::cancel);
    }
}

/// A spawned worker not yet handed to the registry.
///
/// Visible to [`AsyncQueryScheduler::cancel`] while it lives. Dropped without
/// [`disarm`](Self::disarm), it cancels the worker.
struct PendingWorker<'a> {
    scheduler: &'a AsyncQueryScheduler,
    key: String,
    token: CancellationToken,
    armed: bool,
}

impl<'a> PendingWorker<'a> {
    fn new(scheduler: &'a AsyncQueryScheduler, key: String, token: CancellationToken) -> Self {
        scheduler.pending_tokens().insert(key.clone(), token.clone());
        Self {
            scheduler,
            key,
            token,
            armed: true,
        }
    }

    /// Stop tracking the worker without canceling it.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingWorker<'_> {
    fn drop(&mut self) {
        self.scheduler.pending_tokens().remove(&self.key);
        if self.armed {
            debug!(key = %self.key, "poll dropped, canceling its worker");
            self.token.cancel();
        }
    }
}

/// Turn a worker's output into the final batch.
fn finish(key: &str, output: TaskOutput) -> Vec<ResultRow> {
    match output {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) if e.is_canceled() => {
            debug!(key, "operation canceled");
            Vec::new()
        }
        Ok(Err(e)) => {
            debug!(key, error = %e, "operation failed");
            vec![ResultRow::error(e.to_string())]
        }
        Err(e) if e.is_cancelled() => Vec::new(),
        Err(e) => {
            warn!(key, error = %e, "operation panicked");
            vec![ResultRow::error(format!("operation panicked: {e}"))]
        }
    }
}
