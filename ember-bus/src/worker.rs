use crate::error::HandlerError;
use crate::meta::{Meta, POISON_PRIORITY};
use crate::registry::{ErasedQueryHandler, HandlerRegistry, QueryRegistry};
use futures::future::join_all;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

type AnyPayload = Arc<dyn Any + Send + Sync>;

pub(crate) enum Job {
    Event {
        type_id: TypeId,
        payload: AnyPayload,
    },
    Command {
        type_id: TypeId,
        payload: AnyPayload,
        done: oneshot::Sender<Result<(), HandlerError>>,
    },
    Query {
        type_id: TypeId,
        payload: AnyPayload,
        done: oneshot::Sender<Result<AnyPayload, HandlerError>>,
    },
    Poison,
}

struct QueuedJob {
    meta: Meta,
    seq: u64,
    job: Job,
}

impl QueuedJob {
    fn is_poison(&self) -> bool {
        matches!(self.job, Job::Poison)
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.meta.priority == other.meta.priority && self.seq == other.seq
    }
}
impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    /// `BinaryHeap` is a max-heap; we want the lowest `priority` value and,
    /// for ties, the lowest `seq` (earliest-enqueued) to sort as the
    /// greatest so it pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .meta
            .priority
            .cmp(&self.meta.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// One worker inbox within a [`WorkerPool`]. Owns its own priority queue and
/// dedup set — per §4.1, only the task that owns this worker ever touches
/// them, so no lock is needed across an `.await` boundary.
pub(crate) struct Worker {
    queue: Mutex<BinaryHeap<QueuedJob>>,
    in_flight: Mutex<HashSet<crate::meta::MsgKey>>,
    notify: Notify,
    seq: AtomicU64,
    stopped: AtomicBool,
    capacity: Arc<Semaphore>,
}

impl Worker {
    fn new(capacity: Arc<Semaphore>) -> Self {
        Self {
            queue: Mutex::new(BinaryHeap::new()),
            in_flight: Mutex::new(HashSet::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            capacity,
        }
    }

    /// Enqueue a job, honoring deduplication by `meta.key`. Returns `false`
    /// if the job was dropped as a duplicate.
    async fn enqueue(&self, meta: Meta, job: Job) -> bool {
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(meta.key.clone()) {
                debug!(key = %meta.key, "dropping duplicate message");
                return false;
            }
        }

        // Backpressure: block until a slot is available in this pool.
        let permit = self.capacity.clone().acquire_owned().await;
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.queue.lock().push(QueuedJob { meta, seq, job });
        // The permit is intentionally leaked here and reclaimed by the
        // worker loop after the job is processed (see `run`), so capacity
        // reflects work genuinely in flight, not just enqueued-then-popped.
        std::mem::forget(permit);
        self.notify.notify_one();
        true
    }

    fn enqueue_poison(&self) {
        let meta = Meta::new(
            POISON_PRIORITY,
            crate::meta::GroupKey::new("__poison__"),
            crate::meta::MsgKey::unique(),
        );
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.queue.lock().push(QueuedJob {
            meta,
            seq,
            job: Job::Poison,
        });
        self.notify.notify_one();
    }

    async fn run_events(self: Arc<Self>, registry: Arc<parking_lot::RwLock<HandlerRegistry>>) {
        loop {
            let Some(queued) = self.pop_or_wait().await else {
                break;
            };
            if queued.is_poison() {
                debug!("event worker draining poison, exiting");
                break;
            }
            self.run_event_job(queued, &registry).await;
        }
        self.stopped.store(true, AtomicOrdering::SeqCst);
    }

    async fn run_commands(self: Arc<Self>, registry: Arc<parking_lot::RwLock<HandlerRegistry>>) {
        loop {
            let Some(queued) = self.pop_or_wait().await else {
                break;
            };
            if queued.is_poison() {
                debug!("command worker draining poison, exiting");
                break;
            }
            self.run_command_job(queued, &registry).await;
        }
        self.stopped.store(true, AtomicOrdering::SeqCst);
    }

    async fn run_queries(self: Arc<Self>, registry: Arc<parking_lot::RwLock<QueryRegistry>>) {
        loop {
            let Some(queued) = self.pop_or_wait().await else {
                break;
            };
            if queued.is_poison() {
                debug!("query worker draining poison, exiting");
                break;
            }
            self.run_query_job(queued, &registry).await;
        }
        self.stopped.store(true, AtomicOrdering::SeqCst);
    }

    async fn pop_or_wait(&self) -> Option<QueuedJob> {
        loop {
            if let Some(job) = self.queue.lock().pop() {
                return Some(job);
            }
            self.notify.notified().await;
        }
    }

    fn finish(&self, meta: &Meta) {
        self.in_flight.lock().remove(&meta.key);
        self.capacity.add_permits(1);
    }

    async fn run_event_job(&self, queued: QueuedJob, registry: &parking_lot::RwLock<HandlerRegistry>) {
        let QueuedJob { meta, job, .. } = queued;
        if let Job::Event { type_id, payload } = job {
            let handlers = registry.read().matching(type_id, &payload);
            let results = join_all(handlers.iter().map(|h| h.call(payload.clone()))).await;
            for res in results {
                if let Err(err) = res {
                    error!(error = %err, group = %meta.group, "event handler failed");
                }
            }
        }
        self.finish(&meta);
    }

    async fn run_command_job(&self, queued: QueuedJob, registry: &parking_lot::RwLock<HandlerRegistry>) {
        let QueuedJob { meta, job, .. } = queued;
        if let Job::Command {
            type_id,
            payload,
            done,
        } = job
        {
            let handlers = registry.read().matching(type_id, &payload);
            let results = join_all(handlers.iter().map(|h| h.call(payload.clone()))).await;
            let outcome = results.into_iter().find(|r| r.is_err()).unwrap_or(Ok(()));
            if let Err(ref err) = outcome {
                error!(error = %err, group = %meta.group, "command handler failed");
            }
            let _ = done.send(outcome);
        }
        self.finish(&meta);
    }

    async fn run_query_job(&self, queued: QueuedJob, registry: &parking_lot::RwLock<QueryRegistry>) {
        let QueuedJob { meta, job, .. } = queued;
        if let Job::Query {
            type_id,
            payload,
            done,
        } = job
        {
            let handler: Option<Arc<dyn ErasedQueryHandler>> = registry.read().get(type_id);
            let outcome = match handler {
                Some(handler) => handler.call(payload).await,
                None => Err(HandlerError::new("no handler registered for query")),
            };
            if let Err(ref err) = outcome {
                warn!(error = %err, group = %meta.group, "query handler failed");
            }
            let _ = done.send(outcome);
        }
        self.finish(&meta);
    }
}

/// A pool of [`Worker`]s sharing a single handler registry. Messages are
/// routed to a worker by hashing `meta.group` (§5 "Messages targeted at the
/// same `(symbol, timeframe)` hash to the same worker").
pub(crate) struct EventCommandPool {
    workers: Vec<Arc<Worker>>,
    registry: Arc<parking_lot::RwLock<HandlerRegistry>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    is_command_pool: bool,
}

impl EventCommandPool {
    pub(crate) fn spawn(num_workers: usize, queue_capacity: usize, is_command_pool: bool) -> Self {
        let registry = Arc::new(parking_lot::RwLock::new(HandlerRegistry::default()));
        let mut workers = Vec::with_capacity(num_workers);
        let mut tasks = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let worker = Arc::new(Worker::new(Arc::new(Semaphore::new(queue_capacity))));
            let handle = if is_command_pool {
                tokio::spawn(worker.clone().run_commands(registry.clone()))
            } else {
                tokio::spawn(worker.clone().run_events(registry.clone()))
            };
            workers.push(worker);
            tasks.push(handle);
        }
        Self {
            workers,
            registry,
            tasks: Mutex::new(tasks),
            is_command_pool,
        }
    }

    pub(crate) fn registry(&self) -> &Arc<parking_lot::RwLock<HandlerRegistry>> {
        &self.registry
    }

    fn worker_for(&self, group: &crate::meta::GroupKey) -> &Arc<Worker> {
        &self.workers[group.worker_index(self.workers.len())]
    }

    pub(crate) async fn dispatch_event(&self, meta: Meta, type_id: TypeId, payload: AnyPayload) {
        debug_assert!(!self.is_command_pool);
        let worker = self.worker_for(&meta.group).clone();
        worker.enqueue(meta, Job::Event { type_id, payload }).await;
    }

    pub(crate) async fn dispatch_command(
        &self,
        meta: Meta,
        type_id: TypeId,
        payload: AnyPayload,
        done: oneshot::Sender<Result<(), HandlerError>>,
    ) {
        debug_assert!(self.is_command_pool);
        let worker = self.worker_for(&meta.group).clone();
        // Commands are expected to carry a unique key, so `enqueue` should
        // never report a duplicate here; if it does, the caller's `done`
        // receiver is simply dropped and `execute` observes `ShuttingDown`.
        worker
            .enqueue(
                meta,
                Job::Command {
                    type_id,
                    payload,
                    done,
                },
            )
            .await;
    }

    pub(crate) async fn wait(&self) {
        // Polling drain: wait until every worker's queue and in-flight set
        // is empty. Commands/queries already `.await` their own completion,
        // so `wait()` exists primarily for fire-and-forget event draining.
        loop {
            let idle = self
                .workers
                .iter()
                .all(|w| w.queue.lock().is_empty() && w.in_flight.lock().is_empty());
            if idle {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    pub(crate) fn stop(&self) {
        for worker in &self.workers {
            worker.enqueue_poison();
        }
    }

    pub(crate) async fn join(&self) {
        let mut tasks = self.tasks.lock().drain(..).collect::<Vec<_>>();
        for task in tasks.drain(..) {
            let _ = task.await;
        }
    }
}

/// Specialisation of the pool for queries, which carry a typed response
/// rather than a pass/fail completion, and have at most one handler per
/// query type.
pub(crate) struct QueryPool {
    workers: Vec<Arc<Worker>>,
    registry: Arc<parking_lot::RwLock<QueryRegistry>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl QueryPool {
    pub(crate) fn spawn(num_workers: usize, queue_capacity: usize) -> Self {
        let registry = Arc::new(parking_lot::RwLock::new(QueryRegistry::default()));
        let mut workers = Vec::with_capacity(num_workers);
        let mut tasks = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let worker = Arc::new(Worker::new(Arc::new(Semaphore::new(queue_capacity))));
            let handle = tokio::spawn(worker.clone().run_queries(registry.clone()));
            workers.push(worker);
            tasks.push(handle);
        }
        Self {
            workers,
            registry,
            tasks: Mutex::new(tasks),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<parking_lot::RwLock<QueryRegistry>> {
        &self.registry
    }

    fn worker_for(&self, group: &crate::meta::GroupKey) -> &Arc<Worker> {
        &self.workers[group.worker_index(self.workers.len())]
    }

    pub(crate) async fn dispatch_query(
        &self,
        meta: Meta,
        type_id: TypeId,
        payload: AnyPayload,
        done: oneshot::Sender<Result<AnyPayload, HandlerError>>,
    ) {
        let worker = self.worker_for(&meta.group).clone();
        worker
            .enqueue(
                meta,
                Job::Query {
                    type_id,
                    payload,
                    done,
                },
            )
            .await;
    }

    pub(crate) async fn wait(&self) {
        loop {
            let idle = self
                .workers
                .iter()
                .all(|w| w.queue.lock().is_empty() && w.in_flight.lock().is_empty());
            if idle {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    pub(crate) fn stop(&self) {
        for worker in &self.workers {
            worker.enqueue_poison();
        }
    }

    pub(crate) async fn join(&self) {
        let mut tasks = self.tasks.lock().drain(..).collect::<Vec<_>>();
        for task in tasks.drain(..) {
            let _ = task.await;
        }
    }
}
