//! Measure the latency of block nodes in the background.

use crate::{
    executor::{Executor, Handle, Rejected},
    metrics, Client, Node, Oracle, ProbeConfig,
};
use blockstream_utils::Clock;
use blockstream_verifier::read;
use prometheus_client::registry::Registry;
use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, OnceLock,
    },
};
use tracing::{debug, warn};

/// A probe of one node, valid only while its generation is current.
struct Task<E: Clock, C: Client> {
    generation: u64,
    node: Arc<Node<E, C>>,
}

impl<E: Clock, C: Client> Clone for Task<E, C> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            node: self.node.clone(),
        }
    }
}

struct Inner<E: Clock, C: Client> {
    config: ProbeConfig,
    oracle: Arc<dyn Oracle>,
    metrics: metrics::Prober,

    generation: AtomicU64,
    tasks: Mutex<VecDeque<Task<E, C>>>,
    results: Mutex<Vec<Handle>>,
    executor: OnceLock<Executor>,
    closed: AtomicBool,
}

/// Measures the latency of a set of nodes in the background.
///
/// Each call to [Prober::schedule] submits up to `backlog + 1` pending probes to a single worker
/// thread (started on first use). A probe streams the block the [Oracle] says is needed next and
/// records the observed latency on its node. A successful probe queues itself again, so nodes are
/// measured round-robin until [Prober::set_nodes] replaces them.
pub struct Prober<E: Clock, C: Client> {
    inner: Arc<Inner<E, C>>,
}

impl<E: Clock, C: Client> Clone for Prober<E, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clock, C: Client> Prober<E, C> {
    /// Creates a prober with no nodes, registering its metrics with `registry`.
    pub fn new(
        config: ProbeConfig,
        oracle: Arc<dyn Oracle>,
        registry: &mut Registry,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                oracle,
                metrics: metrics::Prober::init(registry),
                generation: AtomicU64::new(0),
                tasks: Mutex::new(VecDeque::new()),
                results: Mutex::new(Vec::new()),
                executor: OnceLock::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Replaces the probed nodes, invalidating every probe of the previous set.
    pub fn set_nodes(&self, nodes: Vec<Arc<Node<E, C>>>) {
        self.cancel_all();
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut tasks = self.inner.tasks.lock().unwrap();
        tasks.extend(nodes.into_iter().map(|node| Task { generation, node }));
        self.inner.metrics.pending.set(tasks.len() as i64);
        debug!(generation, nodes = tasks.len(), "set probed nodes");
    }

    /// Cancels queued probes and forgets pending ones. Probes already running finish, but their
    /// results are kept only if their generation is still current.
    pub fn cancel_all(&self) {
        for handle in self.inner.results.lock().unwrap().drain(..) {
            handle.cancel();
        }
        self.inner.tasks.lock().unwrap().clear();
        self.inner.metrics.pending.set(0);
    }

    /// Submits pending probes until `backlog + 1` are outstanding. Does nothing once closed.
    pub fn schedule(&self) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        self.inner.results.lock().unwrap().retain(|handle| !handle.is_done());
        let executor = self.inner.executor();
        for _ in 0..=self.inner.config.backlog {
            let Some(task) = self.inner.tasks.lock().unwrap().pop_front() else {
                break;
            };
            let job = {
                let inner = self.inner.clone();
                let task = task.clone();
                Box::new(move || inner.probe(task))
            };
            match executor.submit(job) {
                Ok(handle) => {
                    self.inner.metrics.submitted.inc();
                    self.inner.results.lock().unwrap().push(handle);
                }
                Err(Rejected) => {
                    self.inner.metrics.rejected.inc();
                    self.inner.tasks.lock().unwrap().push_front(task);
                    break;
                }
            }
        }
        self.inner.update_pending();
    }

    /// Returns the number of probes waiting to be submitted.
    pub fn pending(&self) -> usize {
        self.inner.tasks.lock().unwrap().len()
    }

    /// Returns the current generation (the number of times [Prober::set_nodes] was called).
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Cancels all probes and stops the worker (if it was started). No probe runs afterwards.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.cancel_all();
        if let Some(executor) = self.inner.executor.get() {
            executor.shutdown();
        }
    }
}

impl<E: Clock, C: Client> Inner<E, C> {
    fn executor(&self) -> &Executor {
        self.executor
            .get_or_init(|| Executor::new("prober", self.config.backlog))
    }

    fn update_pending(&self) {
        let pending = self.tasks.lock().unwrap().len();
        self.metrics.pending.set(pending as i64);
    }

    fn is_current(&self, task: &Task<E, C>) -> bool {
        task.generation == self.generation.load(Ordering::Acquire)
    }

    /// Runs `task`, counting a panic as a failed probe.
    fn probe(&self, task: Task<E, C>) {
        let node = task.node.clone();
        if panic::catch_unwind(AssertUnwindSafe(|| self.run(task))).is_err() {
            self.metrics.failed.inc();
            warn!(%node, "probe panicked");
        }
    }

    fn run(&self, task: Task<E, C>) {
        if !self.is_current(&task) {
            // Never requeued
            self.metrics.stale.inc();
            debug!(node = %task.node, generation = task.generation, "dropped stale probe");
            return;
        }

        let Some(block) = self.oracle.next_block_number() else {
            self.metrics.skipped.inc();
            debug!(node = %task.node, "next block unknown, skipping probe");
            return;
        };
        if !task.node.has_block(block) {
            self.metrics.skipped.inc();
            debug!(node = %task.node, block, "node lacks block, skipping probe");
            return;
        }

        let node = &task.node;
        let result = node.stream(block, Some(block), self.config.timeout, &mut |received| {
            match read(&received) {
                Ok(summary) => {
                    node.record_latency(summary.latency(received.completed));
                    self.metrics.measured.inc();
                }
                Err(err) => warn!(%node, ?err, "failed to read probed block"),
            }
            false
        });
        if let Err(err) = result {
            self.metrics.failed.inc();
            warn!(%node, block, ?err, "probe failed");
            return;
        }

        if self.is_current(&task) {
            self.tasks.lock().unwrap().push_back(task);
            self.update_pending();
        }
    }
}
