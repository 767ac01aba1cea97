//! A single worker thread with a bounded backlog.
//!
//! At most `backlog + 1` jobs are outstanding (one running, the rest queued). Submissions beyond
//! that are rejected immediately rather than blocking the caller. A job that panics is logged and
//! the worker moves on to the next one.

use futures::{
    channel::mpsc::{self, Sender},
    executor::block_on,
    StreamExt,
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};
use tracing::{debug, warn};

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

type Run = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    state: Arc<AtomicU8>,
    run: Run,
}

/// Returned when the backlog is full (or the executor has shut down).
#[derive(Debug, PartialEq, Eq)]
pub struct Rejected;

/// Handle to a submitted job.
#[derive(Clone, Debug)]
pub struct Handle {
    state: Arc<AtomicU8>,
}

impl Handle {
    /// Prevents the job from running if it has not started. Returns whether it was cancelled.
    ///
    /// A running job is left to finish.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns whether the job finished (including by panicking) or was cancelled.
    pub fn is_done(&self) -> bool {
        matches!(self.state.load(Ordering::Acquire), DONE | CANCELLED)
    }
}

pub struct Executor {
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Executor {
    /// Starts a worker thread named `name` that queues up to `backlog` jobs (at least one) behind
    /// the one running.
    pub fn new(name: &str, backlog: usize) -> Self {
        // A bounded channel holds `buffer` messages plus one per sender
        let (sender, mut receiver) = mpsc::channel::<Job>(backlog.max(1) - 1);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(job) = block_on(receiver.next()) {
                    if job
                        .state
                        .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                    {
                        continue;
                    }
                    if panic::catch_unwind(AssertUnwindSafe(job.run)).is_err() {
                        warn!("job panicked");
                    }
                    job.state.store(DONE, Ordering::Release);
                }
                debug!("executor stopped");
            })
            .expect("failed to spawn executor thread");
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues `run` if there is room.
    pub fn submit(&self, run: Run) -> Result<Handle, Rejected> {
        let mut sender = self.sender.lock().unwrap();
        let sender = sender.as_mut().ok_or(Rejected)?;
        let state = Arc::new(AtomicU8::new(PENDING));
        sender
            .try_send(Job {
                state: state.clone(),
                run,
            })
            .map_err(|_| Rejected)?;
        Ok(Handle { state })
    }

    /// Stops accepting jobs and waits for the worker to drain the queue.
    ///
    /// Jobs cancelled beforehand are discarded without running.
    pub fn shutdown(&self) {
        self.sender.lock().unwrap().take();
        if let Some(worker) = self.worker.lock().unwrap().take() {
            let _ = worker.join();
        }
    }
}
