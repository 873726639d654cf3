//! Execution backends
//!
//! The runner delegates to a [`TaskExecutor`] strategy chosen at
//! construction: a thread pool fed over a crossbeam channel, or an inline
//! executor that runs each closure in the submitting thread. This replaces
//! conditional compilation around an optional threading library with a
//! runtime strategy object.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

/// A unit of work: an independent closure with no result channel.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Execution strategy behind a `TaskRunner`.
pub trait TaskExecutor: Send + Sync {
    /// Hand over one task. May run it before returning (inline strategy) or
    /// queue it for a worker (pool strategy).
    fn submit(&self, task: Task);

    /// Block until every submitted task has completed. No-op when nothing is
    /// pending.
    fn wait(&self);

    /// True when submitted tasks may run concurrently with the caller.
    fn is_parallel(&self) -> bool;
}

/// Effective hardware concurrency; at least 1.
pub fn hardware_concurrency() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Runs each task synchronously in the submitting thread.
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn submit(&self, task: Task) {
        task();
    }

    fn wait(&self) {}

    fn is_parallel(&self) -> bool {
        false
    }
}

/// Tracks the number of submitted-but-incomplete tasks.
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            count: Mutex::new(0),
            drained: Condvar::new(),
        })
    }

    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn wait_drained(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.drained.wait(&mut count);
        }
    }
}

/// Fixed-size worker pool fed over an unbounded channel.
///
/// Dropping the pool closes the channel and joins every worker, so queued
/// work drains at scope exit; callers that need results must still call
/// `wait()` before reading them.
pub struct ThreadPoolExecutor {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
    worker_count: usize,
}

impl ThreadPoolExecutor {
    /// Spawn `worker_count` workers, clamped to at least 1 and at most the
    /// hardware concurrency.
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.clamp(1, hardware_concurrency());
        let (sender, receiver) = unbounded::<Task>();
        let pending = Pending::new();

        let workers = (0..worker_count)
            .map(|_| {
                let receiver: Receiver<Task> = receiver.clone();
                let pending = Arc::clone(&pending);
                thread::spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        // A panicking task must not take the worker down or
                        // leave the pending count stuck above zero.
                        let _ = panic::catch_unwind(AssertUnwindSafe(task));
                        pending.decrement();
                    }
                })
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
            pending,
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl TaskExecutor for ThreadPoolExecutor {
    fn submit(&self, task: Task) {
        self.pending.increment();
        if let Some(sender) = &self.sender {
            if sender.send(task).is_err() {
                // Channel closed mid-shutdown; the task will never run.
                self.pending.decrement();
            }
        } else {
            self.pending.decrement();
        }
    }

    fn wait(&self) {
        self.pending.wait_drained();
    }

    fn is_parallel(&self) -> bool {
        true
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        // Closing the channel lets each worker finish its queue and exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
