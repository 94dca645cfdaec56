//! Execution contexts for continuation dispatch.
//!
//! Every chaining operator takes the context its handler should run on as an
//! explicit [`ExecutorRef`] instead of reaching for a process-wide default.
//! [`Immediate`] gives deterministic, synchronous dispatch for tests,
//! [`SerialExecutor`] is a single ordered worker (the "main" context of the
//! dispatch-queue model) and [`ThreadPool`] is the background context.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

/// A unit of deferred work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to an execution context.
pub type ExecutorRef = Arc<dyn Executor>;

/// Something that can run a job, later or right now. `execute` must enqueue
/// and return; it never blocks on the job itself.
pub trait Executor: Send + Sync {
    /// Schedule `job` for execution on this context.
    fn execute(&self, job: Job);
}

/// Runs every job inline on the calling thread.
///
/// Useful wherever dispatch order has to be deterministic, most of all in
/// tests.
pub struct Immediate;

impl Executor for Immediate {
    fn execute(&self, job: Job) {
        job();
    }
}

/// A single worker thread draining its queue in FIFO order.
///
/// Jobs submitted from any thread run one after another, never
/// concurrently. Dropping the executor closes the queue and joins the
/// worker; jobs already queued still run.
pub struct SerialExecutor {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialExecutor {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let worker = thread::Builder::new()
            .name("promise-serial".into())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
                tracing::debug!("serial executor drained, worker exiting");
            })
            .expect("failed to spawn serial executor thread");
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }
}

impl Default for SerialExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for SerialExecutor {
    fn execute(&self, job: Job) {
        if let Some(sender) = &self.sender {
            if sender.send(job).is_err() {
                tracing::warn!("job dropped, serial executor already shut down");
            }
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A fixed pool of worker threads sharing one job queue.
///
/// The background context: jobs run concurrently, in no particular order
/// relative to each other. Dropping the pool closes the queue and joins all
/// workers.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Create a pool with `size` workers. A requested size of zero still
    /// gets one worker.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("promise-worker-{id}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                })
                .expect("failed to spawn pool worker thread");
            workers.push(handle);
        }
        tracing::debug!(size, "thread pool started");
        Self {
            sender: Some(sender),
            workers,
        }
    }
}

impl Executor for ThreadPool {
    fn execute(&self, job: Job) {
        if let Some(sender) = &self.sender {
            if sender.send(job).is_err() {
                tracing::warn!("job dropped, thread pool already shut down");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        tracing::debug!("thread pool shut down");
    }
}
