//! Shared serialization queue
//!
//! Every [`ThreadPipe`](crate::ThreadPipe) funnels its mutations through one
//! [`SerialQueue`]: a single worker thread draining jobs from an unbounded
//! channel in submission order. Sharing one queue across all pipe instances
//! gives a total order of mutations process-wide at the cost of head-of-line
//! contention between unrelated pipes; that tradeoff is deliberate and must
//! not be optimized away into per-pipe locks.
//!
//! The queue is an explicit, injectable resource rather than hidden global
//! state: [`SerialQueue::global`] returns the process-wide instance that
//! [`ThreadPipe::new`](crate::ThreadPipe::new) shares, while tests construct
//! private queues and pass them to
//! [`ThreadPipe::with_queue`](crate::ThreadPipe::with_queue) for
//! deterministic ordering.
//!
//! Jobs must never block the worker: the pipe's blocking consumers suspend
//! on their own rendezvous channels, and processor batches run on the
//! processor's queue, so nothing submitted here waits on anything.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crate::error::{PipeError, Result};

/// A unit of work executed on the queue's worker thread.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single-threaded, ordered execution queue.
///
/// Jobs submitted with [`submit`](Self::submit) or
/// [`run_sync`](Self::run_sync) execute one at a time, in submission order,
/// on a dedicated worker thread. Dropping the queue closes the channel and
/// joins the worker; jobs submitted afterwards fail with
/// [`PipeError::QueueClosed`].
pub struct SerialQueue {
    job_tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    name: String,
}

impl SerialQueue {
    /// Spawns a new serialization queue with a named worker thread.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        let (job_tx, job_rx) = unbounded::<Job>();
        let thread_name = name.clone();
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(job_rx, &thread_name))
            .expect("failed to spawn serialization worker thread");

        Arc::new(Self {
            job_tx: Some(job_tx),
            worker: Some(worker),
            name,
        })
    }

    /// The process-wide queue shared by every pipe created with
    /// [`ThreadPipe::new`](crate::ThreadPipe::new).
    ///
    /// Constructed once on first use and alive for the rest of the process.
    pub fn global() -> Arc<SerialQueue> {
        static GLOBAL: OnceLock<Arc<SerialQueue>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| SerialQueue::new("threadpipe-serial"))
            .clone()
    }

    /// Worker loop: drain jobs until the channel closes.
    fn run(job_rx: Receiver<Job>, name: &str) {
        tracing::info!("Serialization worker '{}' started", name);
        while let Ok(job) = job_rx.recv() {
            job();
        }
        tracing::info!("Serialization worker '{}' stopped", name);
    }

    /// The name the queue was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues a job without waiting for it to run.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let tx = self.job_tx.as_ref().ok_or(PipeError::QueueClosed)?;
        tx.send(Box::new(job)).map_err(|_| PipeError::QueueClosed)
    }

    /// Enqueues a job and blocks the calling thread until it has executed on
    /// the worker, returning the job's result.
    ///
    /// This is the serialization point of every pipe operation: the caller
    /// suspends, the worker runs the job and hands the result back over a
    /// rendezvous channel.
    pub fn run_sync<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (done_tx, done_rx) = bounded(1);
        self.submit(move || {
            let _ = done_tx.send(job());
        })?;
        done_rx.recv().map_err(|_| PipeError::QueueClosed)
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once pending jobs drain.
        self.job_tx.take();
        if let Some(handle) = self.worker.take() {
            // A job can own the last handle to its own queue; joining the
            // current thread would deadlock.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("name", &self.name)
            .field("closed", &self.job_tx.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_run_sync_returns_job_result() {
        let queue = SerialQueue::new("test-run-sync");
        let value = queue.run_sync(|| 21 * 2).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_jobs_execute_in_submission_order() {
        let queue = SerialQueue::new("test-ordering");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            queue
                .submit(move || seen.lock().unwrap().push(i))
                .unwrap();
        }

        // run_sync acts as a barrier: everything submitted before it has run.
        queue.run_sync(|| {}).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_cross_queue_submissions_interleave_safely() {
        let a = SerialQueue::new("test-a");
        let b = SerialQueue::new("test-b");

        let from_b = a
            .run_sync({
                let b = Arc::clone(&b);
                move || b.run_sync(|| "nested").unwrap()
            })
            .unwrap();
        assert_eq!(from_b, "nested");
    }

    #[test]
    fn test_global_is_a_single_instance() {
        let first = SerialQueue::global();
        let second = SerialQueue::global();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.run_sync(|| 1).unwrap(), 1);
    }

    #[test]
    fn test_drop_joins_worker_after_pending_jobs() {
        let queue = SerialQueue::new("test-drop");
        let seen = Arc::new(Mutex::new(0u32));

        for _ in 0..10 {
            let seen = Arc::clone(&seen);
            queue
                .submit(move || *seen.lock().unwrap() += 1)
                .unwrap();
        }
        drop(queue);

        // Drop drains the channel before joining, so every job ran.
        assert_eq!(*seen.lock().unwrap(), 10);
    }
}
