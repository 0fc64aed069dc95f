//! Bounded, order-preserving work queue.
//!
//! This module provides the concurrency core of the pipeline: a fixed-size
//! worker pool that runs submitted tasks in parallel while a single consumer
//! observes their results in exact submission order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  submit   ┌─────────────┐  results  ┌──────────────┐
//! │ Producer │──────────>│ Worker Pool │──────────>│ ResultStream │
//! │ (1 thread)│  (FIFO)  │ (W threads) │  (slots)  │  (1 thread)  │
//! └──────────┘           └─────────────┘           └──────────────┘
//! ```
//!
//! Each submission pushes a pending-result handle onto a bounded FIFO and
//! dispatches the task to the pool. The consumer pops handles head-first and
//! blocks until that specific task has completed, even when later tasks
//! finish earlier: head-of-line blocking is the deliberate price of
//! deterministic output order. The FIFO bound applies backpressure to the
//! producer, keeping the memory held by completed-but-unread results
//! proportional to the capacity rather than to the total number of
//! submissions.

use std::any::Any;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

type Task<R> = Box<dyn FnOnce() -> Result<R> + Send>;

/// Producer half of the queue: submits tasks and finalizes the stream.
///
/// Created together with its [`ResultStream`] by [`WorkQueue::new`]. The two
/// halves are the only synchronization point between the producing and
/// consuming threads.
pub struct WorkQueue<R> {
    jobs: Option<Sender<(Task<R>, Sender<Result<R>>)>>,
    pending: Option<Sender<Receiver<Result<R>>>>,
    workers: Vec<JoinHandle<()>>,
}

/// Consumer half of the queue: yields results in submission order.
pub struct ResultStream<R> {
    pending: Receiver<Receiver<Result<R>>>,
}

impl<R: Send + 'static> WorkQueue<R> {
    /// Creates a queue backed by `threads` workers, with the default
    /// capacity bound of `2 * threads` outstanding results.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    #[must_use]
    pub fn new(threads: usize) -> (Self, ResultStream<R>) {
        Self::with_capacity(threads, threads * 2)
    }

    /// Creates a queue with an explicit capacity bound on outstanding
    /// (submitted-but-not-yet-consumed) results.
    ///
    /// # Panics
    ///
    /// Panics if `threads` or `capacity` is zero.
    #[must_use]
    pub fn with_capacity(threads: usize, capacity: usize) -> (Self, ResultStream<R>) {
        assert!(threads >= 1, "worker count must be >= 1");
        assert!(capacity >= 1, "capacity must be >= 1");

        let (job_tx, job_rx) = unbounded::<(Task<R>, Sender<Result<R>>)>();
        let (handle_tx, handle_rx) = bounded(capacity);

        let workers = (0..threads)
            .map(|i| {
                let jobs = job_rx.clone();
                thread::Builder::new()
                    .name(format!("ccs-worker-{i}"))
                    .spawn(move || worker_loop(&jobs))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        (
            Self { jobs: Some(job_tx), pending: Some(handle_tx), workers },
            ResultStream { pending: handle_rx },
        )
    }

    /// Submits a task to the pool.
    ///
    /// Blocks only when the number of outstanding results has reached the
    /// capacity bound, never on the computation of any task. Each call
    /// reserves the next slot in the delivery order before the task is
    /// dispatched, so results come back in exactly this call order.
    pub fn submit<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
    {
        let (slot_tx, slot_rx) = bounded(1);

        // Reserve the delivery slot first: this is the backpressure point.
        self.pending
            .as_ref()
            .expect("submit after finalize")
            .send(slot_rx)
            .map_err(|_| anyhow!("result stream disconnected"))?;

        self.jobs
            .as_ref()
            .expect("submit after finalize")
            .send((Box::new(task), slot_tx))
            .map_err(|_| anyhow!("worker pool shut down"))?;

        Ok(())
    }

    /// Declares that no further submissions will occur.
    ///
    /// Waits for the workers to drain all dispatched tasks, then closes the
    /// handle FIFO so the consumer's [`ResultStream::consume`] loop observes
    /// end-of-stream once the already-submitted results are drained.
    pub fn finalize(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Closing the job channel lets workers drain and exit.
        self.jobs.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        // Closing the handle FIFO signals end-of-stream to the consumer.
        self.pending.take();
    }
}

impl<R> Drop for WorkQueue<R> {
    fn drop(&mut self) {
        self.jobs.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        self.pending.take();
    }
}

fn worker_loop<R>(jobs: &Receiver<(Task<R>, Sender<Result<R>>)>) {
    while let Ok((task, slot)) = jobs.recv() {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task))
            .unwrap_or_else(|panic| {
                Err(anyhow!("worker task panicked: {}", panic_message(panic.as_ref())))
            });
        // The consumer may have bailed early; a closed slot is not an error here.
        let _ = slot.send(result);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<R> ResultStream<R> {
    /// Consumes the next result in submission order.
    ///
    /// Blocks until the head submission's task has completed, applies
    /// `apply` to its output on the calling thread, and returns `Ok(true)`.
    /// Returns `Ok(false)`, without blocking, once the queue has been
    /// finalized and every submitted result consumed.
    ///
    /// A task error (or panic, mapped to an error) is returned here at the
    /// moment its handle reaches the head of the FIFO, so errors are
    /// delivered in submission order too. Errors from `apply` propagate
    /// unchanged.
    pub fn consume<F>(&self, apply: F) -> Result<bool>
    where
        F: FnOnce(R) -> Result<()>,
    {
        let Ok(slot) = self.pending.recv() else {
            return Ok(false);
        };
        let result = slot
            .recv()
            .map_err(|_| anyhow!("worker dropped a result before completing"))?;
        apply(result?)?;
        Ok(true)
    }
}
