//! # Task batches
//!
//! A batch fans a list of jobs out over a rayon pool and hands back one
//! completion handle for the whole set.
//!
//! - `is_ready()` is a single atomic load and never blocks, so the driver
//!   can poll it every tick.
//! - `wait()`/`join()` block on the result channel for callers that need
//!   everything finished (teardown, batch initialisation).
//! - A job that panics is caught on the worker and reported as a
//!   [`TaskFailure`]. It still counts as completed, so a failed batch is
//!   seen by the poll instead of hanging it.

use rayon::ThreadPool;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A job that did not produce a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub unit: usize,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit {}: {}", self.unit, self.message)
    }
}

type Completion<T> = (usize, Result<T, String>);

/// Completion handle for a set of jobs running on a pool
pub struct TaskBatch<T> {
    expected: usize,
    remaining: Arc<AtomicUsize>,
    receiver: Receiver<Completion<T>>,
    received: Vec<Completion<T>>,
    started: Instant,
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

impl<T: Send + 'static> TaskBatch<T> {
    /// Spawn one pool task per job, each running `work(job)`
    pub fn spawn<J, F>(pool: &ThreadPool, jobs: Vec<J>, work: F) -> Self
    where
        J: Send + 'static,
        F: Fn(J) -> T + Send + Sync + 'static,
    {
        let expected = jobs.len();
        let remaining = Arc::new(AtomicUsize::new(expected));
        let (sender, receiver) = mpsc::channel();
        let work = Arc::new(work);

        for (unit, job) in jobs.into_iter().enumerate() {
            let sender = sender.clone();
            let remaining = Arc::clone(&remaining);
            let work = Arc::clone(&work);

            pool.spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| work(job)))
                    .map_err(panic_message);
                // Captured state is released before the batch can report ready
                drop(work);
                // Queue the result before the counter drops so a ready batch never waits on recv
                let _ = sender.send((unit, result));
                remaining.fetch_sub(1, Ordering::AcqRel);
            });
        }

        Self {
            expected,
            remaining,
            receiver,
            received: Vec::with_capacity(expected),
            started: Instant::now(),
        }
    }
}

impl<T> TaskBatch<T> {
    /// Number of jobs in the batch
    pub fn len(&self) -> usize {
        self.expected
    }

    pub fn is_empty(&self) -> bool {
        self.expected == 0
    }

    /// Jobs that have not completed yet
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Non-blocking check that every job has completed (successfully or not)
    pub fn is_ready(&self) -> bool {
        self.received.len() == self.expected || self.remaining() == 0
    }

    /// Time since the batch was spawned
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Block until every job has reported
    pub fn wait(&mut self) {
        while self.received.len() < self.expected {
            match self.receiver.recv() {
                Ok(completion) => self.received.push(completion),
                Err(_) => break,
            }
        }
    }

    /// Wait for the batch and collect results in job order.
    ///
    /// Any failed job fails the whole batch.
    pub fn join(mut self) -> Result<Vec<T>, TaskFailure> {
        self.wait();

        if self.received.len() < self.expected {
            return Err(TaskFailure {
                unit: self.received.len(),
                message: "worker exited without reporting a result".to_string(),
            });
        }

        self.received.sort_by_key(|(unit, _)| *unit);
        self.received
            .into_iter()
            .map(|(unit, result)| result.map_err(|message| TaskFailure { unit, message }))
            .collect()
    }
}
