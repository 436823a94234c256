//! Serializing UI worker
//!
//! A single dedicated thread that runs posted tasks one at a time, in post
//! order. All compositor transactions and host surface callbacks go through
//! it, so they are strictly ordered relative to each other no matter which
//! thread posted them.

use crossbeam_channel::{bounded, unbounded, Sender};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use thiserror::Error;
use tracing::{debug, error, info};

/// Worker error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Worker has been shut down
    #[error("UI worker '{0}' is stopped")]
    Stopped(String),

    /// OS refused to spawn the thread
    #[error("Failed to spawn UI worker: {0}")]
    Spawn(String),
}

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Job {
    Run(Task),
    Flush(Sender<()>),
}

struct Inner {
    name: String,
    tx: Mutex<Option<Sender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
}

/// Handle to the serializing worker
///
/// Cheap to clone; every clone posts to the same thread.
#[derive(Clone)]
pub struct UiWorker {
    inner: Arc<Inner>,
}

impl UiWorker {
    /// Spawn the worker thread
    pub fn spawn(name: &str) -> Result<Self, WorkerError> {
        let (tx, rx) = unbounded::<Job>();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(worker = %thread_name, "UI worker started");
                for job in rx {
                    match job {
                        Job::Run(task) => {
                            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                                error!(worker = %thread_name, "Task panicked on UI worker");
                            }
                        }
                        Job::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                debug!(worker = %thread_name, "UI worker exiting");
            })
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        let thread_id = handle.thread().id();
        info!(worker = name, "UI worker spawned");

        Ok(Self {
            inner: Arc::new(Inner {
                name: name.to_string(),
                tx: Mutex::new(Some(tx)),
                thread: Mutex::new(Some(handle)),
                thread_id,
            }),
        })
    }

    /// Worker name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue a task behind everything already posted
    pub fn post<F>(&self, task: F) -> Result<(), WorkerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Job::Run(Box::new(task)))
    }

    /// Block until every task posted before this call has run
    ///
    /// Returns immediately when called from the worker itself.
    pub fn flush(&self) -> Result<(), WorkerError> {
        if self.is_current() {
            return Ok(());
        }
        let (done_tx, done_rx) = bounded(1);
        self.send(Job::Flush(done_tx))?;
        done_rx
            .recv()
            .map_err(|_| WorkerError::Stopped(self.inner.name.clone()))
    }

    /// True when running on the worker thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// True until [`shutdown`](Self::shutdown) is called
    pub fn is_running(&self) -> bool {
        self.inner.tx.lock().is_some()
    }

    /// Stop accepting tasks, drain the queue and join the thread
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    fn send(&self, job: Job) -> Result<(), WorkerError> {
        let guard = self.inner.tx.lock();
        let tx = guard
            .as_ref()
            .ok_or_else(|| WorkerError::Stopped(self.inner.name.clone()))?;
        tx.send(job)
            .map_err(|_| WorkerError::Stopped(self.inner.name.clone()))
    }
}

impl Inner {
    fn shutdown(&self) {
        let Some(tx) = self.tx.lock().take() else {
            return;
        };
        drop(tx);

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            // Joining from the worker itself would deadlock
            if thread::current().id() == self.thread_id {
                return;
            }
            if handle.join().is_err() {
                error!(worker = %self.name, "UI worker thread panicked");
            }
        }
        info!(worker = %self.name, "UI worker stopped");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_tasks_run_in_post_order() {
        let worker = UiWorker::spawn("test-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let seen = Arc::clone(&seen);
            worker.post(move || seen.lock().push(i)).unwrap();
        }
        worker.flush().unwrap();

        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_tasks_run_on_worker_thread() {
        let worker = UiWorker::spawn("test-thread").unwrap();
        let on_worker = Arc::new(AtomicUsize::new(0));

        let handle = worker.clone();
        let flag = Arc::clone(&on_worker);
        worker
            .post(move || {
                if handle.is_current() {
                    flag.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        worker.flush().unwrap();

        assert_eq!(on_worker.load(Ordering::SeqCst), 1);
        assert!(!worker.is_current());
    }

    #[test]
    fn test_post_after_shutdown_fails() {
        let worker = UiWorker::spawn("test-shutdown").unwrap();
        worker.shutdown();

        assert!(!worker.is_running());
        assert_eq!(
            worker.post(|| {}),
            Err(WorkerError::Stopped("test-shutdown".to_string()))
        );
        assert!(worker.flush().is_err());
    }

    #[test]
    fn test_shutdown_drains_pending_tasks() {
        let worker = UiWorker::spawn("test-drain").unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let count = Arc::clone(&count);
            worker
                .post(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        worker.shutdown();

        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let worker = UiWorker::spawn("test-panic").unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        worker.post(|| panic!("boom")).unwrap();
        let after = Arc::clone(&count);
        worker
            .post(move || {
                after.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        worker.flush().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_flush_from_worker_returns_immediately() {
        let worker = UiWorker::spawn("test-reentrant").unwrap();
        let inner = worker.clone();
        let result = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&result);
        worker
            .post(move || {
                *slot.lock() = Some(inner.flush());
            })
            .unwrap();
        worker.flush().unwrap();

        assert_eq!(*result.lock(), Some(Ok(())));
    }
}
