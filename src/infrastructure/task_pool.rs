//! Bounded pool of async workers.
//!
//! Every worker drains its own lane. Jobs submitted with the same key land
//! on the same lane and run in submission order; unkeyed jobs are spread
//! round-robin. Submission never blocks: when a lane is full the job is
//! dropped and counted. A panicking job is logged and does not take its
//! worker down.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

struct Job {
    label: &'static str,
    future: BoxFuture<'static, ()>,
}

#[derive(Default)]
struct PoolCounters {
    rejected: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Fixed set of tokio workers, each fed by a bounded queue.
///
/// Must be created inside a Tokio runtime.
pub struct TaskPool {
    lanes: Vec<mpsc::Sender<Job>>,
    next_lane: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<PoolCounters>,
}

impl TaskPool {
    /// `queue_capacity` is shared out evenly between the lanes.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let lane_capacity = queue_capacity.div_ceil(worker_count).max(1);
        let counters = Arc::new(PoolCounters::default());

        let (lanes, workers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|worker| {
                let (sender, mut receiver) = mpsc::channel::<Job>(lane_capacity);
                let counters = Arc::clone(&counters);
                let handle = tokio::spawn(async move {
                    while let Some(job) = receiver.recv().await {
                        match AssertUnwindSafe(job.future).catch_unwind().await {
                            Ok(()) => {
                                counters.completed.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(_) => {
                                counters.panicked.fetch_add(1, Ordering::Relaxed);
                                error!(worker, task = job.label, "Task panicked");
                            }
                        }
                    }
                    debug!(worker, "Task queue closed, worker exiting");
                });
                (sender, handle)
            })
            .unzip();

        Self {
            lanes,
            next_lane: AtomicUsize::new(0),
            workers: Mutex::new(workers),
            counters,
        }
    }

    /// Queue `future` on the next lane. Returns `false` if it was rejected.
    pub fn execute<F>(&self, label: &'static str, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let lane = self.next_lane.fetch_add(1, Ordering::Relaxed);
        self.submit(lane, label, future.boxed())
    }

    /// Queue `future` behind every earlier job submitted with `key`.
    pub fn execute_keyed<F>(&self, key: u64, label: &'static str, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let lane = (key % self.lanes.len() as u64) as usize;
        self.submit(lane, label, future.boxed())
    }

    fn submit(&self, lane: usize, label: &'static str, future: BoxFuture<'static, ()>) -> bool {
        let job = Job { label, future };
        match self.lanes[lane % self.lanes.len()].try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(task = label, lane, "Task queue full, job rejected");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(task = label, "Task pool stopped, job rejected");
                false
            }
        }
    }

    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.counters.rejected.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panicked(&self) -> u64 {
        self.counters.panicked.load(Ordering::Relaxed)
    }

    /// Whether every worker has exited and the lanes are closed.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.lanes.iter().all(|lane| lane.is_closed())
    }

    /// Stop every worker. Queued jobs are dropped.
    pub fn shutdown(&self) {
        for worker in self.workers.lock().drain(..) {
            worker.abort();
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::wait_until;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn runs_submitted_jobs() {
        let pool = TaskPool::new(2, 16);
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let hits = Arc::clone(&hits);
            assert!(pool.execute("count", async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        wait_until(Duration::from_secs(1), || hits.load(Ordering::SeqCst) == 10).await;
        wait_until(Duration::from_secs(1), || pool.completed() == 10).await;
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let pool = TaskPool::new(1, 1);
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        assert!(pool.execute("block", async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
        }));
        started_rx.await.unwrap();

        assert!(pool.execute("queued", async {}));
        assert!(!pool.execute("overflow", async {}));
        assert_eq!(pool.rejected(), 1);

        release_tx.send(()).unwrap();
        wait_until(Duration::from_secs(1), || pool.completed() == 2).await;
    }

    #[tokio::test]
    async fn panicking_job_does_not_kill_worker() {
        let pool = TaskPool::new(1, 4);
        assert!(pool.execute("boom", async { panic!("boom") }));
        let (tx, rx) = oneshot::channel();
        assert!(pool.execute("after", async move {
            let _ = tx.send(());
        }));
        rx.await.unwrap();
        assert_eq!(pool.panicked(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn keyed_jobs_run_in_submission_order() {
        let pool = TaskPool::new(4, 64);
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..20u32 {
            let order = Arc::clone(&order);
            assert!(pool.execute_keyed(7, "ordered", async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                order.lock().push(n);
            }));
        }
        wait_until(Duration::from_secs(2), || order.lock().len() == 20).await;
        assert_eq!(*order.lock(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn shutdown_rejects_new_jobs() {
        let pool = TaskPool::new(1, 4);
        pool.shutdown();
        wait_until(Duration::from_secs(1), || pool.is_stopped()).await;
        assert!(!pool.execute("late", async {}));
    }
}
