//! Fixed-size worker pool over a bounded job queue.
//!
//! A feeder task pushes jobs into the queue, `size` workers share the receiving
//! end, and every result goes to one bounded result channel that the caller
//! drains. Cancellation is checked before each dequeue; a job already being
//! worked on runs to completion.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct WorkerPool {
    name:   &'static str,
    size:   usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(name: &'static str, size: usize, cancel: CancellationToken) -> Self {
        Self { name, size: size.max(1), cancel }
    }

    /// Spawns feeder and workers; the returned receiver closes once every
    /// worker has exited. Jobs are pulled from `jobs` only as queue space frees up.
    pub fn run<I, J, R, F, Fut>(&self, jobs: I, work: F) -> mpsc::Receiver<R>
    where
        I: IntoIterator<Item = J>,
        I::IntoIter: Send + 'static,
        J: Send + 'static,
        R: Send + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let capacity = self.size * 2;
        let (job_tx, job_rx) = mpsc::channel::<J>(capacity);
        let (res_tx, res_rx) = mpsc::channel::<R>(capacity);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let work = Arc::new(work);

        let feeder_cancel = self.cancel.clone();
        let jobs = jobs.into_iter();
        tokio::spawn(async move {
            for job in jobs {
                tokio::select! {
                    _ = feeder_cancel.cancelled() => break,
                    sent = job_tx.send(job) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        for worker in 0..self.size {
            let name = self.name;
            let cancel = self.cancel.clone();
            let job_rx = Arc::clone(&job_rx);
            let res_tx = res_tx.clone();
            let work = Arc::clone(&work);

            tokio::spawn(async move {
                let mut done = 0usize;
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let job = {
                        let mut rx = job_rx.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => None,
                            job = rx.recv() => job,
                        }
                    };
                    let Some(job) = job else { break };

                    let result = work(job).await;
                    done += 1;
                    if res_tx.send(result).await.is_err() {
                        break;
                    }
                }
                debug!("{} worker {} exiting after {} jobs", name, worker, done);
            });
        }

        res_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn drains_every_job() {
        let pool = WorkerPool::new("test", 3, CancellationToken::new());
        let mut rx = pool.run((1..=20).collect::<Vec<u32>>(), |n| async move { n * 2 });

        let mut got = Vec::new();
        while let Some(v) = rx.recv().await {
            got.push(v);
        }
        got.sort_unstable();
        assert_eq!(got, (1..=20).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new("bounded", 2, CancellationToken::new());

        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let mut rx = pool.run((0..10).collect::<Vec<u32>>(), move |_| {
            let (a, p) = (Arc::clone(&a), Arc::clone(&p));
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                a.fetch_sub(1, Ordering::SeqCst);
            }
        });
        let mut n = 0;
        while rx.recv().await.is_some() {
            n += 1;
        }
        assert_eq!(n, 10);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancelled_pool_stops_dequeuing() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::new("cancel", 1, cancel.clone());
        let started = Arc::new(AtomicUsize::new(0));

        let s = Arc::clone(&started);
        let c = cancel.clone();
        let mut rx = pool.run((0..100).collect::<Vec<u32>>(), move |n| {
            let s = Arc::clone(&s);
            let c = c.clone();
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                if n == 2 {
                    c.cancel();
                }
                n
            }
        });

        let mut results = Vec::new();
        while let Some(v) = rx.recv().await {
            results.push(v);
        }
        // the in-flight job finishes, nothing after it is taken
        assert_eq!(results, vec![0, 1, 2]);
        assert_eq!(started.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn jobs_are_pulled_lazily() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::new("lazy", 1, cancel.clone());
        let pulled = Arc::new(AtomicUsize::new(0));

        let p = Arc::clone(&pulled);
        let ids = (0..u64::MAX).inspect(move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });
        let c = cancel.clone();
        let mut rx = pool.run(ids, move |n| {
            let c = c.clone();
            async move {
                if n == 4 {
                    c.cancel();
                }
                n
            }
        });

        let mut n = 0;
        while rx.recv().await.is_some() {
            n += 1;
        }
        assert_eq!(n, 5);
        // bounded queue: at most the in-flight job plus a queue's worth ahead of it
        assert!(pulled.load(Ordering::SeqCst) <= 5 + 2 + 1);
    }
}
