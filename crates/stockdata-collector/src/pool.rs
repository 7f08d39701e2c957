//! 고정 크기 워커 풀.
//!
//! K개의 워커 태스크가 하나의 큐를 공유합니다. 모든 워커가 바쁘면 새 작업은
//! 큐에서 대기하므로 동시에 실행되는 수집 작업은 최대 K개입니다.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{CollectorError, Result};

type Job = BoxFuture<'static, ()>;

#[derive(Debug, Default)]
struct PoolCounters {
    queued: AtomicUsize,
    active: AtomicUsize,
}

/// 고정 크기 워커 풀.
pub struct WorkerPool {
    size: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// 워커 `size`개를 시작합니다 (최소 1개). tokio 런타임 안에서 호출해야 합니다.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());

        let workers = (0..size)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let counters = counters.clone();
                tokio::spawn(async move {
                    loop {
                        let job = {
                            let mut receiver = receiver.lock().await;
                            receiver.recv().await
                        };
                        let Some(job) = job else {
                            break;
                        };

                        counters.queued.fetch_sub(1, Ordering::AcqRel);
                        counters.active.fetch_add(1, Ordering::AcqRel);
                        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                            tracing::error!(worker = worker_id, "작업 실행 중 패닉 발생");
                        }
                        counters.active.fetch_sub(1, Ordering::AcqRel);
                    }
                    tracing::debug!(worker = worker_id, "워커 종료");
                })
            })
            .collect();

        tracing::info!(workers = size, "워커 풀 시작");

        Self {
            size,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 대기 중인 작업 수.
    pub fn queued(&self) -> usize {
        self.counters.queued.load(Ordering::Acquire)
    }

    /// 실행 중인 작업 수.
    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::Acquire)
    }

    /// 작업을 큐에 넣습니다. 종료된 풀에는 넣을 수 없습니다.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sender = guard
            .as_ref()
            .ok_or_else(|| CollectorError::Scheduler("워커 풀이 종료되었습니다".into()))?;

        self.counters.queued.fetch_add(1, Ordering::AcqRel);
        if sender.send(job.boxed()).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(CollectorError::Scheduler("워커 풀이 종료되었습니다".into()));
        }

        tracing::debug!(
            queued = self.queued(),
            active = self.active(),
            "작업 대기열 추가"
        );
        Ok(())
    }

    /// 작업을 큐에 넣고 결과를 받을 수 있는 수신자를 반환합니다.
    pub fn submit_with_result<F, T>(&self, job: F) -> Result<oneshot::Receiver<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(async move {
            let _ = tx.send(job.await);
        })?;
        Ok(rx)
    }

    /// 새 작업을 거부하고, 대기/실행 중인 작업이 끝날 때까지 최대 `timeout`만큼 기다립니다.
    ///
    /// 시간 안에 모두 끝나면 `true`. 시간을 넘기면 남은 워커를 중단하고 `false`를 반환합니다.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        // 송신자를 버리면 워커는 남은 작업을 처리한 뒤 종료합니다.
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        let workers = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        if workers.is_empty() {
            return true;
        }

        tracing::info!(
            queued = self.queued(),
            active = self.active(),
            timeout_secs = timeout.as_secs(),
            "워커 풀 종료 대기"
        );

        let aborts: Vec<_> = workers.iter().map(|w| w.abort_handle()).collect();
        match tokio::time::timeout(timeout, join_all(workers)).await {
            Ok(_) => {
                tracing::info!("워커 풀 종료 완료");
                true
            }
            Err(_) => {
                tracing::warn!(
                    queued = self.queued(),
                    active = self.active(),
                    "종료 대기 시간 초과, 남은 작업 중단"
                );
                for abort in aborts {
                    abort.abort();
                }
                false
            }
        }
    }

    /// 종료 여부.
    pub fn is_closed(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_size() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut receivers = Vec::new();
        for _ in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            receivers.push(
                pool.submit_with_result(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }

        for rx in receivers {
            rx.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_queue() {
        let pool = WorkerPool::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert!(pool.is_closed());
        assert!(pool.submit(async {}).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_timeout() {
        let pool = WorkerPool::new(1);
        pool.submit(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
        .unwrap();

        assert!(!pool.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1);
        pool.submit(async { panic!("boom") }).unwrap();

        let rx = pool.submit_with_result(async { 7 }).unwrap();
        assert_eq!(rx.await.unwrap(), 7);
    }
}
