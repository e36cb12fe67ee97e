//! 通用的提取循环
//!
//! 作业控制器和任务控制器共用同一个循环：检查并发上限，
//! 从持久化队列取ID，为每个ID启动独立的工作协程。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, error, info};

use crate::config::ControllerConfig;
use crate::traits::WorkQueue;

/// 处理单个工作单元
///
/// 实现方负责单元的完整生命周期，包括最终状态的写入，
/// 因此 `handle` 不返回错误。
#[async_trait]
pub trait UnitHandler: Send + Sync + 'static {
    /// 用于日志和指标的单元类型，例如 "job"、"task"
    fn kind(&self) -> &'static str;

    async fn handle(&self, id: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub max_workers: usize,
    pub busy_backoff: Duration,
    pub dequeue_backoff: Duration,
}

impl From<&ControllerConfig> for ControllerSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            busy_backoff: config.busy_backoff(),
            dequeue_backoff: config.dequeue_backoff(),
        }
    }
}

pub struct Controller<H: UnitHandler> {
    handler: Arc<H>,
    queue: Arc<dyn WorkQueue>,
    permits: Arc<Semaphore>,
    settings: ControllerSettings,
}

impl<H: UnitHandler> Controller<H> {
    pub fn new(handler: Arc<H>, queue: Arc<dyn WorkQueue>, settings: ControllerSettings) -> Self {
        Self {
            handler,
            queue,
            permits: Arc::new(Semaphore::new(settings.max_workers)),
            settings,
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// 正在处理的单元数量
    pub fn in_flight(&self) -> usize {
        self.settings
            .max_workers
            .saturating_sub(self.permits.available_permits())
    }

    /// 运行提取循环，直到收到关闭信号
    pub async fn serve(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let kind = self.handler.kind();
        info!(
            kind,
            queue = self.queue.name(),
            max_workers = self.settings.max_workers,
            "controller started"
        );

        loop {
            let permit = match Arc::clone(&self.permits).try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::NoPermits) => {
                    debug!(kind, in_flight = self.in_flight(), "controller busy, backing off");
                    if pause(self.settings.busy_backoff, &mut shutdown_rx).await {
                        break;
                    }
                    continue;
                }
                Err(TryAcquireError::Closed) => break,
            };

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                dequeued = self.queue.dequeue() => match dequeued {
                    Ok(id) => self.dispatch(id, permit),
                    Err(e) => {
                        drop(permit);
                        error!(kind, error = %e, "failed to dequeue");
                        metrics::counter!("pitrix_dequeue_errors_total", "kind" => kind)
                            .increment(1);
                        if pause(self.settings.dequeue_backoff, &mut shutdown_rx).await {
                            break;
                        }
                    }
                },
            }
        }

        info!(kind, in_flight = self.in_flight(), "controller stopped");
    }

    /// 等待在途单元全部结束，超过 `grace` 返回 false
    pub async fn drain(&self, grace: Duration) -> bool {
        let all = u32::try_from(self.settings.max_workers).unwrap_or(u32::MAX);
        match tokio::time::timeout(grace, self.permits.acquire_many(all)).await {
            Ok(Ok(_permits)) => true,
            _ => false,
        }
    }

    fn dispatch(&self, id: String, permit: OwnedSemaphorePermit) {
        let kind = self.handler.kind();
        let handler = Arc::clone(&self.handler);
        let permits = Arc::clone(&self.permits);
        let max_workers = self.settings.max_workers;

        report_in_flight(kind, max_workers, &permits);
        debug!(kind, id = %id, "unit dispatched");

        tokio::spawn(async move {
            handler.handle(id).await;
            drop(permit);
            report_in_flight(kind, max_workers, &permits);
        });
    }
}

fn report_in_flight(kind: &'static str, max_workers: usize, permits: &Semaphore) {
    let in_flight = max_workers.saturating_sub(permits.available_permits());
    metrics::gauge!("pitrix_controller_in_flight", "kind" => kind).set(in_flight as f64);
}

/// 休眠一段时间，期间收到关闭信号返回 true
async fn pause(duration: Duration, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown_rx.recv() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PitrixError, PitrixResult};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct VecQueue {
        items: Mutex<VecDeque<String>>,
        notify: Notify,
        failures: AtomicUsize,
    }

    impl VecQueue {
        fn with_items(n: usize) -> Self {
            Self {
                items: Mutex::new((0..n).map(|i| format!("u-{i}")).collect()),
                notify: Notify::new(),
                failures: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl WorkQueue for VecQueue {
        fn name(&self) -> &str {
            "test"
        }

        async fn enqueue(&self, id: &str) -> PitrixResult<()> {
            self.items.lock().unwrap().push_back(id.to_string());
            self.notify.notify_one();
            Ok(())
        }

        async fn dequeue(&self) -> PitrixResult<String> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(PitrixError::queue_error("connection lost"));
            }
            loop {
                let next = self.items.lock().unwrap().pop_front();
                if let Some(id) = next {
                    return Ok(id);
                }
                self.notify.notified().await;
            }
        }
    }

    struct SlowHandler {
        running: AtomicUsize,
        peak: AtomicUsize,
        done: AtomicUsize,
    }

    impl SlowHandler {
        fn new() -> Self {
            Self {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                done: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UnitHandler for SlowHandler {
        fn kind(&self) -> &'static str {
            "test"
        }

        async fn handle(&self, _id: String) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn settings(max_workers: usize) -> ControllerSettings {
        ControllerSettings {
            max_workers,
            busy_backoff: Duration::from_millis(5),
            dequeue_backoff: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_ceiling() {
        let handler = Arc::new(SlowHandler::new());
        let queue = Arc::new(VecQueue::with_items(12));
        let controller = Arc::new(Controller::new(handler.clone(), queue, settings(3)));
        let (tx, rx) = broadcast::channel(1);

        let runner = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.serve(rx).await })
        };

        for _ in 0..200 {
            if handler.done.load(Ordering::SeqCst) == 12 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tx.send(()).unwrap();
        runner.await.unwrap();

        assert_eq!(handler.done.load(Ordering::SeqCst), 12);
        assert!(handler.peak.load(Ordering::SeqCst) <= 3);
        assert!(controller.drain(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_dequeue_errors_back_off_and_recover() {
        let handler = Arc::new(SlowHandler::new());
        let queue = Arc::new(VecQueue::with_items(2));
        queue.failures.store(3, Ordering::SeqCst);
        let controller = Arc::new(Controller::new(handler.clone(), queue.clone(), settings(4)));
        let (tx, rx) = broadcast::channel(1);

        let runner = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.serve(rx).await })
        };

        for _ in 0..200 {
            if handler.done.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(()).unwrap();
        runner.await.unwrap();

        assert_eq!(queue.failures.load(Ordering::SeqCst), 0);
        assert_eq!(handler.done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_on_empty_queue() {
        let handler = Arc::new(SlowHandler::new());
        let queue = Arc::new(VecQueue::with_items(0));
        let controller = Controller::new(handler, queue, settings(1));
        let (tx, rx) = broadcast::channel(1);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(()).unwrap();
        });

        tokio::time::timeout(Duration::from_secs(1), controller.serve(rx))
            .await
            .expect("controller should stop on shutdown");
        stopper.await.unwrap();
    }
}
