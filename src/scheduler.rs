//! Periodic sweep of the deferred deletion queue.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::deletion::{DeletionQueue, Tick};
use crate::gateway::MessagingGateway;
use crate::types::MessageHandle;

/// What happened to the handles of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: usize,
    pub already_gone: usize,
    pub failed: usize,
}

pub struct CleanupScheduler {
    queue: Arc<DeletionQueue>,
    gateway: Arc<dyn MessagingGateway>,
    run_interval: Duration,
}

impl CleanupScheduler {
    pub fn new(
        queue: Arc<DeletionQueue>,
        gateway: Arc<dyn MessagingGateway>,
        run_interval: Duration,
    ) -> Self {
        CleanupScheduler {
            queue,
            gateway,
            run_interval,
        }
    }

    /// Ticks the queue and sweeps whatever became due.
    ///
    /// Returns `None` when nothing was due.
    pub async fn run_once(&self) -> Option<SweepReport> {
        match self.queue.tick() {
            Tick::Due(batch) => Some(self.sweep(batch).await),
            Tick::NotYetDue | Tick::Idle => None,
        }
    }

    async fn sweep(&self, batch: Vec<MessageHandle>) -> SweepReport {
        let mut report = SweepReport::default();
        for handle in batch {
            match self.gateway.delete_message(handle).await {
                Ok(()) => report.deleted += 1,
                Err(e) if e.is_already_gone() => {
                    debug!("Message {:?} was already deleted", handle);
                    report.already_gone += 1;
                }
                Err(e) => {
                    warn!("Failed to delete message {:?}: {}", handle, e);
                    report.failed += 1;
                }
            }
        }
        info!(
            "Swept welcome messages: {} deleted, {} already gone, {} failed",
            report.deleted, report.already_gone, report.failed
        );
        report
    }

    pub async fn run(&self, shutdown_token: CancellationToken) {
        let mut interval = interval_at(Instant::now() + self.run_interval, self.run_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_token.cancelled() => {
                    trace!("CleanupScheduler: received shutdown");
                    break;
                }
                _ = interval.tick() => {}
            }
            self.run_once().await;
        }
        if !self.queue.is_empty() {
            info!(
                "Dropping {} pending deletions on shutdown",
                self.queue.len()
            );
        }
        debug!("CleanupScheduler: Exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;

    fn handle(message_id: i64) -> MessageHandle {
        MessageHandle {
            chat_id: -1,
            message_id,
        }
    }

    fn scheduler(debounce: u32) -> (CleanupScheduler, Arc<DeletionQueue>, Arc<FakeGateway>) {
        let queue = Arc::new(DeletionQueue::new(debounce));
        let gateway = Arc::new(FakeGateway::default());
        let scheduler = CleanupScheduler::new(
            Arc::clone(&queue),
            gateway.clone(),
            Duration::from_secs(60),
        );
        (scheduler, queue, gateway)
    }

    #[tokio::test]
    async fn test_sweep_only_after_quiet_period() {
        let (scheduler, queue, gateway) = scheduler(2);
        queue.enqueue(handle(1));
        assert_eq!(scheduler.run_once().await, None);
        queue.enqueue(handle(2));
        assert_eq!(scheduler.run_once().await, None);
        queue.enqueue(handle(3));
        assert_eq!(scheduler.run_once().await, None);
        assert_eq!(scheduler.run_once().await, None);
        assert!(gateway.deleted().await.is_empty());

        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.deleted, 3);
        assert_eq!(gateway.deleted().await, vec![handle(1), handle(2), handle(3)]);
        assert_eq!(scheduler.run_once().await, None);
    }

    #[tokio::test]
    async fn test_already_gone_does_not_abort_batch() {
        let (scheduler, queue, gateway) = scheduler(0);
        gateway.gone.lock().await.insert(2);
        for id in 1..=3 {
            queue.enqueue(handle(id));
        }

        let report = scheduler.run_once().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                deleted: 2,
                already_gone: 1,
                failed: 0
            }
        );
        assert_eq!(gateway.deleted().await, vec![handle(1), handle(2), handle(3)]);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let (scheduler, queue, gateway) = scheduler(0);
        gateway.broken.lock().await.insert(1);
        queue.enqueue(handle(1));
        queue.enqueue(handle(2));

        let report = scheduler.run_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.deleted, 1);
        assert!(queue.is_empty());
        assert_eq!(scheduler.run_once().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_on_interval() {
        let (scheduler, queue, gateway) = scheduler(1);
        let scheduler = Arc::new(scheduler);
        let token = CancellationToken::new();
        queue.enqueue(handle(5));

        let task = {
            let scheduler = Arc::clone(&scheduler);
            let token = token.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        };

        // First tick decrements, second tick flushes.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(gateway.deleted().await.is_empty());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(gateway.deleted().await, vec![handle(5)]);

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_immediate_and_drops_pending() {
        let (scheduler, queue, gateway) = scheduler(2);
        queue.enqueue(handle(9));
        let token = CancellationToken::new();
        let task = tokio::spawn({
            let token = token.clone();
            async move { scheduler.run(token).await }
        });

        token.cancel();
        let started = Instant::now();
        task.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(gateway.deleted().await.is_empty());
        assert_eq!(queue.len(), 1);
    }
}
