use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Cooperative fixed-interval loop: run one cycle immediately, then sleep
/// until the next tick. The stop signal is observed between cycles, never
/// mid-cycle; callers signal it with `Notify::notify_one` so a signal that
/// arrives while a cycle is in flight is not lost.
pub struct Scheduler {
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub async fn run<F, Fut>(&self, mut cycle: F, shutdown: Arc<Notify>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            cycle().await;

            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!("stop signal observed; leaving scheduling loop");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
