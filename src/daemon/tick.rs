//! Interval trigger
//!
//! Requests a loop on a fixed cadence. A request that lands while a loop is
//! running is rejected by the state manager and simply counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::LoopRequest;

/// Counters kept by the interval trigger
#[derive(Debug, Default)]
pub struct TickStats {
    pub ticks: AtomicU64,
    pub started: AtomicU64,
    pub rejected: AtomicU64,
}

impl TickStats {
    fn record(&self, request: &LoopRequest) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        match request {
            LoopRequest::Started(_) => self.started.fetch_add(1, Ordering::Relaxed),
            LoopRequest::AlreadyRunning => self.rejected.fetch_add(1, Ordering::Relaxed),
            LoopRequest::Failed(_) => 0,
        };
    }
}

/// Spawn a task that calls `trigger` every `every`, starting one period from now
pub fn spawn_interval<F>(every: Duration, stats: Arc<TickStats>, trigger: F) -> JoinHandle<()>
where
    F: Fn() -> LoopRequest + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let request = trigger();
            match &request {
                LoopRequest::Started(id) => log::info!("Timer started loop {}", id),
                LoopRequest::AlreadyRunning => log::debug!("Timer tick skipped, loop already running"),
                LoopRequest::Failed(e) => log::error!("Timer failed to start loop: {}", e),
            }
            stats.record(&request);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::LoopId;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn test_interval_triggers_and_counts() {
        let stats = Arc::new(TickStats::default());
        let busy = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&busy);
        let handle = spawn_interval(Duration::from_millis(20), Arc::clone(&stats), move || {
            if flag.swap(true, Ordering::SeqCst) {
                LoopRequest::AlreadyRunning
            } else {
                LoopRequest::Started(LoopId(1))
            }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert!(stats.ticks.load(Ordering::Relaxed) >= 2);
        assert_eq!(stats.started.load(Ordering::Relaxed), 1);
        assert!(stats.rejected.load(Ordering::Relaxed) >= 1);
    }
}
