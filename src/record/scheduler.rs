use std::time::Duration;

use async_trait::async_trait;

/// Paces the recording loop.
#[async_trait]
pub trait TickScheduler: Send {
    /// Resolve when the next tick is due.
    async fn next_tick(&mut self);
    /// Wait after the last tick before the container is finalized.
    async fn grace(&mut self, delay: Duration);
}

/// Wall-clock pacing at a fixed frame rate.
pub struct IntervalScheduler {
    interval: tokio::time::Interval,
}

impl IntervalScheduler {
    pub fn new(fps: u32) -> Self {
        let period = Duration::from_secs(1) / fps.max(1);
        let mut interval = tokio::time::interval(period);
        // A slow frame should not cause a burst of catch-up ticks.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl TickScheduler for IntervalScheduler {
    async fn next_tick(&mut self) {
        self.interval.tick().await;
    }

    async fn grace(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Runs ticks back to back; counts what it was asked to do.
#[derive(Debug, Default)]
pub struct ImmediateScheduler {
    pub ticks: u64,
    pub graces: Vec<Duration>,
}

#[async_trait]
impl TickScheduler for ImmediateScheduler {
    async fn next_tick(&mut self) {
        self.ticks += 1;
        tokio::task::yield_now().await;
    }

    async fn grace(&mut self, delay: Duration) {
        self.graces.push(delay);
    }
}
