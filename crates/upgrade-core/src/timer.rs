//! Status refresh timer
//!
//! One recurring timer per workflow. Starting it while it runs stops the
//! running one first; dropping it stops it.

use crate::workflow::WorkflowEvent;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Start/stop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    pub starts: u64,
    pub stops: u64,
}

impl TimerStats {
    /// Every start was matched by exactly one stop
    #[inline]
    #[must_use]
    pub fn balanced(&self) -> bool {
        self.starts == self.stops
    }
}

#[derive(Debug)]
pub struct RefreshTimer {
    period: Duration,
    handle: Option<JoinHandle<()>>,
    stats: TimerStats,
}

impl RefreshTimer {
    #[inline]
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
            stats: TimerStats::default(),
        }
    }

    /// Send a [`WorkflowEvent::Tick`] every period, first one after one period
    pub fn start(&mut self, events: UnboundedSender<WorkflowEvent>) {
        self.stop();

        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                trace!("Refresh tick");
                if events.send(WorkflowEvent::Tick).is_err() {
                    break;
                }
            }
        }));
        self.stats.starts += 1;
        debug!(?period, "Refresh timer started");
    }

    /// Stop the timer if it runs; a no-op otherwise
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            self.stats.stops += 1;
            debug!("Refresh timer stopped");
        }
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> TimerStats {
        self.stats
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
