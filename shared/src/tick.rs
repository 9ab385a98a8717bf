use crate::MAX_CATCHUP_TICKS;
use std::time::{Duration, Instant};

/// Result of asking the clock how many ticks are owed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBatch {
    pub ticks: u32,
    /// Set when the backlog exceeded the catch-up cap and the remainder
    /// was abandoned by re-basing the clock on the present.
    pub dropped_backlog: bool,
}

/// Fixed-timestep clock. Simulated time lags wall time and catches up in
/// whole tick intervals, so tick length never varies. After a long stall
/// the clock refuses to replay more than [`MAX_CATCHUP_TICKS`] at once
/// and re-bases instead, trading a visible time skip for a responsive
/// process.
#[derive(Debug)]
pub struct TickClock {
    interval: Duration,
    simulated: Instant,
    max_catchup: u32,
}

impl TickClock {
    pub fn new(rate_hz: u32, now: Instant) -> Self {
        TickClock {
            interval: Duration::from_nanos(1_000_000_000 / u64::from(rate_hz.max(1))),
            simulated: now,
            max_catchup: MAX_CATCHUP_TICKS,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Advances simulated time toward `now` and returns how many ticks
    /// to run.
    pub fn due(&mut self, now: Instant) -> TickBatch {
        let mut ticks = 0;
        while now.saturating_duration_since(self.simulated) >= self.interval
            && ticks < self.max_catchup
        {
            self.simulated += self.interval;
            ticks += 1;
        }

        let mut dropped_backlog = false;
        if now.saturating_duration_since(self.simulated) >= self.interval {
            self.simulated = now;
            dropped_backlog = true;
        }

        TickBatch {
            ticks,
            dropped_backlog,
        }
    }
}
