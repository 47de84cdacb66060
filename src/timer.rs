//! Owned, cancelable fixed-period timers.
//!
//! The session polls these from the UI thread; nothing runs on its own.
//! A stopped timer never fires, which is how the movement loop is shut down
//! when the connection closes.

use std::time::{Duration, Instant};

/// Most ticks a single poll reports after a stall. Past this the schedule
/// resynchronises to `now` instead of replaying the backlog.
pub const MAX_CATCH_UP_TICKS: u32 = 5;

#[derive(Debug, Clone)]
pub struct FixedTimer {
    period: Duration,
    next_due: Option<Instant>,
}

impl FixedTimer {
    pub const fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    /// Arm the timer; the first tick is one period from `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.period);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub const fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub const fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Number of ticks that elapsed up to `now`, advancing the schedule.
    pub fn fire(&mut self, now: Instant) -> u32 {
        let Some(mut due) = self.next_due else {
            return 0;
        };
        let mut ticks = 0;
        while due <= now {
            ticks += 1;
            due += self.period;
            if ticks == MAX_CATCH_UP_TICKS {
                if due <= now {
                    due = now + self.period;
                }
                break;
            }
        }
        self.next_due = Some(due);
        ticks
    }

    /// Fire at most once. Ticks missed during a stall are skipped and the
    /// next one lands a full period after `now`.
    pub fn fire_skipping(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if due > now {
            return false;
        }
        let next = due + self.period;
        self.next_due = Some(if next <= now { now + self.period } else { next });
        true
    }
}
