//! Paint throttle: at most one paint per `min_interval`. A request is
//! never dropped, only folded into the next paint.

use std::time::{Duration, Instant};

pub const DEFAULT_MIN_RENDER_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scheduled { due: Instant },
    Rendering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A new paint was scheduled for the given instant
    Scheduled(Instant),
    /// Folded into a paint that is already scheduled or running
    Coalesced,
}

#[derive(Debug, Clone)]
pub struct Debounce {
    min_interval: Duration,
    phase: Phase,
    last_completed: Option<Instant>,
    /// Set by a trigger that arrives while a paint is running
    pending: bool,
}

impl Debounce {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            phase: Phase::Idle,
            last_completed: None,
            pending: false,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn trigger(&mut self, now: Instant) -> Trigger {
        match self.phase {
            Phase::Idle => {
                let due = self
                    .last_completed
                    .map(|last| last + self.min_interval)
                    .filter(|due| *due > now)
                    .unwrap_or(now);
                self.phase = Phase::Scheduled { due };
                Trigger::Scheduled(due)
            }
            Phase::Scheduled { .. } => Trigger::Coalesced,
            Phase::Rendering => {
                self.pending = true;
                Trigger::Coalesced
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Scheduled { due } => Some(due),
            _ => None,
        }
    }

    /// Time left until the scheduled paint, zero if overdue
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.deadline()
            .map(|due| due.saturating_duration_since(now))
    }

    /// Enter `Rendering` if a paint is due. The caller must call
    /// [`Debounce::complete`] once the paint is done.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.phase {
            Phase::Scheduled { due } if now >= due => {
                self.phase = Phase::Rendering;
                true
            }
            _ => false,
        }
    }

    pub fn complete(&mut self, now: Instant) {
        if self.phase != Phase::Rendering {
            return;
        }
        self.phase = Phase::Idle;
        self.last_completed = Some(now);
        if std::mem::take(&mut self.pending) {
            self.trigger(now);
        }
    }
}
