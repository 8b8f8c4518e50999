use std::time::{Duration, Instant};

use tracing::debug;

use super::{GoalContext, GoalStatus};

/// Do nothing for one idle interval, then succeed.
///
/// Also the fallback a faulted goal is replaced with.
#[derive(Debug, Clone)]
pub struct Idle {
    dwell: Duration,
    started: Option<Instant>,
}

impl Idle {
    pub fn new(dwell: Duration) -> Self {
        Self {
            dwell,
            started: None,
        }
    }

    pub fn step(&mut self, ctx: &mut GoalContext<'_>) -> GoalStatus {
        let started = *self.started.get_or_insert_with(|| {
            debug!("idling");
            ctx.now
        });
        if ctx.now.duration_since(started) >= self.dwell {
            self.started = None;
            GoalStatus::Success
        } else {
            GoalStatus::Running
        }
    }

    pub fn cancel(&mut self) {
        self.started = None;
    }
}
