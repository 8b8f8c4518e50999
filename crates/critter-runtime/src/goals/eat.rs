use std::time::{Duration, Instant};

use critter_types::Action;
use tracing::info;

use super::{GoalContext, GoalStatus};

/// Stop and eat for a dwell period, clearing hunger.
///
/// Fails immediately, without emitting anything, when the agent is not
/// hungry.
#[derive(Debug, Clone)]
pub struct EatFlower {
    dwell: Duration,
    started: Option<Instant>,
}

impl EatFlower {
    pub fn new(dwell: Duration) -> Self {
        Self {
            dwell,
            started: None,
        }
    }

    pub fn step(&mut self, ctx: &mut GoalContext<'_>) -> GoalStatus {
        let started = match self.started {
            Some(t) => t,
            None => {
                if !ctx.blackboard.hungry {
                    return GoalStatus::Failure;
                }
                info!("eating flower");
                ctx.actions.push(Action::Stop);
                self.started = Some(ctx.now);
                ctx.now
            }
        };
        if ctx.now.duration_since(started) >= self.dwell {
            ctx.blackboard.feed(ctx.now);
            self.started = None;
            info!("finished eating");
            GoalStatus::Success
        } else {
            GoalStatus::Running
        }
    }

    pub fn cancel(&mut self) {
        self.started = None;
    }
}
