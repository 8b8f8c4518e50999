//! Straight-line movement goals.

use critter_types::{Action, Vec3};
use rand::Rng;
use tracing::debug;

use super::{GoalContext, GoalError, GoalStatus};

/// How far a [`ForwardDistance`] run should go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distance {
    Fixed(f32),
    /// Drawn uniformly from `[min, max]` at the start of every run.
    Random { min: f32, max: f32 },
}

impl Distance {
    fn resolve(self, rng: &mut impl Rng) -> Result<f32, GoalError> {
        let target = match self {
            Distance::Fixed(d) => d,
            Distance::Random { min, max } if min <= max => rng.gen_range(min..=max),
            Distance::Random { min, max } => {
                return Err(GoalError::InvalidParameter(format!(
                    "distance range [{min}, {max}] is reversed"
                )));
            }
        };
        if target.is_finite() && target >= 0.0 {
            Ok(target)
        } else {
            Err(GoalError::InvalidParameter(format!(
                "distance {target} must be finite and non-negative"
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ForwardState {
    Stopped,
    Moving { start: Vec3, target: f32 },
}

/// Move forward until the body has covered a target displacement.
#[derive(Debug, Clone)]
pub struct ForwardDistance {
    distance: Distance,
    state: ForwardState,
}

impl ForwardDistance {
    pub fn new(distance: Distance) -> Self {
        Self {
            distance,
            state: ForwardState::Stopped,
        }
    }

    pub fn step(&mut self, ctx: &mut GoalContext<'_>) -> Result<GoalStatus, GoalError> {
        let position = ctx.percepts.state().position;
        if !position.is_finite() {
            return Err(GoalError::NonFinitePose);
        }
        match self.state {
            ForwardState::Stopped => {
                let target = self.distance.resolve(ctx.rng)?;
                debug!(target, "moving forward");
                ctx.actions.push(Action::Forward);
                self.state = ForwardState::Moving {
                    start: position,
                    target,
                };
                Ok(GoalStatus::Running)
            }
            ForwardState::Moving { start, target } => {
                if start.distance(&position) >= target {
                    ctx.actions.push(Action::Stop);
                    self.state = ForwardState::Stopped;
                    Ok(GoalStatus::Success)
                } else {
                    Ok(GoalStatus::Running)
                }
            }
        }
    }

    pub fn cancel(&mut self, ctx: &mut GoalContext<'_>) {
        ctx.actions.push(Action::Stop);
        self.state = ForwardState::Stopped;
    }
}

/// Move forward until any ray reports a hit.
#[derive(Debug, Clone, Default)]
pub struct ForwardStop {
    moving: bool,
}

impl ForwardStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, ctx: &mut GoalContext<'_>) -> GoalStatus {
        if !self.moving {
            ctx.actions.push(Action::Forward);
            self.moving = true;
            return GoalStatus::Running;
        }
        if ctx.percepts.frame().any_hit() {
            ctx.actions.push(Action::Stop);
            self.moving = false;
            GoalStatus::Success
        } else {
            GoalStatus::Running
        }
    }

    pub fn cancel(&mut self, ctx: &mut GoalContext<'_>) {
        if self.moving {
            ctx.actions.push(Action::Stop);
            self.moving = false;
        }
    }
}
