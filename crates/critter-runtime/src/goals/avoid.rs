use critter_types::Action;
use tracing::debug;

use super::rotation::{RotationTracker, TurnDirection};
use super::{AvoidTieBreak, GoalContext, GoalError, GoalStatus, current_yaw};

#[derive(Debug, Clone, PartialEq)]
enum AvoidState {
    Moving,
    Turning(RotationTracker),
}

/// Roam forward and turn away from anything the ray fan hits.
///
/// A hit in the left half `[0, n/2)` turns right, a hit in the right half
/// `[n/2, n)` turns left. The goal never completes on its own; it runs until
/// it is cancelled.
#[derive(Debug, Clone)]
pub struct ObstacleAvoidance {
    rotation_deg: f32,
    tie_break: AvoidTieBreak,
    state: AvoidState,
    /// A forward command is in effect.
    advancing: bool,
}

impl ObstacleAvoidance {
    pub fn new(rotation_deg: f32, tie_break: AvoidTieBreak) -> Self {
        Self {
            rotation_deg,
            tie_break,
            state: AvoidState::Moving,
            advancing: false,
        }
    }

    fn pick_side(&self, left_hit: bool, right_hit: bool) -> Option<TurnDirection> {
        match (left_hit, right_hit) {
            (true, true) => Some(self.tie_break.direction()),
            (true, false) => Some(TurnDirection::Right),
            (false, true) => Some(TurnDirection::Left),
            (false, false) => None,
        }
    }

    pub fn step(&mut self, ctx: &mut GoalContext<'_>) -> Result<GoalStatus, GoalError> {
        let yaw = current_yaw(ctx)?;
        match &mut self.state {
            AvoidState::Moving => {
                let frame = ctx.percepts.frame();
                match self.pick_side(frame.left_half_hit(), frame.right_half_hit()) {
                    Some(direction) => {
                        debug!(?direction, "obstacle ahead, turning away");
                        if self.advancing {
                            ctx.actions.push(Action::Stop);
                            self.advancing = false;
                        }
                        ctx.actions.push(direction.command());
                        self.state = AvoidState::Turning(RotationTracker::start(
                            direction,
                            self.rotation_deg,
                            yaw,
                        ));
                    }
                    None if !self.advancing => {
                        ctx.actions.push(Action::Forward);
                        self.advancing = true;
                    }
                    None => {}
                }
            }
            AvoidState::Turning(tracker) => {
                if tracker.advance(yaw) {
                    ctx.actions.push(Action::StopTurn);
                    self.state = AvoidState::Moving;
                }
            }
        }
        Ok(GoalStatus::Running)
    }

    pub fn cancel(&mut self, ctx: &mut GoalContext<'_>) {
        if self.advancing {
            ctx.actions.push(Action::Stop);
        }
        ctx.actions.push(Action::StopTurn);
        self.state = AvoidState::Moving;
        self.advancing = false;
    }
}
