use critter_types::Action;
use tracing::debug;

use super::rotation::{RotationTracker, TurnDirection};
use super::{GoalContext, GoalError, GoalStatus, LostTargetPolicy, current_yaw};

/// Tag carried by rays that see the astronaut.
pub const ASTRONAUT: &str = "Astronaut";

#[derive(Debug, Clone, PartialEq)]
enum FollowState {
    Moving,
    Turning(RotationTracker),
}

/// Steer towards the ray that last saw the astronaut.
///
/// The turn angle is proportional to the ray's offset from the centre of the
/// fan: `|centre - index| * max_angle / centre`. Ray `centre` itself means
/// straight ahead. Every frame that still shows the astronaut moves the
/// blackboard's detection index to the leftmost ray seeing it; a frame
/// without it leaves the index alone. The goal keeps following until the agent gets hungry
/// during the run, at which point it stops and fails so the caller can move
/// on to feeding.
#[derive(Debug, Clone)]
pub struct FollowAstronaut {
    max_angle: f32,
    lost_target: LostTargetPolicy,
    state: FollowState,
    advancing: bool,
    /// Hunger as it was on the first step of the current run.
    hungry_at_entry: Option<bool>,
}

impl FollowAstronaut {
    pub fn new(max_angle: f32, lost_target: LostTargetPolicy) -> Self {
        Self {
            max_angle,
            lost_target,
            state: FollowState::Moving,
            advancing: false,
            hungry_at_entry: None,
        }
    }

    /// Direction and size of the correction needed to face ray `index`.
    pub fn correction(&self, index: usize, center: usize) -> Option<(TurnDirection, f32)> {
        if center == 0 || index == center {
            return None;
        }
        let offset = index.abs_diff(center) as f32;
        let angle = offset * self.max_angle / center as f32;
        let direction = if index < center {
            TurnDirection::Left
        } else {
            TurnDirection::Right
        };
        Some((direction, angle))
    }

    pub fn step(&mut self, ctx: &mut GoalContext<'_>) -> Result<GoalStatus, GoalError> {
        let was_hungry = *self.hungry_at_entry.get_or_insert(ctx.blackboard.hungry);
        if ctx.blackboard.hungry && !was_hungry {
            debug!("hunger set in, leaving astronaut");
            self.halt(ctx);
            return Ok(GoalStatus::Failure);
        }

        let yaw = current_yaw(ctx)?;
        if let FollowState::Turning(tracker) = &mut self.state {
            if tracker.advance(yaw) {
                ctx.actions.push(Action::StopTurn);
                self.state = FollowState::Moving;
            }
            return Ok(GoalStatus::Running);
        }

        let frame = ctx.percepts.frame();
        if let Some(seen) = frame.first_tagged(ASTRONAUT) {
            ctx.blackboard.detection_index = Some(seen);
        }
        let index = ctx.blackboard.detection_index.ok_or(GoalError::NoDetection)?;
        let ray = frame.ray(index).ok_or(GoalError::RayOutOfRange {
            index,
            len: frame.len(),
        })?;

        if ray.has_tag(ASTRONAUT) {
            match self.correction(index, frame.center_index()) {
                Some((direction, angle)) => {
                    debug!(index, ?direction, angle, "steering towards astronaut");
                    ctx.actions.push(direction.command());
                    self.state = FollowState::Turning(RotationTracker::start(direction, angle, yaw));
                }
                None => self.advance(ctx),
            }
        } else {
            match self.lost_target {
                LostTargetPolicy::KeepHeading => self.advance(ctx),
                LostTargetPolicy::Stop if self.advancing => {
                    ctx.actions.push(Action::Stop);
                    self.advancing = false;
                }
                LostTargetPolicy::Stop => {}
            }
        }
        Ok(GoalStatus::Running)
    }

    pub fn cancel(&mut self, ctx: &mut GoalContext<'_>) {
        self.halt(ctx);
    }

    fn advance(&mut self, ctx: &mut GoalContext<'_>) {
        if !self.advancing {
            ctx.actions.push(Action::Forward);
            self.advancing = true;
        }
    }

    fn halt(&mut self, ctx: &mut GoalContext<'_>) {
        if self.advancing {
            ctx.actions.push(Action::Stop);
        }
        ctx.actions.push(Action::StopTurn);
        self.state = FollowState::Moving;
        self.advancing = false;
        self.hungry_at_entry = None;
    }
}
