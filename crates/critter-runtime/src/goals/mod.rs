//! Goal state machines.
//!
//! A goal is a resumable unit of behavior. It never blocks: every call to
//! [`Goal::step`] does a bounded amount of work against the current
//! [`GoalContext`], queues zero or more actions, and returns a
//! [`GoalStatus`]. The caller owns the loop and the timing; a goal that wants
//! to wait simply keeps returning [`GoalStatus::Running`] until enough time
//! has passed according to [`GoalContext::now`].
//!
//! [`Goal::cancel`] is the cooperative cancellation hook. It is called exactly
//! once before a running goal is discarded and must queue whatever command
//! is needed to leave the body in a safe state (`stop`, `stop-turn`).
//!
//! | Goal | Terminates | Safe stop on cancel |
//! |---|---|---|
//! | [`Idle`] | success after the idle dwell | – |
//! | [`ForwardStop`] | success when any ray hits | `stop` |
//! | [`ForwardDistance`] | success once displacement ≥ target | `stop` |
//! | [`TurnByAngle`] | success once accumulated yaw ≥ target | `stop-turn` |
//! | [`ObstacleAvoidance`] | never | `stop`, `stop-turn` |
//! | [`EatFlower`] | success after the dwell, failure if not hungry | – |
//! | [`FollowAstronaut`] | failure when hunger sets in mid-run | `stop`, `stop-turn` |

use std::time::{Duration, Instant};

use critter_types::CritterError;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blackboard::Blackboard;
use crate::emitter::Outbox;
use crate::percept::PerceptStore;

pub mod avoid;
pub mod eat;
pub mod follow;
pub mod forward;
pub mod idle;
pub mod rotation;
pub mod turn;

pub use avoid::ObstacleAvoidance;
pub use eat::EatFlower;
pub use follow::FollowAstronaut;
pub use forward::{Distance, ForwardDistance, ForwardStop};
pub use idle::Idle;
pub use rotation::{RotationTracker, TurnDirection, yaw_delta};
pub use turn::{Angle, TurnByAngle};

// ─────────────────────────────────────────────────────────────────────────────
// Step contract
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a single [`Goal::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    Running,
    Success,
    Failure,
}

impl GoalStatus {
    pub fn is_done(self) -> bool {
        self != GoalStatus::Running
    }
}

/// A fault raised by a goal step.
///
/// Faults never cross the scheduler boundary: the owning handle logs them,
/// cancels the goal and falls back to [`Idle`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GoalError {
    #[error("ray {index} out of range for a fan of {len} rays")]
    RayOutOfRange { index: usize, len: usize },

    #[error("no astronaut detection has been recorded")]
    NoDetection,

    #[error("simulator reported a non-finite pose")]
    NonFinitePose,

    #[error("invalid goal parameter: {0}")]
    InvalidParameter(String),
}

/// Everything a goal may touch during one step.
pub struct GoalContext<'a> {
    /// Read-only view of the latest frame and state.
    pub percepts: &'a PerceptStore,
    pub blackboard: &'a mut Blackboard,
    /// Commands queued here reach the simulator at the end of the tick.
    pub actions: &'a mut Outbox,
    pub rng: &'a mut SmallRng,
    pub now: Instant,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tuning
// ─────────────────────────────────────────────────────────────────────────────

/// What [`FollowAstronaut`] does when the ray that last saw the astronaut no
/// longer reports a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LostTargetPolicy {
    /// Keep moving straight on the last heading.
    #[default]
    KeepHeading,
    /// Stop and wait for the target to reappear.
    Stop,
}

/// Turn direction [`ObstacleAvoidance`] picks when both halves of the fan
/// report hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvoidTieBreak {
    /// The left half is scanned first, so a left hit wins and we turn right.
    #[default]
    TurnRight,
    TurnLeft,
}

impl AvoidTieBreak {
    pub fn direction(self) -> TurnDirection {
        match self {
            AvoidTieBreak::TurnRight => TurnDirection::Right,
            AvoidTieBreak::TurnLeft => TurnDirection::Left,
        }
    }
}

/// Tuning for every goal and predicate. Deserialised from the `[behavior]`
/// table of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorParams {
    pub forward_min: f32,
    pub forward_max: f32,
    pub turn_min_deg: f32,
    pub turn_max_deg: f32,
    pub avoid_rotation_deg: f32,
    pub eat_dwell_secs: f32,
    pub hunger_interval_secs: f32,
    pub idle_secs: f32,
    pub follow_max_angle_deg: f32,
    pub lost_target: LostTargetPolicy,
    pub avoid_tie_break: AvoidTieBreak,
    pub start_hungry: bool,
}

impl Default for BehaviorParams {
    fn default() -> Self {
        Self {
            forward_min: 1.0,
            forward_max: 5.0,
            turn_min_deg: 10.0,
            turn_max_deg: 90.0,
            avoid_rotation_deg: 30.0,
            eat_dwell_secs: 5.0,
            hunger_interval_secs: 15.0,
            idle_secs: 1.0,
            follow_max_angle_deg: 90.0,
            lost_target: LostTargetPolicy::default(),
            avoid_tie_break: AvoidTieBreak::default(),
            start_hungry: true,
        }
    }
}

impl BehaviorParams {
    pub fn eat_dwell(&self) -> Duration {
        Duration::from_secs_f32(self.eat_dwell_secs)
    }

    pub fn hunger_interval(&self) -> Duration {
        Duration::from_secs_f32(self.hunger_interval_secs)
    }

    pub fn idle_dwell(&self) -> Duration {
        Duration::from_secs_f32(self.idle_secs)
    }

    /// Reject ranges that are reversed, negative or non-finite.
    pub fn validate(&self) -> Result<(), CritterError> {
        let ranges = [
            ("forward", self.forward_min, self.forward_max),
            ("turn", self.turn_min_deg, self.turn_max_deg),
        ];
        for (name, min, max) in ranges {
            if !(min.is_finite() && max.is_finite()) || min < 0.0 || min > max {
                return Err(CritterError::Config(format!(
                    "{name} range [{min}, {max}] must be finite, non-negative and ordered"
                )));
            }
        }
        let scalars = [
            ("avoid_rotation_deg", self.avoid_rotation_deg),
            ("eat_dwell_secs", self.eat_dwell_secs),
            ("hunger_interval_secs", self.hunger_interval_secs),
            ("idle_secs", self.idle_secs),
            ("follow_max_angle_deg", self.follow_max_angle_deg),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(CritterError::Config(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Goal
// ─────────────────────────────────────────────────────────────────────────────

/// Every goal the agent knows how to run.
#[derive(Debug, Clone)]
pub enum Goal {
    Idle(Idle),
    ForwardStop(ForwardStop),
    Forward(ForwardDistance),
    Turn(TurnByAngle),
    Avoid(ObstacleAvoidance),
    Eat(EatFlower),
    Follow(FollowAstronaut),
}

impl Goal {
    pub fn name(&self) -> &'static str {
        match self {
            Goal::Idle(_) => "Idle",
            Goal::ForwardStop(_) => "ForwardStop",
            Goal::Forward(_) => "ForwardDistance",
            Goal::Turn(_) => "TurnByAngle",
            Goal::Avoid(_) => "ObstacleAvoidance",
            Goal::Eat(_) => "EatFlower",
            Goal::Follow(_) => "FollowAstronaut",
        }
    }

    /// Advance the state machine by one bounded step.
    pub fn step(&mut self, ctx: &mut GoalContext<'_>) -> Result<GoalStatus, GoalError> {
        match self {
            Goal::Idle(g) => Ok(g.step(ctx)),
            Goal::ForwardStop(g) => Ok(g.step(ctx)),
            Goal::Forward(g) => g.step(ctx),
            Goal::Turn(g) => g.step(ctx),
            Goal::Avoid(g) => g.step(ctx),
            Goal::Eat(g) => Ok(g.step(ctx)),
            Goal::Follow(g) => g.step(ctx),
        }
    }

    /// Queue the safe-stop commands and reset to the initial state.
    pub fn cancel(&mut self, ctx: &mut GoalContext<'_>) {
        match self {
            Goal::Idle(g) => g.cancel(),
            Goal::ForwardStop(g) => g.cancel(ctx),
            Goal::Forward(g) => g.cancel(ctx),
            Goal::Turn(g) => g.cancel(ctx),
            Goal::Avoid(g) => g.cancel(ctx),
            Goal::Eat(g) => g.cancel(),
            Goal::Follow(g) => g.cancel(ctx),
        }
    }
}

macro_rules! impl_from_goal {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Goal {
            fn from(goal: $ty) -> Self {
                Goal::$variant(goal)
            }
        })*
    };
}

impl_from_goal! {
    Idle => Idle,
    ForwardStop => ForwardStop,
    ForwardDistance => Forward,
    TurnByAngle => Turn,
    ObstacleAvoidance => Avoid,
    EatFlower => Eat,
    FollowAstronaut => Follow,
}

/// Yaw from the current snapshot, rejecting NaN/∞.
pub(crate) fn current_yaw(ctx: &GoalContext<'_>) -> Result<f32, GoalError> {
    let yaw = ctx.percepts.state().yaw();
    if yaw.is_finite() {
        Ok(yaw)
    } else {
        Err(GoalError::NonFinitePose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        BehaviorParams::default().validate().unwrap();
    }

    #[test]
    fn reversed_range_is_rejected() {
        let params = BehaviorParams {
            turn_min_deg: 90.0,
            turn_max_deg: 10.0,
            ..BehaviorParams::default()
        };
        assert!(matches!(params.validate(), Err(CritterError::Config(_))));
    }

    #[test]
    fn negative_dwell_is_rejected() {
        let params = BehaviorParams {
            eat_dwell_secs: -1.0,
            ..BehaviorParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn policies_parse_from_kebab_case() {
        let params: BehaviorParams = serde_json::from_str(
            r#"{"lost_target":"stop","avoid_tie_break":"turn-left"}"#,
        )
        .unwrap();
        assert_eq!(params.lost_target, LostTargetPolicy::Stop);
        assert_eq!(params.avoid_tie_break, AvoidTieBreak::TurnLeft);
        assert_eq!(params.forward_max, 5.0);
    }
}
