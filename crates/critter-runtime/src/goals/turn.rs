use critter_types::Action;
use rand::Rng;
use tracing::debug;

use super::rotation::{RotationTracker, TurnDirection};
use super::{GoalContext, GoalError, GoalStatus, current_yaw};

/// How far a [`TurnByAngle`] run should rotate, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Angle {
    Fixed(f32),
    Random { min: f32, max: f32 },
}

impl Angle {
    fn resolve(self, rng: &mut impl Rng) -> Result<f32, GoalError> {
        let degrees = match self {
            Angle::Fixed(d) => d,
            Angle::Random { min, max } if min <= max => rng.gen_range(min..=max),
            Angle::Random { min, max } => {
                return Err(GoalError::InvalidParameter(format!(
                    "angle range [{min}, {max}] is reversed"
                )));
            }
        };
        if degrees.is_finite() && degrees >= 0.0 {
            Ok(degrees)
        } else {
            Err(GoalError::InvalidParameter(format!(
                "angle {degrees} must be finite and non-negative"
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TurnState {
    Selecting,
    Turning(RotationTracker),
}

/// Rotate in place by a fixed or random angle.
#[derive(Debug, Clone)]
pub struct TurnByAngle {
    amount: Angle,
    /// `None` picks a side at random on every run.
    direction: Option<TurnDirection>,
    state: TurnState,
}

impl TurnByAngle {
    pub fn new(amount: Angle, direction: Option<TurnDirection>) -> Self {
        Self {
            amount,
            direction,
            state: TurnState::Selecting,
        }
    }

    pub fn step(&mut self, ctx: &mut GoalContext<'_>) -> Result<GoalStatus, GoalError> {
        let yaw = current_yaw(ctx)?;
        match &mut self.state {
            TurnState::Selecting => {
                let degrees = self.amount.resolve(ctx.rng)?;
                let direction = self
                    .direction
                    .unwrap_or_else(|| TurnDirection::random(ctx.rng));
                debug!(degrees, ?direction, "turning");
                ctx.actions.push(direction.command());
                self.state = TurnState::Turning(RotationTracker::start(direction, degrees, yaw));
                Ok(GoalStatus::Running)
            }
            TurnState::Turning(tracker) => {
                if tracker.advance(yaw) {
                    ctx.actions.push(Action::StopTurn);
                    self.state = TurnState::Selecting;
                    Ok(GoalStatus::Success)
                } else {
                    Ok(GoalStatus::Running)
                }
            }
        }
    }

    pub fn cancel(&mut self, ctx: &mut GoalContext<'_>) {
        ctx.actions.push(Action::StopTurn);
        self.state = TurnState::Selecting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::Rig;

    #[test]
    fn right_turn_through_wraparound_completes() {
        let mut rig = Rig::new();
        rig.set_yaw(350.0);
        let mut goal = TurnByAngle::new(Angle::Fixed(30.0), Some(TurnDirection::Right));

        assert_eq!(goal.step(&mut rig.ctx()).unwrap(), GoalStatus::Running);
        rig.set_yaw(5.0);
        assert_eq!(goal.step(&mut rig.ctx()).unwrap(), GoalStatus::Running);
        rig.set_yaw(20.0);
        assert_eq!(goal.step(&mut rig.ctx()).unwrap(), GoalStatus::Success);

        assert_eq!(rig.drain(), vec![Action::TurnRight, Action::StopTurn]);
    }

    #[test]
    fn left_turn_through_wraparound_completes() {
        let mut rig = Rig::new();
        rig.set_yaw(10.0);
        let mut goal = TurnByAngle::new(Angle::Fixed(30.0), Some(TurnDirection::Left));

        goal.step(&mut rig.ctx()).unwrap();
        rig.set_yaw(340.0);
        assert_eq!(goal.step(&mut rig.ctx()).unwrap(), GoalStatus::Success);
        assert_eq!(rig.drain(), vec![Action::TurnLeft, Action::StopTurn]);
    }

    #[test]
    fn random_direction_emits_exactly_one_turn() {
        let mut rig = Rig::new();
        let mut goal = TurnByAngle::new(Angle::Random { min: 10.0, max: 90.0 }, None);
        goal.step(&mut rig.ctx()).unwrap();
        let actions = rig.drain();
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::TurnLeft | Action::TurnRight));
    }

    #[test]
    fn cancel_emits_stop_turn_last() {
        let mut rig = Rig::new();
        let mut goal = TurnByAngle::new(Angle::Fixed(90.0), Some(TurnDirection::Left));
        goal.step(&mut rig.ctx()).unwrap();
        goal.cancel(&mut rig.ctx());
        assert_eq!(rig.drain().last(), Some(&Action::StopTurn));
        assert_eq!(goal.state, TurnState::Selecting);
    }

    #[test]
    fn cancel_mid_turn_stays_within_one_step_of_target() {
        use crate::goals::rotation::yaw_delta;

        let mut rig = Rig::new();
        rig.set_yaw(350.0);
        let mut goal = TurnByAngle::new(Angle::Fixed(40.0), Some(TurnDirection::Right));
        goal.step(&mut rig.ctx()).unwrap();

        let mut prev = 350.0;
        for yaw in [358.0, 10.0, 22.0] {
            rig.set_yaw(yaw);
            assert_eq!(goal.step(&mut rig.ctx()).unwrap(), GoalStatus::Running);
            let last = yaw_delta(prev, yaw, TurnDirection::Right);
            prev = yaw;
            match &goal.state {
                TurnState::Turning(t) => assert!(t.accumulated() <= t.target() + last),
                TurnState::Selecting => panic!("turn ended early at yaw {yaw}"),
            }
        }

        goal.cancel(&mut rig.ctx());
        assert_eq!(rig.drain(), vec![Action::TurnRight, Action::StopTurn]);
    }

    #[test]
    fn non_finite_yaw_is_a_fault() {
        let mut rig = Rig::new();
        rig.set_yaw(f32::NAN);
        let mut goal = TurnByAngle::new(Angle::Fixed(10.0), None);
        assert_eq!(goal.step(&mut rig.ctx()), Err(GoalError::NonFinitePose));
    }
}
