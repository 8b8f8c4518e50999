//! Yaw bookkeeping for turning goals.
//!
//! The simulator reports yaw in `[0, 360)`. Turning goals accumulate the
//! per-step change in the commanded direction so that wrapping through 0°
//! counts as ordinary progress.

use critter_types::Action;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    /// The command that starts a turn this way.
    pub fn command(self) -> Action {
        match self {
            TurnDirection::Left => Action::TurnLeft,
            TurnDirection::Right => Action::TurnRight,
        }
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        if rng.gen_bool(0.5) {
            TurnDirection::Left
        } else {
            TurnDirection::Right
        }
    }
}

/// Degrees turned from `prev` to `current` in `direction`.
///
/// A change of more than half a revolution is movement against the commanded
/// direction (sensor jitter, a bump) and counts as zero.
pub fn yaw_delta(prev: f32, current: f32, direction: TurnDirection) -> f32 {
    let raw = match direction {
        TurnDirection::Right => current - prev,
        TurnDirection::Left => prev - current,
    };
    let delta = raw.rem_euclid(360.0);
    if delta > 180.0 { 0.0 } else { delta }
}

/// Accumulates yaw change towards a target angle.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationTracker {
    direction: TurnDirection,
    target: f32,
    prev_yaw: f32,
    accumulated: f32,
}

impl RotationTracker {
    pub fn start(direction: TurnDirection, target: f32, yaw: f32) -> Self {
        Self {
            direction,
            target,
            prev_yaw: yaw,
            accumulated: 0.0,
        }
    }

    /// Fold in a new yaw reading. Returns `true` once the target is reached.
    pub fn advance(&mut self, yaw: f32) -> bool {
        self.accumulated += yaw_delta(self.prev_yaw, yaw, self.direction);
        self.prev_yaw = yaw;
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.accumulated >= self.target
    }

    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn direction(&self) -> TurnDirection {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_turn_wraps_through_zero() {
        assert_eq!(yaw_delta(350.0, 10.0, TurnDirection::Right), 20.0);
    }

    #[test]
    fn left_turn_wraps_through_zero() {
        assert_eq!(yaw_delta(10.0, 350.0, TurnDirection::Left), 20.0);
    }

    #[test]
    fn backward_jitter_counts_as_zero() {
        assert_eq!(yaw_delta(100.0, 98.0, TurnDirection::Right), 0.0);
        assert_eq!(yaw_delta(98.0, 100.0, TurnDirection::Left), 0.0);
    }

    #[test]
    fn tracker_accumulates_until_target() {
        let mut t = RotationTracker::start(TurnDirection::Right, 45.0, 340.0);
        assert!(!t.advance(355.0));
        assert!(!t.advance(10.0));
        assert!(t.advance(26.0));
        assert_eq!(t.accumulated(), 46.0);
    }

    #[test]
    fn completion_overshoots_by_at_most_the_last_step() {
        let mut t = RotationTracker::start(TurnDirection::Right, 30.0, 350.0);
        let mut prev = 350.0;
        for yaw in [0.0, 10.0, 25.0] {
            let last = yaw_delta(prev, yaw, TurnDirection::Right);
            prev = yaw;
            let done = t.advance(yaw);
            assert!(t.accumulated() <= t.target() + last);
            if done {
                assert_eq!(yaw, 25.0);
            }
        }
        assert!(t.is_complete());
    }

    #[test]
    fn tracker_with_zero_target_is_complete_immediately() {
        let mut t = RotationTracker::start(TurnDirection::Left, 0.0, 90.0);
        assert!(t.advance(90.0));
    }
}
