//! [`Blackboard`] – flags shared between behaviors.
//!
//! Passed by mutable reference inside every
//! [`GoalContext`][crate::goals::GoalContext]. Ownership per field:
//!
//! | Field | Written by | Read by |
//! |---|---|---|
//! | `hungry` | hunger timer (set), `EatFlower` (clear) | `EatFlower`, `FollowAstronaut`, hunger timer |
//! | `last_fed` | `EatFlower` | hunger timer |
//! | `detection_index` | astronaut detector | `FollowAstronaut` |

use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Blackboard {
    pub hungry: bool,
    /// When the agent last finished eating. `None` until the first meal.
    pub last_fed: Option<Instant>,
    /// Index of the ray that most recently saw an astronaut.
    pub detection_index: Option<usize>,
}

impl Blackboard {
    pub fn new(hungry: bool) -> Self {
        Self {
            hungry,
            ..Self::default()
        }
    }

    /// Clear hunger and remember when it happened.
    pub fn feed(&mut self, now: Instant) {
        self.hungry = false;
        self.last_fed = Some(now);
    }
}
