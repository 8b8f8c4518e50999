//! Shared fixtures for unit tests.

use std::time::{Duration, Instant};

use critter_types::{Action, AgentState, PerceptFrame, Ray, Vec3};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::blackboard::Blackboard;
use crate::emitter::Outbox;
use crate::goals::GoalContext;
use crate::percept::PerceptStore;

pub const RAYS: usize = 11;

/// Owns everything a [`GoalContext`] borrows.
pub struct Rig {
    pub percepts: PerceptStore,
    pub blackboard: Blackboard,
    pub outbox: Outbox,
    pub rng: SmallRng,
    pub now: Instant,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            percepts: PerceptStore::with_snapshot(PerceptFrame::empty(RAYS), AgentState::default()),
            blackboard: Blackboard::new(false),
            outbox: Outbox::new(),
            rng: SmallRng::seed_from_u64(7),
            now: Instant::now(),
        }
    }

    pub fn ctx(&mut self) -> GoalContext<'_> {
        GoalContext {
            percepts: &self.percepts,
            blackboard: &mut self.blackboard,
            actions: &mut self.outbox,
            rng: &mut self.rng,
            now: self.now,
        }
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    /// Take the actions queued so far.
    pub fn drain(&mut self) -> Vec<Action> {
        let actions = self.outbox.actions();
        self.outbox.clear();
        actions
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.update_state(|s| s.rotation.y = yaw);
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.update_state(|s| s.position = position);
    }

    pub fn set_frame(&mut self, frame: PerceptFrame) {
        let state = self.percepts.state().clone();
        self.percepts.ingest(frame, state).unwrap();
    }

    /// A clear fan with a single tagged hit at `index`.
    pub fn hit_at(&mut self, index: usize, tag: &str) {
        self.set_frame(frame_with_hit(index, tag));
    }

    pub fn clear_frame(&mut self) {
        self.set_frame(PerceptFrame::empty(RAYS));
    }

    fn update_state(&mut self, f: impl FnOnce(&mut AgentState)) {
        let frame = self.percepts.frame().clone();
        let mut state = self.percepts.state().clone();
        f(&mut state);
        self.percepts.ingest(frame, state).unwrap();
    }
}

pub fn frame_with_hit(index: usize, tag: &str) -> PerceptFrame {
    let mut rays = PerceptFrame::empty(RAYS).rays().to_vec();
    let angle = rays[index].angle;
    rays[index] = Ray::tagged(tag, 1.5, angle);
    PerceptFrame::new(rays)
}
