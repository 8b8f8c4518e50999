//! Cooperative goal scheduler.
//!
//! Goals run as resumable state machines owned by a [`GoalHandle`]. The
//! control loop calls [`GoalScheduler::pass`] once per tick; each active
//! handle gets exactly one bounded step. Nothing is pre-empted mid-step:
//! cancellation is requested between steps and carried out by calling the
//! goal's own cancel hook, which queues the safe-stop commands.
//!
//! # Fault boundary
//!
//! A [`GoalError`][crate::goals::GoalError] raised by a step is logged and
//! contained in the handle. The faulted goal is cancelled, replaced by the
//! [`Idle`] fallback, and the step reports [`GoalStatus::Failure`]. The loop
//! keeps running.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::goals::{Goal, GoalContext, GoalStatus, Idle};

/// Owns one running goal instance.
#[derive(Debug, Clone)]
pub struct GoalHandle {
    id: Uuid,
    goal: Goal,
    fallback: Duration,
    /// `Some(true)` on success, `Some(false)` on failure or cancellation.
    result: Option<bool>,
    faulted: bool,
}

impl GoalHandle {
    /// Wrap `goal`; a fault swaps it for an [`Idle`] of `fallback` length.
    pub fn new(goal: Goal, fallback: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal,
            fallback,
            result: None,
            faulted: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.goal.name()
    }

    pub fn result(&self) -> Option<bool> {
        self.result
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    /// `true` once the original goal faulted and the idle fallback took over.
    pub fn has_faulted(&self) -> bool {
        self.faulted
    }

    /// Step the goal once. A finished handle is not stepped again and keeps
    /// reporting its final status.
    pub fn poll(&mut self, ctx: &mut GoalContext<'_>) -> GoalStatus {
        if let Some(ok) = self.result {
            return if ok {
                GoalStatus::Success
            } else {
                GoalStatus::Failure
            };
        }
        match self.goal.step(ctx) {
            Ok(GoalStatus::Running) => GoalStatus::Running,
            Ok(status) => {
                debug!(goal = self.name(), id = %self.id, ?status, "goal finished");
                self.result = Some(status == GoalStatus::Success);
                status
            }
            Err(e) => {
                warn!(goal = self.name(), id = %self.id, error = %e, "goal faulted, falling back to idle");
                self.goal.cancel(ctx);
                self.goal = Idle::new(self.fallback).into();
                self.faulted = true;
                GoalStatus::Failure
            }
        }
    }

    /// Run the goal's cancel hook unless it already finished.
    pub fn cancel(&mut self, ctx: &mut GoalContext<'_>) {
        if self.result.is_none() {
            info!(goal = self.name(), id = %self.id, "cancelling goal");
            self.goal.cancel(ctx);
            self.result = Some(false);
        }
    }
}

/// Keyed set of concurrently active goals.
#[derive(Debug, Clone)]
pub struct GoalScheduler {
    active: BTreeMap<String, GoalHandle>,
    fallback: Duration,
}

impl GoalScheduler {
    pub fn new(fallback: Duration) -> Self {
        Self {
            active: BTreeMap::new(),
            fallback,
        }
    }

    /// Start `goal` under `key`. A goal already active under the same key is
    /// cancelled first, so its safe-stop commands precede anything the new
    /// goal emits.
    pub fn activate(
        &mut self,
        key: impl Into<String>,
        goal: Goal,
        ctx: &mut GoalContext<'_>,
    ) -> Uuid {
        let key = key.into();
        if let Some(mut previous) = self.active.remove(&key) {
            previous.cancel(ctx);
        }
        let handle = GoalHandle::new(goal, self.fallback);
        let id = handle.id();
        info!(key = %key, goal = handle.name(), %id, "activating goal");
        self.active.insert(key, handle);
        id
    }

    /// Cancel and remove the goal under `key`. Returns `false` if none.
    pub fn deactivate(&mut self, key: &str, ctx: &mut GoalContext<'_>) -> bool {
        match self.active.remove(key) {
            Some(mut handle) => {
                handle.cancel(ctx);
                true
            }
            None => false,
        }
    }

    /// One scheduling pass: step every unfinished goal once, in key order.
    /// Returns how many are still running.
    pub fn pass(&mut self, ctx: &mut GoalContext<'_>) -> usize {
        self.active
            .values_mut()
            .filter(|h| !h.is_finished())
            .map(|h| h.poll(ctx))
            .filter(|s| *s == GoalStatus::Running)
            .count()
    }

    /// Cancel every active goal and clear the scheduler.
    pub fn cancel_all(&mut self, ctx: &mut GoalContext<'_>) {
        for (_, mut handle) in std::mem::take(&mut self.active) {
            handle.cancel(ctx);
        }
    }

    pub fn get(&self, key: &str) -> Option<&GoalHandle> {
        self.active.get(key)
    }

    pub fn active_keys(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    /// `true` when no goal is left running.
    pub fn is_idle(&self) -> bool {
        self.active.values().all(GoalHandle::is_finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::{
        Angle, Distance, FollowAstronaut, ForwardDistance, LostTargetPolicy, TurnByAngle,
        TurnDirection,
    };
    use crate::testkit::Rig;
    use critter_types::{Action, Vec3};

    fn forward(d: f32) -> Goal {
        ForwardDistance::new(Distance::Fixed(d)).into()
    }

    #[test]
    fn activation_cancels_superseded_goal_first() {
        let mut rig = Rig::new();
        let mut scheduler = GoalScheduler::new(Duration::from_secs(1));
        scheduler.activate("main", forward(5.0), &mut rig.ctx());
        scheduler.pass(&mut rig.ctx());

        let turn = TurnByAngle::new(Angle::Fixed(45.0), Some(TurnDirection::Left)).into();
        scheduler.activate("main", turn, &mut rig.ctx());
        scheduler.pass(&mut rig.ctx());

        assert_eq!(
            rig.drain(),
            vec![Action::Forward, Action::Stop, Action::TurnLeft]
        );
        assert_eq!(scheduler.get("main").unwrap().name(), "TurnByAngle");
    }

    #[test]
    fn finished_goal_is_not_stepped_again() {
        let mut rig = Rig::new();
        let mut scheduler = GoalScheduler::new(Duration::from_secs(1));
        scheduler.activate("main", forward(1.0), &mut rig.ctx());
        assert_eq!(scheduler.pass(&mut rig.ctx()), 1);
        rig.set_position(Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(scheduler.pass(&mut rig.ctx()), 0);
        assert_eq!(scheduler.pass(&mut rig.ctx()), 0);

        assert_eq!(rig.drain(), vec![Action::Forward, Action::Stop]);
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.get("main").unwrap().result(), Some(true));
    }

    #[test]
    fn fault_is_contained_and_falls_back_to_idle() {
        let mut rig = Rig::new();
        let mut scheduler = GoalScheduler::new(Duration::from_secs(1));
        let follow = FollowAstronaut::new(90.0, LostTargetPolicy::KeepHeading).into();
        scheduler.activate("main", follow, &mut rig.ctx());

        scheduler.pass(&mut rig.ctx());
        assert_eq!(scheduler.get("main").unwrap().name(), "Idle");
        assert!(scheduler.get("main").unwrap().has_faulted());
        assert_eq!(rig.drain(), vec![Action::StopTurn]);

        scheduler.pass(&mut rig.ctx());
        rig.advance(Duration::from_secs(1));
        scheduler.pass(&mut rig.ctx());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn cancel_all_stops_every_running_goal() {
        let mut rig = Rig::new();
        let mut scheduler = GoalScheduler::new(Duration::from_secs(1));
        scheduler.activate("walk", forward(5.0), &mut rig.ctx());
        let turn = TurnByAngle::new(Angle::Fixed(90.0), Some(TurnDirection::Right)).into();
        scheduler.activate("spin", turn, &mut rig.ctx());
        scheduler.pass(&mut rig.ctx());
        rig.drain();

        scheduler.cancel_all(&mut rig.ctx());

        let actions = rig.drain();
        assert!(actions.contains(&Action::Stop));
        assert!(actions.contains(&Action::StopTurn));
        assert_eq!(scheduler.active_keys().count(), 0);
    }

    #[test]
    fn deactivate_unknown_key_is_noop() {
        let mut rig = Rig::new();
        let mut scheduler = GoalScheduler::new(Duration::from_secs(1));
        assert!(!scheduler.deactivate("missing", &mut rig.ctx()));
        assert!(rig.drain().is_empty());
    }
}
