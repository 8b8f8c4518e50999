//! The critter's behavior tree and its sensing predicates.
//!
//! ```text
//! Critter (selector, no memory)
//! ├── DetectFlower (sequence)
//! │   ├── FlowerInView
//! │   └── Feed (sequence)
//! │       ├── HungryTimer
//! │       └── EatFlower
//! ├── DetectFollow (sequence)
//! │   ├── AstronautInView        writes blackboard.detection_index
//! │   └── FollowAstronaut
//! ├── DetectAvoid (sequence)
//! │   ├── ObstacleInView         any hit not tagged Astronaut
//! │   └── Avoid
//! └── Roam (parallel, success on all)
//!     ├── ForwardDist
//!     └── Turn
//! ```

use std::time::{Duration, Instant};

use critter_types::CritterError;
use tracing::info;

use crate::behavior_tree::{BehaviorNode, BehaviorTree};
use crate::goals::BehaviorParams;
use crate::registry::GoalRegistry;

pub const FLOWER: &str = "Flower";
pub use crate::goals::follow::ASTRONAUT;

/// Build the critter tree, resolving every goal leaf through `registry`.
///
/// # Errors
///
/// [`CritterError::UnknownGoal`] if a goal the tree needs is not registered.
pub fn critter_tree(
    registry: &GoalRegistry,
    params: &BehaviorParams,
) -> Result<BehaviorTree, CritterError> {
    let fallback = params.idle_dwell();
    let leaf = |key: &str| -> Result<BehaviorNode, CritterError> {
        let factory = registry.factory(key)?;
        let params = params.clone();
        Ok(BehaviorNode::goal_with_fallback(key, fallback, move || factory(&params)))
    };

    let root = BehaviorNode::selector(
        "Critter",
        vec![
            BehaviorNode::sequence(
                "DetectFlower",
                vec![
                    detect_flower(),
                    BehaviorNode::sequence(
                        "Feed",
                        vec![hunger_timer(params.hunger_interval()), leaf("EatFlower")?],
                    ),
                ],
            ),
            BehaviorNode::sequence(
                "DetectFollow",
                vec![detect_astronaut(), leaf("FollowAstronaut")?],
            ),
            BehaviorNode::sequence("DetectAvoid", vec![detect_obstacle(), leaf("Avoid")?]),
            BehaviorNode::parallel("Roam", vec![leaf("ForwardDist")?, leaf("Turn")?]),
        ],
    );
    Ok(BehaviorTree::new(root))
}

/// Success when any ray sees a flower.
pub fn detect_flower() -> BehaviorNode {
    BehaviorNode::condition("FlowerInView", |ctx| ctx.percepts.frame().any_tagged(FLOWER))
}

/// Success when any ray sees an astronaut; records the leftmost such ray.
pub fn detect_astronaut() -> BehaviorNode {
    BehaviorNode::condition("AstronautInView", |ctx| {
        match ctx.percepts.frame().first_tagged(ASTRONAUT) {
            Some(index) => {
                ctx.blackboard.detection_index = Some(index);
                true
            }
            None => false,
        }
    })
}

/// Success when any ray hits something other than an astronaut.
pub fn detect_obstacle() -> BehaviorNode {
    BehaviorNode::condition("ObstacleInView", |ctx| {
        ctx.percepts
            .frame()
            .rays()
            .iter()
            .any(|r| r.hit && !r.has_tag(ASTRONAUT))
    })
}

/// Success while hungry. Hunger sets in once `interval` has passed since the
/// last meal, or since the first evaluation if the critter has not eaten yet.
pub fn hunger_timer(interval: Duration) -> BehaviorNode {
    let mut first_seen: Option<Instant> = None;
    BehaviorNode::condition("HungryTimer", move |ctx| {
        let origin = *first_seen.get_or_insert(ctx.now);
        if ctx.blackboard.hungry {
            return true;
        }
        let since = ctx.blackboard.last_fed.unwrap_or(origin);
        if ctx.now.duration_since(since) >= interval {
            info!("critter is hungry");
            ctx.blackboard.hungry = true;
            true
        } else {
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior_tree::NodeStatus;
    use crate::testkit::{RAYS, Rig};
    use critter_types::Action;

    fn tree() -> BehaviorTree {
        critter_tree(&GoalRegistry::standard(), &BehaviorParams::default()).unwrap()
    }

    #[test]
    fn clear_fan_roams() {
        let mut rig = Rig::new();
        let mut tree = tree();
        assert_eq!(tree.tick(&mut rig.ctx()), NodeStatus::Running);
        assert_eq!(tree.root().running_goals(), vec!["ForwardDist", "Turn"]);

        let actions = rig.drain();
        assert_eq!(actions[0], Action::Forward);
        assert!(matches!(actions[1], Action::TurnLeft | Action::TurnRight));
    }

    #[test]
    fn obstacle_at_ray_zero_preempts_roaming() {
        let mut rig = Rig::new();
        let mut tree = tree();
        tree.tick(&mut rig.ctx());
        rig.drain();

        rig.hit_at(0, "Rock");
        assert_eq!(tree.tick(&mut rig.ctx()), NodeStatus::Running);

        assert_eq!(tree.root().running_goals(), vec!["Avoid"]);
        assert_eq!(
            rig.drain(),
            vec![Action::Stop, Action::StopTurn, Action::TurnRight]
        );
        let roam = &tree.root().children()[3];
        assert_eq!(roam.status(), NodeStatus::Invalid);
    }

    #[test]
    fn astronaut_is_not_an_obstacle() {
        let mut rig = Rig::new();
        let mut tree = tree();
        rig.hit_at(RAYS / 2, ASTRONAUT);
        tree.tick(&mut rig.ctx());
        assert_eq!(tree.root().running_goals(), vec!["FollowAstronaut"]);
        assert_eq!(rig.blackboard.detection_index, Some(RAYS / 2));
        assert_eq!(rig.drain(), vec![Action::Forward]);
    }

    #[test]
    fn follow_tracks_astronaut_across_the_fan() {
        let mut rig = Rig::new();
        let mut tree = tree();
        rig.hit_at(RAYS / 2, ASTRONAUT);
        tree.tick(&mut rig.ctx());
        assert_eq!(rig.drain(), vec![Action::Forward]);

        rig.hit_at(0, ASTRONAUT);
        tree.tick(&mut rig.ctx());
        assert_eq!(tree.root().running_goals(), vec!["FollowAstronaut"]);
        assert_eq!(rig.blackboard.detection_index, Some(0));
        assert_eq!(rig.drain(), vec![Action::TurnLeft]);
    }

    #[test]
    fn hungry_critter_eats_visible_flower() {
        let mut rig = Rig::new();
        rig.blackboard.hungry = true;
        let mut tree = tree();
        rig.hit_at(2, FLOWER);

        tree.tick(&mut rig.ctx());
        assert_eq!(tree.root().running_goals(), vec!["EatFlower"]);
        assert_eq!(rig.drain(), vec![Action::Stop]);

        rig.advance(Duration::from_secs(5));
        tree.tick(&mut rig.ctx());
        assert!(!rig.blackboard.hungry);
    }

    #[test]
    fn sated_critter_avoids_flower() {
        let mut rig = Rig::new();
        let mut tree = tree();
        rig.hit_at(8, FLOWER);
        tree.tick(&mut rig.ctx());
        assert_eq!(tree.root().running_goals(), vec!["Avoid"]);
        assert_eq!(rig.drain(), vec![Action::TurnLeft]);
    }

    #[test]
    fn hunger_timer_fires_after_interval_since_last_meal() {
        let mut rig = Rig::new();
        let mut timer = hunger_timer(Duration::from_secs(15));
        rig.blackboard.feed(rig.now);

        assert_eq!(timer.tick(&mut rig.ctx()), NodeStatus::Failure);
        rig.advance(Duration::from_secs(14));
        assert_eq!(timer.tick(&mut rig.ctx()), NodeStatus::Failure);
        rig.advance(Duration::from_secs(1));
        assert_eq!(timer.tick(&mut rig.ctx()), NodeStatus::Success);
        assert!(rig.blackboard.hungry);
    }

    #[test]
    fn unregistered_goal_fails_tree_construction() {
        let err = critter_tree(&GoalRegistry::new(), &BehaviorParams::default()).unwrap_err();
        assert!(matches!(err, CritterError::UnknownGoal(_)));
    }
}
