//! [`GoalRegistry`] – goal lookup by name.
//!
//! Directives from the simulator and the CLI name goals by string key
//! (`goal:ForwardDist`). The registry maps each key to a constructor that
//! builds a fresh [`Goal`] from the current [`BehaviorParams`]. Building a
//! new instance per activation means no state leaks between runs.
//!
//! | Key | Goal |
//! |---|---|
//! | `DoNothing` | [`Idle`] |
//! | `ForwardStop` | [`ForwardStop`] |
//! | `ForwardDist` | [`ForwardDistance`] with a random target |
//! | `Turn` | [`TurnByAngle`] with random angle and side |
//! | `Avoid` | [`ObstacleAvoidance`] |
//! | `EatFlower` | [`EatFlower`] |
//! | `FollowAstronaut` | [`FollowAstronaut`] |

use std::collections::BTreeMap;
use std::fmt;

use critter_types::CritterError;

use crate::goals::{
    Angle, BehaviorParams, Distance, EatFlower, FollowAstronaut, ForwardDistance, ForwardStop,
    Goal, Idle, ObstacleAvoidance, TurnByAngle,
};

/// Builds a goal from the current tuning.
pub type GoalFactory = fn(&BehaviorParams) -> Goal;

#[derive(Clone, Default)]
pub struct GoalRegistry {
    factories: BTreeMap<String, GoalFactory>,
}

impl fmt::Debug for GoalRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

impl GoalRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in goal.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("DoNothing", |p| Idle::new(p.idle_dwell()).into());
        registry.register("ForwardStop", |_| ForwardStop::new().into());
        registry.register("ForwardDist", |p| {
            ForwardDistance::new(Distance::Random {
                min: p.forward_min,
                max: p.forward_max,
            })
            .into()
        });
        registry.register("Turn", |p| {
            TurnByAngle::new(
                Angle::Random {
                    min: p.turn_min_deg,
                    max: p.turn_max_deg,
                },
                None,
            )
            .into()
        });
        registry.register("Avoid", |p| {
            ObstacleAvoidance::new(p.avoid_rotation_deg, p.avoid_tie_break).into()
        });
        registry.register("EatFlower", |p| EatFlower::new(p.eat_dwell()).into());
        registry.register("FollowAstronaut", |p| {
            FollowAstronaut::new(p.follow_max_angle_deg, p.lost_target).into()
        });
        registry
    }

    /// Register `factory` under `key`, replacing any previous entry.
    pub fn register(&mut self, key: impl Into<String>, factory: GoalFactory) {
        self.factories.insert(key.into(), factory);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Check that `key` names a registered goal.
    ///
    /// # Errors
    ///
    /// [`CritterError::UnknownGoal`] listing the valid keys.
    pub fn validate(&self, key: &str) -> Result<(), CritterError> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(self.unknown(key))
        }
    }

    /// The constructor registered under `key`.
    pub fn factory(&self, key: &str) -> Result<GoalFactory, CritterError> {
        self.factories
            .get(key)
            .copied()
            .ok_or_else(|| self.unknown(key))
    }

    /// Construct a fresh instance of the goal registered under `key`.
    pub fn build(&self, key: &str, params: &BehaviorParams) -> Result<Goal, CritterError> {
        Ok(self.factory(key)?(params))
    }

    fn unknown(&self, key: &str) -> CritterError {
        CritterError::UnknownGoal(format!(
            "{key} (known: {})",
            self.keys().collect::<Vec<_>>().join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_builds_every_goal() {
        let registry = GoalRegistry::standard();
        let params = BehaviorParams::default();
        let names: Vec<&str> = registry
            .keys()
            .map(|k| registry.build(k, &params).unwrap().name())
            .collect();
        assert_eq!(names.len(), 7);
        assert!(names.contains(&"ObstacleAvoidance"));
        assert!(names.contains(&"FollowAstronaut"));
    }

    #[test]
    fn unknown_key_is_rejected_with_known_keys() {
        let registry = GoalRegistry::standard();
        let err = registry.build("Fly", &BehaviorParams::default()).unwrap_err();
        match err {
            CritterError::UnknownGoal(msg) => {
                assert!(msg.starts_with("Fly"));
                assert!(msg.contains("Avoid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn keys_are_case_sensitive() {
        let registry = GoalRegistry::standard();
        assert!(registry.contains("Turn"));
        assert!(!registry.contains("turn"));
    }
}
