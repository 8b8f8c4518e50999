//! `critter-runtime` – the goal-execution core.
//!
//! Decides, once per control cycle, which discrete command the critter should
//! send next and when a behavior has finished.
//!
//! # Modules
//!
//! - [`percept`] – [`PerceptStore`][percept::PerceptStore]: the latest sensor
//!   frame and body state, replaced whole on every ingest.
//! - [`blackboard`] – [`Blackboard`][blackboard::Blackboard]: hunger and
//!   detection flags shared between behaviors.
//! - [`emitter`] – [`Outbox`][emitter::Outbox] and the
//!   [`ActionEmitter`][emitter::ActionEmitter] seam to the transport.
//! - [`goals`] – the goal state machines and their step/cancel contract.
//! - [`registry`] – [`GoalRegistry`][registry::GoalRegistry]: string key to
//!   goal constructor.
//! - [`scheduler`] – [`GoalScheduler`][scheduler::GoalScheduler] and
//!   [`GoalHandle`][scheduler::GoalHandle]: cooperative stepping, cancellation
//!   and the fault boundary.
//! - [`behavior_tree`] – sequence, priority selector and parallel composites
//!   over goal and condition leaves.
//! - [`critter_tree`] – the critter's tree and sensing predicates.
//! - [`agent_loop`] – [`AgentLoop`][agent_loop::AgentLoop]: ingest, gating,
//!   directives and the tick timer.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing].

pub mod agent_loop;
pub mod behavior_tree;
pub mod blackboard;
pub mod critter_tree;
pub mod emitter;
pub mod goals;
pub mod percept;
pub mod registry;
pub mod scheduler;
pub mod telemetry;

#[cfg(test)]
mod testkit;

pub use agent_loop::{AgentLoop, AgentLoopConfig, ControlMode, SimState};
pub use behavior_tree::{BehaviorNode, BehaviorTree, NodeStatus};
pub use blackboard::Blackboard;
pub use emitter::{ActionEmitter, ChannelEmitter, Outbox};
pub use goals::{BehaviorParams, Goal, GoalContext, GoalError, GoalStatus};
pub use percept::PerceptStore;
pub use registry::GoalRegistry;
pub use scheduler::{GoalHandle, GoalScheduler};
pub use telemetry::{TracerProviderGuard, init_tracing};
