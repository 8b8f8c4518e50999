//! Behavior Tree Engine.
//!
//! Composes goals and sensing predicates into a tree that is re-ticked from
//! the root once per control cycle. Node statuses persist between ticks so
//! memory sequences can resume and selectors can tell which lower-priority
//! branch they are pre-empting.
//!
//! # Nodes
//!
//! | Node type | Description |
//! |-----------|-------------|
//! | [`sequence`][BehaviorNode::sequence] | Ticks children left-to-right, resuming at the child that was running last cycle. Fails on the first failure. |
//! | [`selector`][BehaviorNode::selector] | Priority selector without memory. Restarts from the first child every cycle; the first child that does not fail wins and every lower-priority child still active is stopped. |
//! | [`parallel`][BehaviorNode::parallel] | Ticks every child that has not yet succeeded. Succeeds once all have; a failing child is restarted next cycle. |
//! | [`condition`][BehaviorNode::condition] | Sensing predicate: success or failure, never running. |
//! | [`goal`][BehaviorNode::goal] | Runs a fresh [`Goal`] through a [`GoalHandle`]. A goal that faults is swapped for the idle fallback and the leaf keeps running until the fallback succeeds. |
//!
//! # Lifecycle
//!
//! Each node goes through *enter* (when ticked while not running), *update*
//! and *exit* (when the update did not return running). [`BehaviorNode::stop`]
//! invalidates a node and its subtree out of band, cancelling any running
//! goal so it can queue its safe-stop commands.
//!
//! # Pre-emption ordering
//!
//! A selector stops the branches it pre-empts *after* the winning child has
//! ticked, but the cancelled goals' safe-stop commands are moved in front of
//! the winner's commands in the [`Outbox`][crate::emitter::Outbox]. The
//! simulator therefore always sees `stop-turn` for the old branch before the
//! turn of the new one.
//!
//! # Example
//!
//! ```rust
//! use critter_runtime::behavior_tree::{BehaviorNode, NodeStatus};
//!
//! let tree = BehaviorNode::selector(
//!     "root",
//!     vec![
//!         BehaviorNode::condition("never", |_| false),
//!         BehaviorNode::condition("always", |_| true),
//!     ],
//! );
//! assert_eq!(tree.status(), NodeStatus::Invalid);
//! ```

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::goals::{Goal, GoalContext, GoalStatus};
use crate::scheduler::GoalHandle;

// ─────────────────────────────────────────────────────────────────────────────
// NodeStatus
// ─────────────────────────────────────────────────────────────────────────────

/// The execution status of a behavior tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Not ticked yet, or stopped.
    Invalid,
    /// Started but not finished.
    Running,
    Success,
    Failure,
}

impl From<GoalStatus> for NodeStatus {
    fn from(status: GoalStatus) -> Self {
        match status {
            GoalStatus::Running => NodeStatus::Running,
            GoalStatus::Success => NodeStatus::Success,
            GoalStatus::Failure => NodeStatus::Failure,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorNode
// ─────────────────────────────────────────────────────────────────────────────

type Predicate = Box<dyn FnMut(&mut GoalContext<'_>) -> bool + Send>;
type GoalBuilder = Box<dyn Fn() -> Goal + Send>;

enum NodeKind {
    Sequence {
        children: Vec<BehaviorNode>,
        current: usize,
    },
    Selector(Vec<BehaviorNode>),
    Parallel(Vec<BehaviorNode>),
    Condition(Predicate),
    Goal {
        build: GoalBuilder,
        fallback: Duration,
        handle: Option<GoalHandle>,
    },
}

/// A node in a behavior tree.
pub struct BehaviorNode {
    name: String,
    status: NodeStatus,
    kind: NodeKind,
}

impl fmt::Debug for BehaviorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorNode")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("children", &self.children())
            .finish()
    }
}

impl BehaviorNode {
    fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            status: NodeStatus::Invalid,
            kind,
        }
    }

    /// Sequence with memory.
    pub fn sequence(name: impl Into<String>, children: Vec<BehaviorNode>) -> Self {
        Self::new(
            name,
            NodeKind::Sequence {
                children,
                current: 0,
            },
        )
    }

    /// Priority selector without memory.
    pub fn selector(name: impl Into<String>, children: Vec<BehaviorNode>) -> Self {
        Self::new(name, NodeKind::Selector(children))
    }

    /// Parallel with the success-on-all policy.
    pub fn parallel(name: impl Into<String>, children: Vec<BehaviorNode>) -> Self {
        Self::new(name, NodeKind::Parallel(children))
    }

    /// Leaf evaluating `predicate` once per tick.
    pub fn condition(
        name: impl Into<String>,
        predicate: impl FnMut(&mut GoalContext<'_>) -> bool + Send + 'static,
    ) -> Self {
        Self::new(name, NodeKind::Condition(Box::new(predicate)))
    }

    /// Leaf running a goal. `build` is called on every entry, so each run
    /// starts from a fresh state machine.
    pub fn goal(name: impl Into<String>, build: impl Fn() -> Goal + Send + 'static) -> Self {
        Self::goal_with_fallback(name, Duration::ZERO, build)
    }

    /// Goal leaf that idles for `fallback` after a fault before succeeding.
    pub fn goal_with_fallback(
        name: impl Into<String>,
        fallback: Duration,
        build: impl Fn() -> Goal + Send + 'static,
    ) -> Self {
        Self::new(
            name,
            NodeKind::Goal {
                build: Box::new(build),
                fallback,
                handle: None,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Status after the most recent tick.
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn children(&self) -> &[BehaviorNode] {
        match &self.kind {
            NodeKind::Sequence { children, .. }
            | NodeKind::Selector(children)
            | NodeKind::Parallel(children) => children,
            NodeKind::Condition(_) | NodeKind::Goal { .. } => &[],
        }
    }

    /// Names of the goal leaves that currently own a live goal.
    pub fn running_goals(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_running(&mut out);
        out
    }

    fn collect_running<'s>(&'s self, out: &mut Vec<&'s str>) {
        match &self.kind {
            NodeKind::Goal {
                handle: Some(_), ..
            } => out.push(&self.name),
            _ => {
                for child in self.children() {
                    child.collect_running(out);
                }
            }
        }
    }

    /// Tick this node once.
    pub fn tick(&mut self, ctx: &mut GoalContext<'_>) -> NodeStatus {
        if self.status != NodeStatus::Running {
            self.enter();
        }
        let status = self.update(ctx);
        if status != NodeStatus::Running {
            self.exit();
        }
        self.status = status;
        status
    }

    /// Invalidate this node and its subtree, cancelling any running goal.
    pub fn stop(&mut self, ctx: &mut GoalContext<'_>) {
        if self.status == NodeStatus::Invalid {
            return;
        }
        match &mut self.kind {
            NodeKind::Sequence { children, current } => {
                for child in children.iter_mut() {
                    child.stop(ctx);
                }
                *current = 0;
            }
            NodeKind::Selector(children) | NodeKind::Parallel(children) => {
                for child in children.iter_mut() {
                    child.stop(ctx);
                }
            }
            NodeKind::Condition(_) => {}
            NodeKind::Goal { handle, .. } => {
                if let Some(mut running) = handle.take() {
                    info!(node = %self.name, goal = running.name(), "pre-empting goal");
                    running.cancel(ctx);
                }
            }
        }
        self.status = NodeStatus::Invalid;
    }

    fn enter(&mut self) {
        match &mut self.kind {
            NodeKind::Sequence { current, .. } => *current = 0,
            NodeKind::Goal {
                build,
                fallback,
                handle,
            } => {
                let goal = build();
                debug!(node = %self.name, goal = goal.name(), "starting goal");
                *handle = Some(GoalHandle::new(goal, *fallback));
            }
            // Children that finished in the previous run start over.
            NodeKind::Parallel(children) => {
                for child in children.iter_mut() {
                    if child.status != NodeStatus::Running {
                        child.status = NodeStatus::Invalid;
                    }
                }
            }
            NodeKind::Selector(_) | NodeKind::Condition(_) => {}
        }
    }

    fn exit(&mut self) {
        if let NodeKind::Goal { handle, .. } = &mut self.kind {
            *handle = None;
        }
    }

    fn update(&mut self, ctx: &mut GoalContext<'_>) -> NodeStatus {
        match &mut self.kind {
            NodeKind::Condition(predicate) => {
                if predicate(ctx) {
                    NodeStatus::Success
                } else {
                    NodeStatus::Failure
                }
            }

            NodeKind::Goal { handle, .. } => match handle {
                Some(h) => match h.poll(ctx) {
                    // The fault tick itself: the fallback runs from the next tick.
                    GoalStatus::Failure if h.has_faulted() && !h.is_finished() => {
                        NodeStatus::Running
                    }
                    status => status.into(),
                },
                None => NodeStatus::Failure,
            },

            NodeKind::Sequence { children, current } => {
                while let Some(child) = children.get_mut(*current) {
                    match child.tick(ctx) {
                        NodeStatus::Success => *current += 1,
                        other => return other,
                    }
                }
                NodeStatus::Success
            }

            NodeKind::Selector(children) => {
                for i in 0..children.len() {
                    let mark = ctx.actions.len();
                    let status = children[i].tick(ctx);
                    if status == NodeStatus::Failure {
                        continue;
                    }
                    let since = ctx.actions.len();
                    for lower in children[i + 1..].iter_mut() {
                        lower.stop(ctx);
                    }
                    ctx.actions.hoist(mark, since);
                    return status;
                }
                NodeStatus::Failure
            }

            NodeKind::Parallel(children) => {
                let mut all_done = true;
                for child in children.iter_mut() {
                    if child.status() == NodeStatus::Success {
                        continue;
                    }
                    if child.tick(ctx) != NodeStatus::Success {
                        all_done = false;
                    }
                }
                if all_done {
                    NodeStatus::Success
                } else {
                    NodeStatus::Running
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorTree
// ─────────────────────────────────────────────────────────────────────────────

/// A root node plus tick bookkeeping.
#[derive(Debug)]
pub struct BehaviorTree {
    root: BehaviorNode,
    ticks: u64,
}

impl BehaviorTree {
    pub fn new(root: BehaviorNode) -> Self {
        Self { root, ticks: 0 }
    }

    /// One full pass from the root.
    pub fn tick(&mut self, ctx: &mut GoalContext<'_>) -> NodeStatus {
        self.ticks += 1;
        let status = self.root.tick(ctx);
        debug!(tick = self.ticks, ?status, running = ?self.root.running_goals(), "tree ticked");
        status
    }

    /// Stop the whole tree, cancelling every running goal.
    pub fn stop(&mut self, ctx: &mut GoalContext<'_>) {
        self.root.stop(ctx);
    }

    pub fn root(&self) -> &BehaviorNode {
        &self.root
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
