//! [`AgentLoop`] – the single control loop.
//!
//! One loop owns every piece of mutable agent state and alternates between
//! two kinds of work, never both at once:
//!
//! 1. **Ingest** – an [`Inbound`] message from the simulator link is applied:
//!    sensor frames replace the [`PerceptStore`] snapshot, control signals
//!    gate ticking, directives switch the control mode.
//! 2. **Decide** – on every tick of the interval timer, either the behavior
//!    tree is ticked from the root or the single active goal is stepped once.
//!
//! Commands queued while handling either kind of work are flushed to the
//! [`ActionEmitter`] in order before the loop waits again.
//!
//! # Gating
//!
//! Nothing is decided until the simulator has sent `connection_ready`, the
//! simulation is started and at least one sensor frame has arrived. `on_hold`
//! pauses ticking without cancelling anything; `start` resumes where the
//! goals left off.
//!
//! # Directives
//!
//! | Directive | Effect |
//! |---|---|
//! | `goal:<Key>` | Stop the tree (or the previous goal) and run the registered goal `<Key>` alone. |
//! | `tree:critter` | Cancel the single goal and return to the behavior tree. |

use std::time::{Duration, Instant};

use critter_middleware::Inbound;
use critter_types::{ControlSignal, CritterError, Directive};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::behavior_tree::BehaviorTree;
use crate::blackboard::Blackboard;
use crate::critter_tree::critter_tree;
use crate::emitter::{ActionEmitter, Outbox};
use crate::goals::{BehaviorParams, GoalContext};
use crate::percept::PerceptStore;
use crate::registry::GoalRegistry;
use crate::scheduler::GoalScheduler;

/// Scheduler key of the goal run in [`ControlMode::Goal`].
const MAIN_GOAL: &str = "main";

/// Only tree the `tree:` directive knows.
const CRITTER_TREE: &str = "critter";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// What the decide step drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMode {
    /// Tick the critter behavior tree.
    Tree,
    /// Step the registered goal with this key.
    Goal(String),
}

/// Simulation lifecycle as reported by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    OnHold,
    Running,
}

/// Configuration bundle for [`AgentLoop`].
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub tick_interval: Duration,
    pub mode: ControlMode,
    pub params: BehaviorParams,
    /// Fixed RNG seed for reproducible runs; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            mode: ControlMode::Tree,
            params: BehaviorParams::default(),
            seed: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// World
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a goal can read or write, kept apart from the scheduler and
/// the tree so both can borrow it at the same time.
struct World {
    percepts: PerceptStore,
    blackboard: Blackboard,
    outbox: Outbox,
    rng: SmallRng,
}

impl World {
    fn ctx(&mut self, now: Instant) -> GoalContext<'_> {
        GoalContext {
            percepts: &self.percepts,
            blackboard: &mut self.blackboard,
            actions: &mut self.outbox,
            rng: &mut self.rng,
            now,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────────────────────────────────────

pub struct AgentLoop {
    world: World,
    registry: GoalRegistry,
    params: BehaviorParams,
    scheduler: GoalScheduler,
    tree: BehaviorTree,
    mode: ControlMode,
    sim_state: SimState,
    connection_ready: bool,
    tick_interval: Duration,
    emitter: Box<dyn ActionEmitter>,
}

impl AgentLoop {
    /// Build the loop and validate its configuration.
    ///
    /// # Errors
    ///
    /// [`CritterError::Config`] for invalid tuning and
    /// [`CritterError::UnknownGoal`] when the configured goal is not
    /// registered.
    pub fn new(
        config: AgentLoopConfig,
        emitter: Box<dyn ActionEmitter>,
    ) -> Result<Self, CritterError> {
        config.params.validate()?;
        let registry = GoalRegistry::standard();
        let tree = critter_tree(&registry, &config.params)?;
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let mut agent = Self {
            world: World {
                percepts: PerceptStore::new(),
                blackboard: Blackboard::new(config.params.start_hungry),
                outbox: Outbox::new(),
                rng,
            },
            registry,
            scheduler: GoalScheduler::new(config.params.idle_dwell()),
            params: config.params,
            tree,
            mode: ControlMode::Tree,
            sim_state: SimState::OnHold,
            connection_ready: false,
            tick_interval: config.tick_interval,
            emitter,
        };
        agent.set_mode(config.mode, Instant::now())?;
        Ok(agent)
    }

    pub fn mode(&self) -> &ControlMode {
        &self.mode
    }

    pub fn sim_state(&self) -> SimState {
        self.sim_state
    }

    pub fn is_connection_ready(&self) -> bool {
        self.connection_ready
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.world.blackboard
    }

    pub fn percepts(&self) -> &PerceptStore {
        &self.world.percepts
    }

    /// Apply one message from the simulator.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: the link went away
    /// ([`CritterError::Transport`]) or the simulator refused the agent
    /// ([`CritterError::SimulatorRejected`]). Anything else is logged and
    /// dropped.
    pub fn handle_inbound(&mut self, msg: Inbound, now: Instant) -> Result<(), CritterError> {
        match msg {
            Inbound::Sensor { frame, state } => {
                if let Err(e) = self.world.percepts.ingest(frame, state) {
                    warn!(error = %e, "dropping sensor frame");
                }
            }
            Inbound::Control(signal) => self.apply_control(signal)?,
            Inbound::Directive(directive) => {
                if let Err(e) = self.apply_directive(&directive, now) {
                    warn!(error = %e, "ignoring directive");
                }
            }
            Inbound::Disconnected(reason) => return Err(CritterError::Transport(reason)),
        }
        self.flush()
    }

    /// Run one decide step if the loop is allowed to.
    ///
    /// Returns `Ok(false)` when the step was skipped by gating.
    pub fn tick(&mut self, now: Instant) -> Result<bool, CritterError> {
        if !self.connection_ready
            || self.sim_state != SimState::Running
            || self.world.percepts.frames_seen() == 0
        {
            return Ok(false);
        }
        let mut ctx = self.world.ctx(now);
        match &self.mode {
            ControlMode::Tree => {
                self.tree.tick(&mut ctx);
            }
            ControlMode::Goal(_) => {
                self.scheduler.pass(&mut ctx);
            }
        }
        self.flush()?;
        Ok(true)
    }

    /// Cancel every running goal and flush their safe-stop commands.
    ///
    /// Flushing is best effort: a dead link is logged, not returned.
    pub fn shutdown(&mut self, now: Instant) {
        info!("shutting down control loop");
        let mut ctx = self.world.ctx(now);
        self.tree.stop(&mut ctx);
        self.scheduler.cancel_all(&mut ctx);
        if let Err(e) = self.flush() {
            warn!(error = %e, "could not deliver safe-stop commands");
        }
    }

    /// Drive the loop until `shutdown` flips, the link drops or the
    /// simulator rejects the agent. Goals are always cancelled on the way
    /// out.
    pub async fn run(
        &mut self,
        mut inbound: mpsc::Receiver<Inbound>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), CritterError> {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(mode = ?self.mode, tick_ms = self.tick_interval.as_millis() as u64, "control loop started");

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("shutdown requested");
                    break Ok(());
                }
                msg = inbound.recv() => match msg {
                    Some(msg) => {
                        if let Err(e) = self.handle_inbound(msg, Instant::now()) {
                            break Err(e);
                        }
                    }
                    None => break Err(CritterError::Transport("inbound channel closed".to_string())),
                },
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Instant::now()) {
                        break Err(e);
                    }
                }
            }
        };

        self.shutdown(Instant::now());
        outcome
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn apply_control(&mut self, signal: ControlSignal) -> Result<(), CritterError> {
        match signal {
            ControlSignal::Ready => {
                info!("simulator connection ready");
                self.connection_ready = true;
            }
            ControlSignal::Hold => {
                info!("simulation on hold");
                self.sim_state = SimState::OnHold;
            }
            ControlSignal::Start => {
                info!("simulation started");
                self.sim_state = SimState::Running;
            }
            ControlSignal::Error => return Err(CritterError::SimulatorRejected),
        }
        Ok(())
    }

    fn apply_directive(&mut self, directive: &Directive, now: Instant) -> Result<(), CritterError> {
        let mode = match (directive.command.as_str(), directive.argument.as_str()) {
            ("goal", key) => {
                self.registry.validate(key)?;
                ControlMode::Goal(key.to_string())
            }
            ("tree", CRITTER_TREE) => ControlMode::Tree,
            (command, argument) => {
                return Err(CritterError::UnknownDirective {
                    command: command.to_string(),
                    argument: argument.to_string(),
                });
            }
        };
        self.set_mode(mode, now)
    }

    fn set_mode(&mut self, mode: ControlMode, now: Instant) -> Result<(), CritterError> {
        let mut ctx = self.world.ctx(now);
        match &mode {
            ControlMode::Tree => {
                if self.mode == ControlMode::Tree {
                    debug!("already running the behavior tree");
                    return Ok(());
                }
                self.scheduler.cancel_all(&mut ctx);
            }
            ControlMode::Goal(key) => {
                let goal = self.registry.build(key, &self.params)?;
                self.tree.stop(&mut ctx);
                self.scheduler.activate(MAIN_GOAL, goal, &mut ctx);
            }
        }
        info!(from = ?self.mode, to = ?mode, "switching control mode");
        self.mode = mode;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CritterError> {
        let sent = self.world.outbox.flush_into(self.emitter.as_mut())?;
        if sent > 0 {
            debug!(sent, "flushed commands");
        }
        Ok(())
    }
}
