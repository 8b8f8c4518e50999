//! Outbound command path.
//!
//! Goals never talk to the transport directly. During a tick they push
//! [`Action`]s into an [`Outbox`]; at the end of the tick the control loop
//! flushes the outbox, in order, into an [`ActionEmitter`]. Buffering for the
//! length of one tick is what lets a pre-empting selector place the safe-stop
//! commands of the branch it cancelled *ahead* of the commands the new branch
//! already emitted (see [`Outbox::hoist`]).

use critter_types::{Action, Command, CritterError};
use tokio::sync::mpsc;
use tracing::debug;

/// Sink for commands bound for the simulator.
///
/// `emit` must return immediately; implementations preserve submission order.
pub trait ActionEmitter: Send {
    fn emit(&mut self, command: Command) -> Result<(), CritterError>;
}

/// [`ActionEmitter`] feeding the link's writer task.
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<Command>,
}

impl ChannelEmitter {
    pub fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }
}

impl ActionEmitter for ChannelEmitter {
    fn emit(&mut self, command: Command) -> Result<(), CritterError> {
        self.tx
            .send(command)
            .map_err(|_| CritterError::Transport("command channel closed".to_string()))
    }
}

/// Ordered buffer of the commands produced during one tick.
#[derive(Debug, Default)]
pub struct Outbox {
    commands: Vec<Command>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        debug!(action = %action, "queueing action");
        self.commands.push(Command::action(action));
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The queued action commands, decoded.
    pub fn actions(&self) -> Vec<Action> {
        self.commands.iter().filter_map(Command::as_action).collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Move the commands queued at or after `since` so they sit at `mark`,
    /// ahead of everything queued in `mark..since`. Relative order inside
    /// each group is kept.
    pub fn hoist(&mut self, mark: usize, since: usize) {
        let len = self.commands.len();
        if mark >= since || since >= len {
            return;
        }
        self.commands[mark..].rotate_right(len - since);
    }

    /// Hand every queued command to `emitter`, oldest first.
    ///
    /// Returns the number of commands sent. Stops at the first failure; the
    /// outbox is empty afterwards either way.
    pub fn flush_into(&mut self, emitter: &mut dyn ActionEmitter) -> Result<usize, CritterError> {
        let mut sent = 0;
        for command in self.commands.drain(..) {
            emitter.emit(command)?;
            sent += 1;
        }
        Ok(sent)
    }
}
