use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Geometry
// ─────────────────────────────────────────────────────────────────────────────

/// A point or Euler-angle triple in simulator world coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance between `self` and `other`.
    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Percepts
// ─────────────────────────────────────────────────────────────────────────────

/// One ray of the raycast sensor fan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// The simulator sends `0|1`; booleans are accepted as well.
    #[serde(deserialize_with = "deserialize_hit")]
    pub hit: bool,
    #[serde(default)]
    pub distance: f32,
    /// Tag of the object the ray hit, `None` when nothing was hit.
    #[serde(default)]
    pub tag: Option<String>,
    /// Bearing of the ray relative to the agent's heading, in degrees.
    #[serde(default)]
    pub angle: f32,
}

impl Ray {
    /// A ray that reports nothing.
    pub fn clear(angle: f32) -> Self {
        Self {
            angle,
            ..Self::default()
        }
    }

    /// A ray that hit an object carrying `tag`.
    pub fn tagged(tag: impl Into<String>, distance: f32, angle: f32) -> Self {
        Self {
            hit: true,
            distance,
            tag: Some(tag.into()),
            angle,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }
}

fn deserialize_hit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Hit {
        Flag(bool),
        Int(u8),
    }
    match Hit::deserialize(deserializer)? {
        Hit::Flag(b) => Ok(b),
        Hit::Int(0) => Ok(false),
        Hit::Int(1) => Ok(true),
        Hit::Int(n) => Err(serde::de::Error::custom(format!(
            "ray hit flag must be 0 or 1, got {n}"
        ))),
    }
}

/// The fixed-size fan of rays, indexed left to right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerceptFrame {
    rays: Vec<Ray>,
}

impl PerceptFrame {
    pub fn new(rays: Vec<Ray>) -> Self {
        Self { rays }
    }

    /// A frame of `n` rays that hit nothing, spread evenly over ±90°.
    pub fn empty(n: usize) -> Self {
        let rays = (0..n)
            .map(|i| {
                let angle = if n > 1 {
                    -90.0 + 180.0 * i as f32 / (n - 1) as f32
                } else {
                    0.0
                };
                Ray::clear(angle)
            })
            .collect();
        Self { rays }
    }

    pub fn len(&self) -> usize {
        self.rays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    pub fn ray(&self, index: usize) -> Option<&Ray> {
        self.rays.get(index)
    }

    /// Index of the ray pointing straight ahead.
    pub fn center_index(&self) -> usize {
        self.rays.len() / 2
    }

    pub fn any_hit(&self) -> bool {
        self.rays.iter().any(|r| r.hit)
    }

    /// Any hit among rays `[0, n/2)`.
    pub fn left_half_hit(&self) -> bool {
        self.rays[..self.center_index()].iter().any(|r| r.hit)
    }

    /// Any hit among rays `[n/2, n)`.
    pub fn right_half_hit(&self) -> bool {
        self.rays[self.center_index()..].iter().any(|r| r.hit)
    }

    pub fn any_tagged(&self, tag: &str) -> bool {
        self.rays.iter().any(|r| r.has_tag(tag))
    }

    /// Index of the leftmost ray whose hit carries `tag`.
    pub fn first_tagged(&self, tag: &str) -> Option<usize> {
        self.rays.iter().position(|r| r.has_tag(tag))
    }
}

/// Internal-state snapshot of the simulated body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Low-level actions the simulator reports as currently executing.
    #[serde(rename = "currentActions", alias = "activeActionLabels", default)]
    pub active_actions: BTreeSet<String>,
    #[serde(default)]
    pub speed: f32,
    #[serde(default)]
    pub position: Vec3,
    /// Euler angles in degrees; `y` is yaw and wraps in `[0, 360)`.
    #[serde(default)]
    pub rotation: Vec3,
}

impl AgentState {
    /// Yaw in degrees, normalised to `[0, 360)`.
    pub fn yaw(&self) -> f32 {
        self.rotation.y.rem_euclid(360.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound commands
// ─────────────────────────────────────────────────────────────────────────────

/// The discrete action vocabulary understood by the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Stop,
    TurnLeft,
    TurnRight,
    StopTurn,
    /// Domain-specific label forwarded verbatim.
    Other(String),
}

impl Action {
    /// The code the simulator expects on the wire.
    pub fn wire_code(&self) -> &str {
        match self {
            Action::Forward => "mf",
            Action::Stop => "stop",
            Action::TurnLeft => "tl",
            Action::TurnRight => "tr",
            Action::StopTurn => "nt",
            Action::Other(label) => label,
        }
    }

    pub fn from_wire(code: &str) -> Self {
        match code {
            "mf" => Action::Forward,
            "stop" => Action::Stop,
            "tl" => Action::TurnLeft,
            "tr" => Action::TurnRight,
            "nt" => Action::StopTurn,
            other => Action::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Forward => write!(f, "forward"),
            Action::Stop => write!(f, "stop"),
            Action::TurnLeft => write!(f, "turn-left"),
            Action::TurnRight => write!(f, "turn-right"),
            Action::StopTurn => write!(f, "stop-turn"),
            Action::Other(label) => write!(f, "{label}"),
        }
    }
}

/// A message sent to the simulator. Fire-and-forget: nothing correlates a
/// reply back to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "content")]
    pub payload: String,
}

impl Command {
    pub const ACTION: &'static str = "action";
    pub const INITIAL_PARAMS: &'static str = "initial_params";

    pub fn action(action: Action) -> Self {
        Self {
            kind: Self::ACTION.to_string(),
            payload: action.wire_code().to_string(),
        }
    }

    /// The handshake message carrying the agent parameters as a JSON string.
    pub fn initial_params(json: impl Into<String>) -> Self {
        Self {
            kind: Self::INITIAL_PARAMS.to_string(),
            payload: json.into(),
        }
    }

    /// Decode the payload of an `action` command.
    pub fn as_action(&self) -> Option<Action> {
        (self.kind == Self::ACTION).then(|| Action::from_wire(&self.payload))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound control
// ─────────────────────────────────────────────────────────────────────────────

/// Simulation lifecycle signal governing whether the control loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The simulator is connected and listening.
    Ready,
    /// Simulation paused.
    Hold,
    /// Simulation running.
    Start,
    /// The simulator could not create the agent.
    Error,
}

impl ControlSignal {
    pub fn from_wire(content: &str) -> Option<Self> {
        match content {
            "connection_ready" | "ready" => Some(Self::Ready),
            "on_hold" | "hold" => Some(Self::Hold),
            "start" => Some(Self::Start),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A `command:argument` instruction selecting what the agent should run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub command: String,
    pub argument: String,
}

impl Directive {
    pub fn parse(raw: &str) -> Result<Self, CritterError> {
        let mut parts = raw.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(command), Some(argument), None)
                if !command.trim().is_empty() && !argument.trim().is_empty() =>
            {
                Ok(Self {
                    command: command.trim().to_string(),
                    argument: argument.trim().to_string(),
                })
            }
            _ => Err(CritterError::Malformed(format!(
                "directive must look like `command:argument`, got {raw:?}"
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error type shared by every crate in the workspace.
///
/// Only [`CritterError::Transport`] and [`CritterError::SimulatorRejected`]
/// are fatal to a run; everything else degrades locally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CritterError {
    #[error("Transport Fault: {0}")]
    Transport(String),

    #[error("Malformed Message: {0}")]
    Malformed(String),

    #[error("Unknown Goal: {0}")]
    UnknownGoal(String),

    #[error("Unknown Directive: {command}:{argument}")]
    UnknownDirective { command: String, argument: String },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Simulator rejected the agent")]
    SimulatorRejected,
}

impl CritterError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CritterError::Transport(_) | CritterError::SimulatorRejected
        )
    }
}
