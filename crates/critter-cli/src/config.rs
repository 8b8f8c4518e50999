//! Run configuration – reads a TOML file such as `critter.toml`.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 4649
//!
//! [agent]            # forwarded verbatim as the initial_params message
//! name = "critter"
//!
//! [control]
//! mode = "tree"      # or "goal"
//! default_goal = "DoNothing"
//! tick_interval_ms = 100
//!
//! [behavior]
//! hunger_interval_secs = 15.0
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use critter_runtime::{AgentLoopConfig, BehaviorParams, ControlMode, GoalRegistry};
use critter_types::CritterError;
use serde::{Deserialize, Serialize};

/// Which decide step the agent starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    #[default]
    Tree,
    Goal,
}

impl std::str::FromStr for ModeSetting {
    type Err = CritterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tree" => Ok(ModeSetting::Tree),
            "goal" => Ok(ModeSetting::Goal),
            other => Err(CritterError::Config(format!(
                "unknown control mode '{other}' (expected 'tree' or 'goal')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default)]
    pub mode: ModeSetting,

    /// Registry key stepped when `mode = "goal"`.
    #[serde(default = "default_goal")]
    pub default_goal: String,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Fixed RNG seed; omit for a fresh seed every run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            mode: ModeSetting::default(),
            default_goal: default_goal(),
            tick_interval_ms: default_tick_interval_ms(),
            seed: None,
        }
    }
}

/// Everything the `critter` binary needs to start a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Free-form agent description sent to the simulator on connect.
    #[serde(default)]
    pub agent: toml::Table,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub behavior: BehaviorParams,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4649
}
fn default_goal() -> String {
    "DoNothing".to_string()
}
fn default_tick_interval_ms() -> u64 {
    100
}

impl Config {
    /// Websocket URL of the simulator.
    pub fn server_url(&self) -> String {
        format!("ws://{}:{}/", self.server.host, self.server.port)
    }

    /// The `[agent]` table as the JSON payload of the handshake.
    pub fn initial_params(&self) -> Result<serde_json::Value, CritterError> {
        serde_json::to_value(&self.agent)
            .map_err(|e| CritterError::Config(format!("[agent] is not representable as JSON: {e}")))
    }

    /// Reject configurations that cannot start a run.
    pub fn validate(&self, registry: &GoalRegistry) -> Result<(), CritterError> {
        if self.server.host.trim().is_empty() {
            return Err(CritterError::Config("server.host must not be empty".to_string()));
        }
        if self.control.tick_interval_ms == 0 {
            return Err(CritterError::Config(
                "control.tick_interval_ms must be positive".to_string(),
            ));
        }
        registry.validate(&self.control.default_goal)?;
        self.behavior.validate()
    }

    pub fn to_loop_config(&self) -> AgentLoopConfig {
        let mode = match self.control.mode {
            ModeSetting::Tree => ControlMode::Tree,
            ModeSetting::Goal => ControlMode::Goal(self.control.default_goal.clone()),
        };
        AgentLoopConfig {
            tick_interval: Duration::from_millis(self.control.tick_interval_ms),
            mode,
            params: self.behavior.clone(),
            seed: self.control.seed,
        }
    }
}

/// Load the config from `path` and apply environment overrides.
/// A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<Config, CritterError> {
    let mut cfg = read_from(path)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse `path` without looking at the environment.
pub(crate) fn read_from(path: &Path) -> Result<Config, CritterError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        CritterError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    toml::from_str(&raw).map_err(|e| {
        CritterError::Config(format!("failed to parse config at {}: {e}", path.display()))
    })
}

/// Apply `CRITTER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CRITTER_HOST` | `server.host` |
/// | `CRITTER_PORT` | `server.port` |
/// | `CRITTER_MODE` | `control.mode` |
/// | `CRITTER_GOAL` | `control.default_goal` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CRITTER_HOST") {
        cfg.server.host = v;
    }
    if let Ok(v) = std::env::var("CRITTER_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.server.port = port;
    }
    if let Ok(v) = std::env::var("CRITTER_MODE")
        && let Ok(mode) = v.parse::<ModeSetting>()
    {
        cfg.control.mode = mode;
    }
    if let Ok(v) = std::env::var("CRITTER_GOAL") {
        cfg.control.default_goal = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critter_runtime::goals::LostTargetPolicy;

    fn write(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("critter.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = read_from(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(cfg.server.port, 4649);
        assert_eq!(cfg.control.mode, ModeSetting::Tree);
        assert_eq!(cfg.behavior, BehaviorParams::default());
    }

    #[test]
    fn partial_file_keeps_field_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(
            &dir,
            r#"
            [server]
            port = 5000

            [agent]
            name = "Critter"
            speed = 2.5

            [control]
            mode = "goal"
            default_goal = "Avoid"
            seed = 9

            [behavior]
            hunger_interval_secs = 30.0
            lost_target = "stop"
            "#,
        );
        let cfg = read_from(&path).expect("load");

        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.control.mode, ModeSetting::Goal);
        assert_eq!(cfg.control.tick_interval_ms, 100);
        assert_eq!(cfg.behavior.hunger_interval_secs, 30.0);
        assert_eq!(cfg.behavior.lost_target, LostTargetPolicy::Stop);
        assert_eq!(cfg.behavior.forward_max, BehaviorParams::default().forward_max);

        let params = cfg.initial_params().expect("json");
        assert_eq!(params["name"], "Critter");
        assert_eq!(params["speed"], 2.5);

        let loop_cfg = cfg.to_loop_config();
        assert_eq!(loop_cfg.mode, ControlMode::Goal("Avoid".to_string()));
        assert_eq!(loop_cfg.seed, Some(9));
        assert_eq!(loop_cfg.tick_interval, Duration::from_millis(100));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = write(&dir, "[server\nport = ");
        assert!(matches!(read_from(&path), Err(CritterError::Config(_))));
    }

    #[test]
    fn validate_rejects_unknown_default_goal() {
        let mut cfg = Config::default();
        cfg.control.default_goal = "Dance".to_string();
        let err = cfg.validate(&GoalRegistry::standard()).unwrap_err();
        assert!(matches!(err, CritterError::UnknownGoal(_)));
    }

    #[test]
    fn validate_rejects_inverted_ranges() {
        let mut cfg = Config::default();
        cfg.behavior.turn_min_deg = 120.0;
        assert!(matches!(
            cfg.validate(&GoalRegistry::standard()),
            Err(CritterError::Config(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_tick_interval() {
        let mut cfg = Config::default();
        cfg.control.tick_interval_ms = 0;
        assert!(cfg.validate(&GoalRegistry::standard()).is_err());
        cfg.control.tick_interval_ms = 50;
        assert!(cfg.validate(&GoalRegistry::standard()).is_ok());
    }

    #[test]
    fn server_url_is_websocket() {
        let cfg = Config::default();
        assert_eq!(cfg.server_url(), "ws://127.0.0.1:4649/");
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Goal".parse::<ModeSetting>().unwrap(), ModeSetting::Goal);
        assert!("roam".parse::<ModeSetting>().is_err());
    }

    // Env vars are process-wide; keep every override check in one test.
    #[test]
    fn apply_env_overrides_changes_fields() {
        // SAFETY: no other test in this crate touches CRITTER_* variables.
        unsafe {
            std::env::set_var("CRITTER_HOST", "sim-host");
            std::env::set_var("CRITTER_PORT", "7000");
            std::env::set_var("CRITTER_MODE", "goal");
            std::env::set_var("CRITTER_GOAL", "ForwardStop");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.server.host, "sim-host");
        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.control.mode, ModeSetting::Goal);
        assert_eq!(cfg.control.default_goal, "ForwardStop");

        unsafe { std::env::set_var("CRITTER_PORT", "not-a-port") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.server.port, 4649);

        unsafe {
            std::env::remove_var("CRITTER_HOST");
            std::env::remove_var("CRITTER_PORT");
            std::env::remove_var("CRITTER_MODE");
            std::env::remove_var("CRITTER_GOAL");
        }
    }
}
