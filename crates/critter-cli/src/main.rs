//! `critter-cli` – starts a critter agent against a running simulator.
//!
//! 1. Parses the command line and loads the TOML run configuration
//!    (`critter.toml` by default; a missing file means defaults).
//! 2. Connects to the simulator websocket and sends the `[agent]` table as
//!    the `initial_params` handshake.
//! 3. Runs the control loop until **Ctrl-C**, a transport fault or the
//!    simulator rejecting the agent. In-flight goals are cancelled and their
//!    stop commands flushed before the socket closes.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use critter_middleware::SimLink;
use critter_runtime::{AgentLoop, ChannelEmitter, GoalRegistry, init_tracing};
use critter_types::CritterError;

use crate::config::{Config, ModeSetting};

#[derive(Debug, Parser)]
#[command(name = "critter", version, about = "Autonomous critter agent for the simulator")]
struct Cli {
    /// Path to the TOML run configuration.
    #[arg(short, long, default_value = "critter.toml")]
    config: PathBuf,

    /// Start in `tree` or `goal` mode, overriding the configuration.
    #[arg(long)]
    mode: Option<ModeSetting>,

    /// Goal stepped in `goal` mode, overriding the configuration.
    #[arg(long)]
    goal: Option<String>,

    /// Fixed RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Validate the configuration, print it and exit.
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _tracing = init_tracing("critter");

    print_banner();

    let cfg = match prepare(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("  {}: {e}", "Config error".red().bold());
            return ExitCode::FAILURE;
        }
    };
    print_summary(&cli, &cfg);
    if cli.check {
        println!("  {}", "✓ Configuration is valid.".green());
        return ExitCode::SUCCESS;
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the critter …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the agent can only be stopped by the simulator");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start the Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg, shutdown_rx)) {
        Ok(()) => {
            println!("{}", "  ✓ Critter stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "critter run ended with an error");
            eprintln!("  {}: {e}", "Run failed".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Load the configuration, fold in command-line overrides and validate.
fn prepare(cli: &Cli) -> Result<Config, CritterError> {
    let mut cfg = config::load_from(&cli.config)?;
    if let Some(mode) = cli.mode {
        cfg.control.mode = mode;
    }
    if let Some(goal) = &cli.goal {
        cfg.control.default_goal = goal.clone();
    }
    if cli.seed.is_some() {
        cfg.control.seed = cli.seed;
    }
    cfg.validate(&GoalRegistry::standard())?;
    Ok(cfg)
}

async fn run(cfg: Config, shutdown: watch::Receiver<bool>) -> Result<(), CritterError> {
    let initial_params = cfg.initial_params()?;
    let link = SimLink::connect(&cfg.server_url(), &initial_params).await?;
    let (inbound, commands, tasks) = link.into_parts();

    let mut agent = match AgentLoop::new(cfg.to_loop_config(), Box::new(ChannelEmitter::new(commands))) {
        Ok(agent) => agent,
        Err(e) => {
            tasks.close().await;
            return Err(e);
        }
    };
    let outcome = agent.run(inbound, shutdown).await;

    // The writer only finishes once the last command sender is gone.
    drop(agent);
    tasks.close().await;
    info!(ok = outcome.is_ok(), "agent finished");
    outcome
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ______     _ __  __           "#.bold().green());
    println!("{}", r#"  / ____/____(_) /_/ /____  _____"#.bold().green());
    println!("{}", r#" / /   / ___/ / __/ __/ _ \/ ___/"#.bold().green());
    println!("{}", r#"/ /___/ /  / / /_/ /_/  __/ /    "#.bold().green());
    println!("{}", r#"\____/_/  /_/\__/\__/\___/_/     "#.bold().green());
    println!();
    println!(
        "  {} {}",
        "Critter".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Behavior-tree agent for the critter simulator");
    println!();
}

fn print_summary(cli: &Cli, cfg: &Config) {
    let source = if cli.config.exists() {
        cli.config.display().to_string()
    } else {
        "defaults".to_string()
    };
    println!("  Config      {}", source.bold());
    println!("  Simulator   {}", cfg.server_url().cyan());
    match cfg.control.mode {
        ModeSetting::Tree => println!("  Mode        {}", "behavior tree".bold()),
        ModeSetting::Goal => println!(
            "  Mode        {} {}",
            "single goal".bold(),
            cfg.control.default_goal.cyan()
        ),
    }
    println!("  Tick        {} ms", cfg.control.tick_interval_ms);
    println!();
}
