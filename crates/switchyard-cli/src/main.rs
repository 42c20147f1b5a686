//! `switchyard` – inspect and exercise responder topologies.
//!
//! ```text
//! switchyard check topology.toml
//! switchyard send topology.toml greet --policy all --body '{"who":"bob"}'
//! switchyard config
//! ```
//!
//! Command output goes to stdout; logs go to stderr (see [`telemetry`]).

mod config;
mod telemetry;
mod topology;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::{Value, json};
use switchyard_dispatch::Respondable;
use switchyard_types::{Event, SwitchyardError};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::Config;
use crate::topology::{Topology, Verdict};

#[derive(Parser, Debug)]
#[command(name = "switchyard", version, disable_help_subcommand = true)]
struct Cli {
    /// Read settings from this file instead of `~/.switchyard/config.toml`.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a topology and report protocol conformance.
    Check {
        topology: PathBuf,
    },
    /// Dispatch one event through a chain and print the results as JSON.
    Send {
        topology: PathBuf,
        /// Event kind (the selector to invoke).
        kind: String,
        /// Chain to dispatch through; defaults to the first declared chain.
        #[arg(long)]
        chain: Option<String>,
        #[arg(long, value_enum, default_value_t = Policy::First)]
        policy: Policy,
        /// Member name for `named`, type name for `type`.
        #[arg(long)]
        target: Option<String>,
        /// JSON message body.
        #[arg(long)]
        body: Option<String>,
    },
    /// Print the effective configuration.
    Config {
        /// Also write it to the config path.
        #[arg(long)]
        write: bool,
    },
}

/// Dispatch policy for `send`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
enum Policy {
    /// First responder, in priority order, that handles the event.
    #[default]
    First,
    /// Every responder that handles the event.
    All,
    /// Only the member with the target name.
    Named,
    /// Every member whose type is the target.
    Type,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Switchyard(#[from] SwitchyardError),
    #[error("--body is not valid JSON: {0}")]
    InvalidBody(serde_json::Error),
    #[error("chain '{0}' is not declared in the topology")]
    UnknownChain(String),
    #[error("the topology declares no chains")]
    NoChains,
    #[error("--policy {0} requires --target")]
    MissingTarget(&'static str),
    #[error("failed to render output: {0}")]
    Render(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = telemetry::init_tracing("switchyard");

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let cfg = config::load_or_default(&path)?;
    colored::control::set_override(cfg.color);
    debug!(path = %path.display(), ?cfg, "configuration loaded");

    match cli.command {
        Command::Check { topology } => run_check(&Topology::load(&topology, &cfg)?),
        Command::Send {
            topology,
            kind,
            chain,
            policy,
            target,
            body,
        } => {
            let topology = Topology::load(&topology, &cfg)?;
            let event = build_event(kind, body.as_deref())?;
            let output = send(&topology, chain.as_deref(), policy, target.as_deref(), &event)?;
            println!("{output:#}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { write } => {
            let raw = toml::to_string_pretty(&cfg).map_err(|e| AppError::Render(e.to_string()))?;
            println!("{}", format!("# {}", path.display()).dimmed());
            print!("{raw}");
            if write {
                config::save_to(&cfg, &path)?;
                eprintln!("{} wrote {}", "✓".green(), path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_check(topology: &Topology) -> Result<ExitCode, AppError> {
    let mut failed = false;

    let protocols = topology.registry().names();
    println!("{} ({})", "Protocols".bold(), protocols.len());
    for name in &protocols {
        let verifier = if topology.registry().has_verifier(name) { " +verifier" } else { "" };
        println!("  • {name}{}", verifier.dimmed());
    }

    println!("{}", "Conformance".bold());
    for report in topology.conformance() {
        let mark = if report.is_ok() { "✓".green() } else { "✗".red() };
        let detail = if !report.known {
            "unknown protocol".red().to_string()
        } else if !report.missing.is_empty() {
            format!("missing {}", report.missing.join(", ")).red().to_string()
        } else {
            match &report.verdict {
                Verdict::Passed => "verified".green().to_string(),
                Verdict::NoVerifier => "valid (no verifier)".normal().to_string(),
                Verdict::Rejected(reason) => format!("rejected: {reason}").red().to_string(),
            }
        };
        println!("  {mark} {} → {}: {detail}", report.responder.bold(), report.protocol);
        failed |= !report.is_ok();
    }

    println!("{}", "Chains".bold());
    for name in topology.chain_names() {
        if let Some(chain) = topology.chain(name) {
            let members: Vec<String> = chain
                .members()
                .iter()
                .map(|m| format!("{}({})", m.name, m.priority))
                .collect();
            println!("  • {} [{}]", name.bold(), members.join(", "));
        }
    }

    for rejection in topology.rejections() {
        println!(
            "  {} {} not admitted to {}: {}",
            "✗".red(),
            rejection.member.bold(),
            rejection.chain,
            rejection.error
        );
        failed = true;
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build_event(kind: String, body: Option<&str>) -> Result<Event, AppError> {
    let event = match body {
        Some(raw) => Event::message(kind, serde_json::from_str(raw).map_err(AppError::InvalidBody)?),
        None => Event::new(kind),
    };
    Ok(event.with_source("switchyard-cli"))
}

fn send(
    topology: &Topology,
    chain: Option<&str>,
    policy: Policy,
    target: Option<&str>,
    event: &Event,
) -> Result<Value, AppError> {
    let chain = match chain {
        Some(name) => topology
            .chain(name)
            .ok_or_else(|| AppError::UnknownChain(name.to_string()))?,
        None => topology.default_chain().ok_or(AppError::NoChains)?,
    };
    debug!(chain = %Respondable::name(&**chain), kind = %event.kind, ?policy, "dispatching");

    let render = |v: Result<Value, serde_json::Error>| v.map_err(|e| AppError::Render(e.to_string()));
    match policy {
        Policy::First => render(serde_json::to_value(chain.send_first(event))),
        Policy::All => render(serde_json::to_value(chain.send_all(event))),
        Policy::Type => {
            let type_name = target.ok_or(AppError::MissingTarget("type"))?;
            render(serde_json::to_value(chain.send_type(type_name, event)))
        }
        Policy::Named => {
            let name = target.ok_or(AppError::MissingTarget("named"))?;
            let outcome = chain.send_named(name, event);
            let (found, invoked) = (outcome.found(), outcome.invoked());
            let result = render(serde_json::to_value(outcome.into_event()))?;
            Ok(json!({ "found": found, "invoked": invoked, "result": result }))
        }
    }
}
