//! modeward: mode governance for agents.
//!
//! An agent is always in exactly one of three modes: `operational`,
//! `companion` or `administrative`. modeward decides which, gates the tools
//! available in each, and keeps an append-only audit trail of every
//! privileged action.
//!
//! # Subsystems
//!
//! - `mode`: keyword-driven detection with fixed precedence
//!   (administrative > companion > operational > unchanged)
//! - `override`: authenticated, fail-closed mode override
//! - `constraints`: drift audit of declared behavioral constraints
//! - `proposal`: task description → structured proposal → validation report,
//!   plus configuration changes staged for operator review
//! - `diagnostics`: read-only health snapshot
//! - `doctor`: preflight checks of collaborator wiring
//! - `suggest`: companion suggestions
//! - `memory`: append-only notes, searched together with the audit log
//!
//! # State
//!
//! Everything modeward writes lives under `.modeward/` in the workspace root:
//! `audit.log`, `mode`, `notes.md` and `proposals/*.md`. Collaborator documents
//! (`agents/agent.yaml`, `channels/*.yaml`, `tools/`) are only read.
//!
//! # Examples
//!
//! ```bash
//! modeward mode detect "please debug the parser" --apply
//! MODEWARD_ADMIN_TOKEN=... modeward override administrative
//! modeward diagnostics --format json
//! modeward proposal generate "Expose a REST API endpoint" --save
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: errors, configuration, the `Mode` type, the audit log
//! - [`plugins`]: one module per subsystem

pub mod core;
pub mod plugins;

use crate::core::{
    audit::{self, FileAuditLog},
    config::Settings,
    error::ModewardError,
    mode::Mode,
    output,
    store::Store,
    time,
};
use crate::plugins::{
    constraints, diagnostics, doctor, memory, override_gate, proposal, suggest, transition,
};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "modeward",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mode governance and audit trail for agents"
)]
struct Cli {
    /// Workspace root (defaults to the current directory).
    #[clap(long, global = true)]
    root: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct AuditCli {
    #[clap(subcommand)]
    command: AuditCommand,
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Show the most recent audit entries.
    Tail {
        #[clap(long, default_value_t = 10)]
        limit: usize,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect and drive mode detection
    #[clap(name = "mode", visible_alias = "m")]
    Mode(transition::ModeCli),

    /// Force a mode with an operator token
    #[clap(name = "override")]
    Override(override_gate::OverrideCli),

    /// Audit declared behavioral constraints
    #[clap(name = "constraints", visible_alias = "c")]
    Constraints(constraints::ConstraintsCli),

    /// Generate and validate work proposals
    #[clap(name = "proposal", visible_alias = "p")]
    Proposal(proposal::ProposalCli),

    /// Read-only health snapshot
    #[clap(name = "diagnostics")]
    Diagnostics(diagnostics::DiagnosticsCli),

    /// Preflight checks
    #[clap(name = "doctor")]
    Doctor(doctor::DoctorCli),

    /// Gentle suggestion
    #[clap(name = "suggest")]
    Suggest(suggest::SuggestCli),

    /// Notes and search
    #[clap(name = "memory")]
    Memory(memory::MemoryCli),

    /// Read the audit log
    #[clap(name = "audit")]
    Audit(AuditCli),

    /// Print subsystem schemas as JSON
    #[clap(name = "schema")]
    Schema,
}

/// Refuse `tool` unless the persisted mode allows it.
pub fn require_tool(store: &Store, settings: &Settings, tool: &str) -> Result<Mode, ModewardError> {
    let mode = transition::ModeFile::new(&store.mode_path()).load();
    if settings.scopes.permits(mode, tool) {
        return Ok(mode);
    }
    let allowed = settings
        .scopes
        .by_tool()
        .get(tool)
        .map(|modes| {
            modes
                .iter()
                .map(Mode::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_else(|| "none".to_string());
    tracing::warn!(%mode, tool, "tool refused outside its mode");
    Err(ModewardError::InvalidInput(format!(
        "'{}' is not available in {} mode (allowed in: {})",
        tool, mode, allowed
    )))
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "modeward",
        "version": env!("CARGO_PKG_VERSION"),
        "generated_at": time::now_iso(),
        "subsystems": [
            transition::schema(),
            override_gate::schema(),
            constraints::schema(),
            proposal::schema(),
            diagnostics::schema(),
            doctor::schema(),
            suggest::schema(),
            memory::schema(),
        ]
    })
}

fn run_audit_cli(store: &Store, cli: AuditCli) -> Result<(), ModewardError> {
    match cli.command {
        AuditCommand::Tail { limit, format } => {
            let log = FileAuditLog::new(&store.audit_log_path());
            let entries = audit::tail(&log, limit)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            for e in &entries {
                println!(
                    "{}  {:<18} {:<14} {}{}",
                    time::iso(&e.timestamp),
                    e.kind.as_str(),
                    e.target_mode.map(|m| m.as_str()).unwrap_or("-"),
                    e.subject
                        .as_deref()
                        .map(|s| format!("[{}] ", output::compact_line(s, 40)))
                        .unwrap_or_default(),
                    e.outcome
                );
            }
        }
    }
    Ok(())
}

pub fn run() -> Result<(), ModewardError> {
    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let settings = Settings::load(&root)?;
    let store = Store::new(&root, &settings);
    tracing::debug!(root = %store.root.display(), state = %store.state_dir.display(), "workspace resolved");

    match cli.command {
        Command::Mode(c) => transition::run_mode_cli(&store, &settings, c),
        Command::Override(c) => override_gate::run_override_cli(&store, &settings, c),
        Command::Constraints(c) => {
            if matches!(c.command, constraints::ConstraintsCommand::Audit { .. }) {
                require_tool(&store, &settings, "constraint_audit")?;
            }
            constraints::run_constraints_cli(&store, &settings, c)
        }
        Command::Proposal(c) => {
            let tool = match c.command {
                proposal::ProposalCommand::Generate { .. } => "proposal_generator",
                proposal::ProposalCommand::Validate { .. } => "validation_workflow",
                proposal::ProposalCommand::Propose { .. } => "propose_config_change",
            };
            require_tool(&store, &settings, tool)?;
            proposal::run_proposal_cli(&store, &settings, c)
        }
        Command::Diagnostics(c) => {
            require_tool(&store, &settings, "system_diagnostics")?;
            diagnostics::run_diagnostics_cli(&store, &settings, c)
        }
        Command::Doctor(c) => doctor::run_doctor_cli(&store, &settings, c),
        Command::Suggest(c) => {
            require_tool(&store, &settings, "gentle_suggestion")?;
            suggest::run_suggest_cli(c)
        }
        Command::Memory(c) => {
            let tool = match c.command {
                memory::MemoryCommand::Query { .. } => "memory_query",
                memory::MemoryCommand::Write { .. } => "write_memory",
            };
            require_tool(&store, &settings, tool)?;
            memory::run_memory_cli(&store, c)
        }
        Command::Audit(c) => run_audit_cli(&store, c),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&schema())?);
            Ok(())
        }
    }
}
