//! Diagnostics: read-only health snapshot.
//!
//! Composes process uptime, audit log metadata, proposal artifact counts,
//! tool availability, channel summaries and a fresh compliance audit. Nothing
//! here writes state, and every check degrades to a sentinel or empty value
//! instead of failing.

use crate::core::audit::{AuditLog, FileAuditLog};
use crate::core::config::Settings;
use crate::core::error::ModewardError;
use crate::core::mode::Mode;
use crate::core::output;
use crate::core::store::Store;
use crate::core::time;
use crate::plugins::collaborators;
use crate::plugins::constraints::{ComplianceEngine, ComplianceReport};
use crate::plugins::proposal;
use crate::plugins::transition::ModeFile;
use clap::Parser;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

pub const UPTIME_UNAVAILABLE: f64 = -1.0;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Record the process start. Only the first call has any effect.
pub fn mark_process_start() {
    PROCESS_START.get_or_init(Instant::now);
}

/// Seconds since [`mark_process_start`], or [`UPTIME_UNAVAILABLE`].
pub fn uptime_seconds() -> f64 {
    PROCESS_START
        .get()
        .map(|start| start.elapsed().as_secs_f64())
        .unwrap_or(UPTIME_UNAVAILABLE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeStability {
    Stable,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolAvailability {
    Available,
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogStats {
    pub path: String,
    pub exists: bool,
    pub bytes: u64,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposalStats {
    pub dir: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub name: String,
    pub adapter: Option<String>,
    pub allowed_modes: Vec<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    pub timestamp: String,
    pub mode: Mode,
    pub mode_stability: ModeStability,
    pub uptime_s: f64,
    pub audit_log: AuditLogStats,
    pub proposals: ProposalStats,
    pub tools: BTreeMap<String, ToolAvailability>,
    pub channels: Vec<ChannelSummary>,
    pub constraints: ComplianceReport,
}

pub fn audit_log_stats(path: &Path) -> AuditLogStats {
    let bytes = std::fs::metadata(path).map(|m| m.len()).ok();
    let entries = FileAuditLog::new(path).len().unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "audit log unreadable");
        0
    });
    AuditLogStats {
        path: path.display().to_string(),
        exists: bytes.is_some(),
        bytes: bytes.unwrap_or(0),
        entries,
    }
}

/// Availability by file stem, so `tools/memory_query.py` and
/// `tools/memory_query.rs` both satisfy `memory_query`.
pub fn tool_availability(
    tools_dir: &Path,
    expected: &[String],
) -> BTreeMap<String, ToolAvailability> {
    let stems: BTreeSet<String> = std::fs::read_dir(tools_dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .filter_map(|e| {
                    e.path()
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default();
    expected
        .iter()
        .map(|tool| {
            let status = if stems.contains(tool) {
                ToolAvailability::Available
            } else {
                ToolAvailability::Missing
            };
            (tool.clone(), status)
        })
        .collect()
}

pub fn collect(store: &Store, settings: &Settings) -> DiagnosticsReport {
    let mode_file = ModeFile::new(&store.mode_path());
    let (mode, mode_stability) = match mode_file.read() {
        Ok(mode) => (mode.unwrap_or_default(), ModeStability::Stable),
        Err(e) => {
            tracing::warn!(error = %e, "mode file unusable");
            (Mode::default(), ModeStability::Degraded)
        }
    };

    let proposals_dir = store.proposals_dir();
    let channels = collaborators::load_channels(&store.resolve(&settings.paths.channels_dir))
        .into_iter()
        .map(|entry| match entry.document {
            Ok(doc) => ChannelSummary {
                name: entry.name,
                allowed_modes: doc.modes(),
                adapter: doc.adapter,
                error: None,
            },
            Err(e) => ChannelSummary {
                name: entry.name,
                adapter: None,
                allowed_modes: Vec::new(),
                error: Some(e.to_string()),
            },
        })
        .collect();

    DiagnosticsReport {
        timestamp: time::now_iso(),
        mode,
        mode_stability,
        uptime_s: uptime_seconds(),
        audit_log: audit_log_stats(&store.audit_log_path()),
        proposals: ProposalStats {
            count: proposal::count_saved(&proposals_dir),
            dir: proposals_dir.display().to_string(),
        },
        tools: tool_availability(
            &store.resolve(&settings.paths.tools_dir),
            &settings.diagnostics.expected_tools,
        ),
        channels,
        constraints: ComplianceEngine::from_settings(store, settings).audit(),
    }
}

#[derive(Parser, Debug)]
#[clap(name = "diagnostics", about = "Print a read-only health snapshot")]
pub struct DiagnosticsCli {
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

fn print_text(report: &DiagnosticsReport) {
    println!("{}", output::heading("Mode"));
    println!("  {} ({:?})", report.mode, report.mode_stability);
    if report.uptime_s >= 0.0 {
        println!("  uptime: {:.3}s", report.uptime_s);
    } else {
        println!("  uptime: unavailable");
    }

    println!("\n{}", output::heading("Audit log"));
    let log = &report.audit_log;
    if log.exists {
        println!("  {} ({} bytes, {} entries)", log.path, log.bytes, log.entries);
    } else {
        println!("  {} [{}]", log.path, output::status_tag("MISSING"));
    }
    println!("  proposals: {} in {}", report.proposals.count, report.proposals.dir);

    println!("\n{}", output::heading("Tools"));
    for (tool, status) in &report.tools {
        let tag = match status {
            ToolAvailability::Available => "AVAILABLE",
            ToolAvailability::Missing => "MISSING",
        };
        println!("  [{}] {}", output::status_tag(tag), tool);
    }

    println!("\n{}", output::heading("Channels"));
    if report.channels.is_empty() {
        println!("  (none)");
    }
    for channel in &report.channels {
        match &channel.error {
            Some(e) => println!("  {}: {}", channel.name, output::compact_line(e, 80)),
            None => println!(
                "  {}: {} [{}]",
                channel.name,
                channel.adapter.as_deref().unwrap_or("?"),
                channel
                    .allowed_modes
                    .iter()
                    .map(Mode::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    println!("\n{}", output::heading("Constraints"));
    for c in &report.constraints.constraints {
        println!(
            "  [{}] {}",
            output::status_tag(&format!("{:?}", c.status).to_uppercase()),
            c.name
        );
    }
    println!("  {}", report.constraints.summary);
}

pub fn run_diagnostics_cli(
    store: &Store,
    settings: &Settings,
    cli: DiagnosticsCli,
) -> Result<(), ModewardError> {
    let report = collect(store, settings);
    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "diagnostics",
        "version": "0.3.0",
        "description": "Read-only health snapshot (administrative mode only)",
        "commands": [
            { "name": "diagnostics", "parameters": ["format"] }
        ],
        "reads": ["audit.log", "mode", "proposals/*.md", "tools/", "channels/*.yaml"]
    })
}
