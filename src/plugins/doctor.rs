//! Doctor: read-only preflight checks.
//!
//! Confirms the workspace is wired before the agent goes live:
//! - agent configuration present with its required keys
//! - every channel document well-formed
//! - every declared mode reachable through some channel
//! - every expected tool present
//! - override reference digest configured
//! - audit log readable

use crate::core::audit::{AuditLog, FileAuditLog};
use crate::core::config::Settings;
use crate::core::error::ModewardError;
use crate::core::mode::Mode;
use crate::core::output;
use crate::core::store::Store;
use crate::plugins::collaborators::{self, AgentDocument};
use crate::plugins::diagnostics::{self, ToolAvailability};
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Parser, Debug)]
#[clap(name = "doctor", about = "Run read-only preflight checks")]
pub struct DoctorCli {
    /// Output format: 'text' or 'json'
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,
    pub passed: usize,
    pub failed: usize,
    pub warnings: usize,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
}

impl CheckResult {
    fn new(name: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
        }
    }
}

impl DoctorReport {
    fn from_checks(checks: Vec<CheckResult>) -> Self {
        let count = |s: CheckStatus| checks.iter().filter(|c| c.status == s).count();
        Self {
            passed: count(CheckStatus::Pass),
            failed: count(CheckStatus::Fail),
            warnings: count(CheckStatus::Warn),
            checks,
        }
    }

    pub fn status_of(&self, name: &str) -> Option<CheckStatus> {
        self.checks.iter().find(|c| c.name == name).map(|c| c.status)
    }
}

pub fn run_doctor_cli(
    store: &Store,
    settings: &Settings,
    cli: DoctorCli,
) -> Result<(), ModewardError> {
    let report = run_preflight(store, settings);

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("modeward doctor: preflight checks\n");
        for check in &report.checks {
            let icon = match check.status {
                CheckStatus::Pass => "PASS",
                CheckStatus::Fail => "FAIL",
                CheckStatus::Warn => "WARN",
            };
            println!(
                "  [{}] {}: {}",
                output::status_tag(icon),
                check.name,
                check.message
            );
        }
        println!(
            "\nSummary: {} passed, {} failed, {} warnings",
            report.passed, report.failed, report.warnings
        );
    }

    if report.failed > 0 {
        return Err(ModewardError::ValidationError(format!(
            "Doctor: {} check(s) failed",
            report.failed
        )));
    }
    Ok(())
}

pub fn run_preflight(store: &Store, settings: &Settings) -> DoctorReport {
    let mut checks = Vec::new();

    let agent = check_agent_config(store, settings, &mut checks);
    let covered = check_channels(store, settings, &mut checks);
    checks.extend(check_mode_coverage(agent.as_ref(), &covered));
    checks.extend(check_tools(store, settings));
    checks.push(check_override_digest(settings));
    checks.push(check_audit_log(store));

    DoctorReport::from_checks(checks)
}

fn check_agent_config(
    store: &Store,
    settings: &Settings,
    checks: &mut Vec<CheckResult>,
) -> Option<AgentDocument> {
    let path = store.resolve(&settings.paths.agent_config);
    let name = format!("config:{}", settings.paths.agent_config.display());
    match AgentDocument::load(&path) {
        Ok(doc) => {
            let missing = doc.missing_keys();
            if missing.is_empty() {
                checks.push(CheckResult::new(name, CheckStatus::Pass, "present and well-formed"));
            } else {
                checks.push(CheckResult::new(
                    name,
                    CheckStatus::Fail,
                    format!("missing keys: {}", missing.join(", ")),
                ));
            }
            Some(doc)
        }
        Err(ModewardError::NotFound(p)) => {
            checks.push(CheckResult::new(name, CheckStatus::Fail, format!("{} not found", p)));
            None
        }
        Err(e) => {
            checks.push(CheckResult::new(name, CheckStatus::Fail, format!("parse error: {}", e)));
            None
        }
    }
}

/// Checks each channel and returns the modes reachable through well-formed ones.
fn check_channels(
    store: &Store,
    settings: &Settings,
    checks: &mut Vec<CheckResult>,
) -> BTreeSet<Mode> {
    let dir = store.resolve(&settings.paths.channels_dir);
    let channels = collaborators::load_channels(&dir);
    let mut covered = BTreeSet::new();

    if channels.is_empty() {
        checks.push(CheckResult::new(
            "channels",
            CheckStatus::Warn,
            format!("no channel documents in {}", dir.display()),
        ));
        return covered;
    }

    for channel in channels {
        let name = format!("channel:{}", channel.name);
        match channel.document {
            Ok(doc) => {
                let missing = doc.missing_keys();
                if missing.is_empty() {
                    covered.extend(doc.modes());
                    checks.push(CheckResult::new(
                        name,
                        CheckStatus::Pass,
                        format!("adapter {}", doc.adapter.as_deref().unwrap_or("?")),
                    ));
                } else {
                    checks.push(CheckResult::new(
                        name,
                        CheckStatus::Fail,
                        format!("missing keys: {}", missing.join(", ")),
                    ));
                }
            }
            Err(e) => checks.push(CheckResult::new(
                name,
                CheckStatus::Fail,
                format!("parse error: {}", e),
            )),
        }
    }
    covered
}

/// Modes declared by the agent (all modes when it declares none we
/// recognize) that no channel admits.
fn check_mode_coverage(agent: Option<&AgentDocument>, covered: &BTreeSet<Mode>) -> Vec<CheckResult> {
    let declared: Vec<Mode> = agent
        .map(|a| a.mode_names().iter().filter_map(|m| m.parse().ok()).collect())
        .filter(|modes: &Vec<Mode>| !modes.is_empty())
        .unwrap_or_else(|| Mode::ALL.to_vec());

    declared
        .into_iter()
        .map(|mode| {
            let name = format!("mode-coverage:{}", mode);
            if covered.contains(&mode) {
                CheckResult::new(name, CheckStatus::Pass, "reachable through a channel")
            } else {
                CheckResult::new(name, CheckStatus::Warn, "no channel allows this mode")
            }
        })
        .collect()
}

fn check_tools(store: &Store, settings: &Settings) -> Vec<CheckResult> {
    let dir = store.resolve(&settings.paths.tools_dir);
    diagnostics::tool_availability(&dir, &settings.diagnostics.expected_tools)
        .into_iter()
        .map(|(tool, status)| match status {
            ToolAvailability::Available => {
                CheckResult::new(format!("tool:{}", tool), CheckStatus::Pass, "present")
            }
            ToolAvailability::Missing => CheckResult::new(
                format!("tool:{}", tool),
                CheckStatus::Fail,
                format!("not found in {}", dir.display()),
            ),
        })
        .collect()
}

fn check_override_digest(settings: &Settings) -> CheckResult {
    if settings.credentials().is_configured() {
        CheckResult::new("override-digest", CheckStatus::Pass, "reference digest configured")
    } else {
        CheckResult::new(
            "override-digest",
            CheckStatus::Warn,
            "no reference digest; every override will be rejected",
        )
    }
}

fn check_audit_log(store: &Store) -> CheckResult {
    let path = store.audit_log_path();
    if !path.exists() {
        return CheckResult::new("audit-log", CheckStatus::Pass, "not yet created");
    }
    match FileAuditLog::new(&path).len() {
        Ok(n) => CheckResult::new("audit-log", CheckStatus::Pass, format!("{} entries", n)),
        Err(e) => CheckResult::new("audit-log", CheckStatus::Fail, format!("unreadable: {}", e)),
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "doctor",
        "version": "0.3.0",
        "description": "Read-only preflight checks for collaborator wiring",
        "commands": [
            { "name": "doctor", "parameters": ["format"] }
        ],
        "reads": ["agents/agent.yaml", "channels/*.yaml", "tools/", "audit.log"]
    })
}
