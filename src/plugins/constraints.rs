//! Constraint registry and compliance audit.
//!
//! Each declared constraint is checked against live collaborator files on
//! every call. `direct` constraints must appear by name in the agent
//! configuration document; `delegated` constraints must have their named
//! artifact present and containing its marker token. A missing agent
//! configuration makes every constraint unverifiable.

use crate::core::audit::{self, AuditEntry, AuditKind, AuditLog, FileAuditLog};
use crate::core::config::Settings;
use crate::core::error::ModewardError;
use crate::core::output;
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub name: String,
    #[serde(flatten)]
    pub verification: Verification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Verification {
    /// Name literal must appear in the agent configuration document.
    Direct,
    /// Artifact (workspace-relative) must exist and contain `marker`.
    Delegated { artifact: PathBuf, marker: String },
}

impl ConstraintSpec {
    pub fn direct(name: &str) -> Self {
        Self {
            name: name.to_string(),
            verification: Verification::Direct,
        }
    }

    pub fn delegated(name: &str, artifact: &str, marker: &str) -> Self {
        Self {
            name: name.to_string(),
            verification: Verification::Delegated {
                artifact: PathBuf::from(artifact),
                marker: marker.to_string(),
            },
        }
    }
}

pub fn default_registry() -> Vec<ConstraintSpec> {
    vec![
        ConstraintSpec::direct("no_cross_state_context_leakage"),
        ConstraintSpec::direct("no_emotional_output_in_operational_state"),
        ConstraintSpec::direct("no_system_commands_outside_administrative_state"),
        ConstraintSpec::delegated("no_explicit_content", "ai/guardrails.ts", "BANNED_PATTERNS"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Active,
    Drift,
    Unverifiable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub name: String,
    pub status: ComplianceStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub timestamp: String,
    pub constraints: Vec<ConstraintResult>,
    pub drift_detected: bool,
    pub summary: String,
}

impl ComplianceReport {
    fn from_results(constraints: Vec<ConstraintResult>) -> Self {
        let attention = constraints
            .iter()
            .filter(|c| c.status != ComplianceStatus::Active)
            .count();
        let summary = if attention == 0 {
            "All constraints active.".to_string()
        } else {
            format!("{} constraint(s) require attention.", attention)
        };
        Self {
            timestamp: time::now_iso(),
            constraints,
            drift_detected: attention > 0,
            summary,
        }
    }

    pub fn status_of(&self, name: &str) -> Option<ComplianceStatus> {
        self.constraints
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.status)
    }
}

pub struct ComplianceEngine<'a> {
    store: &'a Store,
    registry: &'a [ConstraintSpec],
    agent_config: PathBuf,
}

impl<'a> ComplianceEngine<'a> {
    pub fn new(store: &'a Store, registry: &'a [ConstraintSpec], agent_config: &Path) -> Self {
        Self {
            store,
            registry,
            agent_config: store.resolve(agent_config),
        }
    }

    pub fn from_settings(store: &'a Store, settings: &'a Settings) -> Self {
        Self::new(store, &settings.constraints, &settings.paths.agent_config)
    }

    /// Re-derive every constraint's status from the files as they are now.
    pub fn audit(&self) -> ComplianceReport {
        if !self.agent_config.exists() {
            let detail = format!("{} missing", self.agent_config.display());
            tracing::warn!(path = %self.agent_config.display(), "agent configuration missing; all constraints unverifiable");
            return ComplianceReport::from_results(
                self.registry
                    .iter()
                    .map(|spec| ConstraintResult {
                        name: spec.name.clone(),
                        status: ComplianceStatus::Unverifiable,
                        detail: detail.clone(),
                    })
                    .collect(),
            );
        }

        let config_text = std::fs::read_to_string(&self.agent_config).map_err(|e| {
            tracing::warn!(path = %self.agent_config.display(), error = %e, "agent configuration unreadable");
            e
        });

        let results: Vec<ConstraintResult> = self
            .registry
            .iter()
            .map(|spec| {
                let (status, detail) = match &spec.verification {
                    Verification::Direct => self.check_direct(&spec.name, config_text.as_deref()),
                    Verification::Delegated { artifact, marker } => {
                        self.check_delegated(artifact, marker)
                    }
                };
                if status != ComplianceStatus::Active {
                    tracing::warn!(constraint = %spec.name, ?status, detail = %detail, "constraint not active");
                }
                ConstraintResult {
                    name: spec.name.clone(),
                    status,
                    detail,
                }
            })
            .collect();

        ComplianceReport::from_results(results)
    }

    fn check_direct(
        &self,
        name: &str,
        config_text: Result<&str, &std::io::Error>,
    ) -> (ComplianceStatus, String) {
        match config_text {
            Ok(text) if text.contains(name) => (
                ComplianceStatus::Active,
                format!("declared in {}", self.agent_config.display()),
            ),
            Ok(_) => (
                ComplianceStatus::Drift,
                format!("'{}' not found in {}", name, self.agent_config.display()),
            ),
            Err(e) => (
                ComplianceStatus::Unverifiable,
                format!("could not read {}: {}", self.agent_config.display(), e),
            ),
        }
    }

    fn check_delegated(&self, artifact: &Path, marker: &str) -> (ComplianceStatus, String) {
        let path = self.store.resolve(artifact);
        if !path.exists() {
            return (
                ComplianceStatus::Unverifiable,
                format!("{} missing", path.display()),
            );
        }
        match std::fs::read_to_string(&path) {
            Ok(content) if content.contains(marker) => (
                ComplianceStatus::Active,
                format!("{} found in {}", marker, path.display()),
            ),
            Ok(_) => (
                ComplianceStatus::Unverifiable,
                format!("{} not found in {}", marker, path.display()),
            ),
            Err(e) => (
                ComplianceStatus::Unverifiable,
                format!("could not read {}: {}", path.display(), e),
            ),
        }
    }
}

/// Run an audit and write one `CONSTRAINT_AUDIT` entry. The report is
/// returned even when the entry could not be written; the flag says which.
pub fn audit_and_record(engine: &ComplianceEngine, log: &dyn AuditLog) -> (ComplianceReport, bool) {
    let report = engine.audit();
    let audited = audit::append_or_log(
        log,
        AuditEntry::new(AuditKind::ConstraintAudit, &report.summary)
            .with_subject(&format!("{} constraint(s)", report.constraints.len())),
    );
    (report, audited)
}

#[derive(Parser, Debug)]
#[clap(name = "constraints", about = "Audit declared behavioral constraints")]
pub struct ConstraintsCli {
    #[clap(subcommand)]
    pub command: ConstraintsCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConstraintsCommand {
    /// Check every registered constraint and report drift.
    Audit {
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Print the registry in check order.
    List,
}

pub fn run_constraints_cli(
    store: &Store,
    settings: &Settings,
    cli: ConstraintsCli,
) -> Result<(), ModewardError> {
    match cli.command {
        ConstraintsCommand::Audit { format } => {
            let log = FileAuditLog::new(&store.audit_log_path());
            let (report, _) =
                audit_and_record(&ComplianceEngine::from_settings(store, settings), &log);

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for c in &report.constraints {
                    println!(
                        "  [{}] {}: {}",
                        output::status_tag(&format!("{:?}", c.status).to_uppercase()),
                        c.name,
                        output::compact_line(&c.detail, 100)
                    );
                }
                println!("\n{}", report.summary);
            }
        }
        ConstraintsCommand::List => {
            for spec in &settings.constraints {
                match &spec.verification {
                    Verification::Direct => println!("{} (direct)", spec.name),
                    Verification::Delegated { artifact, marker } => println!(
                        "{} (delegated: {} must contain {})",
                        spec.name,
                        artifact.display(),
                        marker
                    ),
                }
            }
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "constraints",
        "version": "0.3.0",
        "description": "Constraint registry and drift audit",
        "commands": [
            { "name": "audit", "parameters": ["format"] },
            { "name": "list", "parameters": [] }
        ],
        "storage": ["audit.log"]
    })
}
